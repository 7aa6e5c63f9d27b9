//! sealroom-signaling – WebSocket Session-Gateway
//!
//! Dieser Crate implementiert den Session- und Verteil-Service fuer
//! Sealroom. Er authentifiziert Verbindungen beim Handshake, verwaltet
//! Raum-Mitgliedschaften und leitet verschluesselte Envelopes weiter,
//! ohne sie je zu entschluesseln.
//!
//! ## Architektur
//!
//! ```text
//! axum Router (GET /socket, Token-Pruefung)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  JSON-Textframes <-> ClientEvent / ServerEvent
//!     v
//! GatewayHandle --mpsc--> Gateway-Reaktor (ein Task)
//!                             |
//!                             +-- dispatch()
//!                             |     +-- room_handler     (join, leave)
//!                             |     +-- message_handler  (message, file, read)
//!                             |     +-- presence_handler (typing, status)
//!                             |     +-- key_handler      (announce, room key)
//!                             |
//!                             +-- SessionRegistry  – Sessions, Mitgliedschaften, Gruppen
//!                             +-- EventBroadcaster – Zustellung in die Send-Queues
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod registry;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::{ClientSender, EventBroadcaster, Zustellung};
pub use connection::{ClientConnection, TrennGrund};
pub use error::{SignalingError, SignalingResult};
pub use gateway::{Gateway, GatewayHandle, GatewayStatistik};
pub use registry::SessionRegistry;
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::{signaling_router, SignalingServer, SOCKET_PFAD};
