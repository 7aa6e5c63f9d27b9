//! sealroom-client – Client-Orchestrator
//!
//! Haelt den Zustand eines Chat-Clients: aktiver Raum, Raumschluessel,
//! Nachrichtenverlauf, Anwesenheit und Tipp-Indikator. Der Gateway sieht
//! nur verschluesselte Envelopes; Ver- und Entschluesselung passieren hier.
//!
//! ## Aufbau
//!
//! ```text
//! SessionHandle --Befehle--> ClientSession (ein Task)
//!                                |
//!                                +-- ServerConnection (WebSocket, JSON)
//!                                +-- ClientOrchestrator
//!                                      +-- RaumZustand (Idle | Aktiv)
//!                                      +-- KeyStore / RoomKey
//!                                      +-- MessageLog
//!                                      +-- TypingDebounce
//! ```
//!
//! Der Orchestrator selbst kennt keinen Transport: abgehende Ereignisse
//! landen in einer Queue, Hinweise fuer die Oberflaeche in einem
//! `Notification`-Kanal.

pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod typing;

// Bequeme Re-Exporte
pub use connection::{ClientSession, ServerConnection, SessionHandle};
pub use error::{ClientError, ClientResult};
pub use orchestrator::{ClientOrchestrator, OrchestratorKanaele, RaumZustand};
pub use state::{ChatMessage, Inhalt, MessageLog, Notification, PeerStatus};
pub use typing::{TypingDebounce, TIPP_PAUSE};
