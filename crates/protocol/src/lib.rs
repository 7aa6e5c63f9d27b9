//! sealroom-protocol – Wire-Ereignisse
//!
//! Dieses Crate definiert alle Ereignisse, die zwischen Client und Gateway
//! als JSON-Textframes ueber die WebSocket-Verbindung laufen.
//!
//! Jeder Frame hat die Form `{"event": "<name>", "data": {...}}`.
//! Der Server sieht nur [`Envelope`]s, niemals Klartext.

pub mod envelope;
pub mod events;

pub use envelope::{Envelope, FileMeta};
pub use events::{
    ClientEvent, ErrorCode, ErrorInfo, FileShareRequest, KeyAnnounceRequest, KeyAnnouncement,
    MessageKind, MessageReadRequest, MessageSendRequest, PresenceInfo, ReadReceipt, RelayedFile,
    RelayedMessage, RoomKeyDelivery, RoomKeyShare, RoomPresence, RoomRequest, ServerEvent,
    StatusInfo, StatusUpdateRequest, TypingInfo,
};
