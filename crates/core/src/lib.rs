//! sealroom-core – Gemeinsame Identifikationstypen
//!
//! Dieses Crate stellt die IDs bereit, die Gateway, Client und Protokoll
//! gemeinsam verwenden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConnectionId, MessageId, RoomId, UserId};
