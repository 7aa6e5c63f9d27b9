//! Ereignis-Dispatcher – Routet Client-Ereignisse an die richtigen Handler
//!
//! Jedes [`ClientEvent`] hat genau einen Handler. Ein neues Ereignis im
//! Protokoll ist ohne Eintrag hier ein Compile-Fehler.

use sealroom_core::types::ConnectionId;
use sealroom_protocol::ClientEvent;

use crate::error::SignalingResult;
use crate::gateway::Gateway;
use crate::handlers::{key_handler, message_handler, presence_handler, room_handler};

/// Verarbeitet ein Client-Ereignis vollstaendig
pub fn dispatch(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    ereignis: ClientEvent,
) -> SignalingResult<()> {
    match ereignis {
        // -------------------------------------------------------------------
        // Raeume
        // -------------------------------------------------------------------
        ClientEvent::RoomJoin(req) => room_handler::beitreten(gateway, connection_id, req),
        ClientEvent::RoomLeave(req) => room_handler::verlassen(gateway, connection_id, req),

        // -------------------------------------------------------------------
        // Nachrichten
        // -------------------------------------------------------------------
        ClientEvent::MessageSend(req) => {
            message_handler::nachricht_senden(gateway, connection_id, req)
        }
        ClientEvent::FileShare(req) => message_handler::datei_teilen(gateway, connection_id, req),
        ClientEvent::MessageRead(req) => {
            message_handler::als_gelesen_markieren(gateway, connection_id, req)
        }

        // -------------------------------------------------------------------
        // Praesenz
        // -------------------------------------------------------------------
        ClientEvent::TypingStart(req) => {
            presence_handler::tippen(gateway, connection_id, req, true)
        }
        ClientEvent::TypingStop(req) => {
            presence_handler::tippen(gateway, connection_id, req, false)
        }
        ClientEvent::StatusUpdate(req) => {
            presence_handler::status_aktualisieren(gateway, connection_id, req)
        }

        // -------------------------------------------------------------------
        // Raum-Schluessel
        // -------------------------------------------------------------------
        ClientEvent::KeyAnnounce(req) => key_handler::ankuendigen(gateway, connection_id, req),
        ClientEvent::RoomKey(req) => key_handler::weiterleiten(gateway, connection_id, req),
    }
}
