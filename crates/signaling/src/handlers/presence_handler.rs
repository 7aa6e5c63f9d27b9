//! Praesenz-Handler – Tipp-Indikatoren und Status
//!
//! Tipp-Ereignisse bleiben im Raum, Status-Aenderungen gehen an alle
//! verbundenen Clients.

use chrono::Utc;
use sealroom_core::types::ConnectionId;
use sealroom_protocol::{RoomRequest, ServerEvent, StatusInfo, StatusUpdateRequest, TypingInfo};

use crate::error::SignalingResult;
use crate::gateway::Gateway;

/// `typing:start` / `typing:stop` – an den Raum ausser dem Absender
pub fn tippen(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: RoomRequest,
    aktiv: bool,
) -> SignalingResult<()> {
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    let (user_id, username) = gateway.absender(connection_id)?;

    let info = TypingInfo {
        user_id,
        username,
        room_id: room_id.clone(),
    };
    let ereignis = if aktiv {
        ServerEvent::TypingStarted(info)
    } else {
        ServerEvent::TypingStopped(info)
    };
    gateway
        .broadcaster
        .an_raum_ausser_senden(&gateway.registry, &room_id, connection_id, &ereignis);
    Ok(())
}

/// `status:update` – global an alle ausser dem Absender
pub fn status_aktualisieren(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: StatusUpdateRequest,
) -> SignalingResult<()> {
    let (user_id, username) = gateway.absender(connection_id)?;
    tracing::debug!(user_id = %user_id, status = %req.status, "Status geaendert");

    let ereignis = ServerEvent::StatusUpdated(StatusInfo {
        user_id,
        username,
        status: req.status,
        custom_message: req.custom_message,
        timestamp: Utc::now(),
    });
    gateway
        .broadcaster
        .an_alle_ausser_senden(&gateway.registry, connection_id, &ereignis);
    Ok(())
}
