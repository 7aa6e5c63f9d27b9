//! Raum-Handler – Beitreten und Verlassen
//!
//! Ein User ist hoechstens in einem Raum. Ein Beitritt zu einem anderen Raum
//! verlaesst den alten ohne `user:left` an dessen Mitglieder. Der alte Raum
//! erhaelt nur `typing:stopped`, weil der Client dort kein `typing:stop`
//! mehr senden darf.

use chrono::Utc;
use sealroom_core::types::ConnectionId;
use sealroom_protocol::{RoomPresence, RoomRequest, ServerEvent, TypingInfo};

use crate::error::SignalingResult;
use crate::gateway::Gateway;

/// `room:join`
pub fn beitreten(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: RoomRequest,
) -> SignalingResult<()> {
    let room_id = Gateway::raum_id_pruefen(req.room_id)?;
    let (user_id, username) = gateway.absender(connection_id)?;

    let vorher = gateway.registry.gruppe_beitreten(connection_id, &room_id);
    // Die Mitgliedschaft gehoert der aktiven Session
    if gateway.registry.ist_aktiv(&connection_id) {
        gateway.registry.mitgliedschaft_setzen(&user_id, &room_id);
    }

    tracing::info!(
        user_id = %user_id,
        room_id = %room_id,
        vorher = ?vorher.as_ref().map(|r| r.as_str()),
        "Raum betreten"
    );

    if let Some(alt) = vorher.filter(|alt| *alt != room_id) {
        let stop = ServerEvent::TypingStopped(TypingInfo {
            user_id: user_id.clone(),
            username: username.clone(),
            room_id: alt.clone(),
        });
        gateway
            .broadcaster
            .an_raum_senden(&gateway.registry, &alt, &stop);
    }

    let ereignis = ServerEvent::UserJoined(RoomPresence {
        user_id,
        username,
        room_id: room_id.clone(),
        timestamp: Utc::now(),
    });
    gateway
        .broadcaster
        .an_raum_ausser_senden(&gateway.registry, &room_id, connection_id, &ereignis);
    Ok(())
}

/// `room:leave`
///
/// Verlassen eines Raums, in dem die Verbindung nicht ist, bleibt folgenlos.
pub fn verlassen(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: RoomRequest,
) -> SignalingResult<()> {
    let room_id = Gateway::raum_id_pruefen(req.room_id)?;
    let (user_id, username) = gateway.absender(connection_id)?;

    if !gateway.registry.gruppe_verlassen(connection_id, &room_id) {
        tracing::debug!(user_id = %user_id, room_id = %room_id, "Verlassen ohne Mitgliedschaft");
        return Ok(());
    }
    if gateway.registry.ist_aktiv(&connection_id) {
        gateway.registry.mitgliedschaft_loeschen(&user_id, &room_id);
    }

    tracing::info!(user_id = %user_id, room_id = %room_id, "Raum verlassen");

    let ereignis = ServerEvent::UserLeft(RoomPresence {
        user_id,
        username,
        room_id: room_id.clone(),
        timestamp: Utc::now(),
    });
    gateway
        .broadcaster
        .an_raum_senden(&gateway.registry, &room_id, &ereignis);
    Ok(())
}
