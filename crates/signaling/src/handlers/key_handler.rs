//! Schluessel-Handler – Ankuendigung und Verteilung von Raum-Schluesseln
//!
//! Der Server sieht nur oeffentliche Schluessel und verpackte
//! Raum-Schluessel. `room:key` wird nur zugestellt, wenn Absender und
//! Empfaenger im selben Raum sind.

use sealroom_core::types::ConnectionId;
use sealroom_protocol::{
    KeyAnnounceRequest, KeyAnnouncement, RoomKeyDelivery, RoomKeyShare, ServerEvent,
};

use crate::error::{SignalingError, SignalingResult};
use crate::gateway::Gateway;

/// `key:announce` – oeffentlichen Schluessel an den Raum melden
pub fn ankuendigen(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: KeyAnnounceRequest,
) -> SignalingResult<()> {
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    if req.public_key.is_empty() {
        return Err(SignalingError::protocol("publicKey fehlt"));
    }
    let (user_id, username) = gateway.absender(connection_id)?;

    let ereignis = ServerEvent::KeyAnnounced(KeyAnnouncement {
        user_id,
        username,
        room_id: room_id.clone(),
        public_key: req.public_key,
    });
    gateway
        .broadcaster
        .an_raum_ausser_senden(&gateway.registry, &room_id, connection_id, &ereignis);
    Ok(())
}

/// `room:key` – verpackten Raum-Schluessel an die aktive Session des
/// Empfaengers weiterreichen
pub fn weiterleiten(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: RoomKeyShare,
) -> SignalingResult<()> {
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    let (sender_id, _) = gateway.absender(connection_id)?;

    let empfaenger_im_raum = gateway
        .registry
        .aktive_verbindung(&req.recipient_id)
        .is_some_and(|c| gateway.registry.in_gruppe(&c, &room_id));
    if !empfaenger_im_raum {
        return Err(SignalingError::room(format!(
            "Empfaenger {} ist nicht in Raum {room_id}",
            req.recipient_id
        )));
    }

    tracing::debug!(
        sender_id = %sender_id,
        recipient_id = %req.recipient_id,
        room_id = %room_id,
        fingerprint = %req.key_fingerprint,
        "Raum-Schluessel weitergeleitet"
    );
    let ereignis = ServerEvent::RoomKey(RoomKeyDelivery {
        room_id,
        sender_id,
        wrapped: req.wrapped,
        sender_public_key: req.sender_public_key,
        key_created_at: req.key_created_at,
        key_fingerprint: req.key_fingerprint,
    });
    gateway
        .broadcaster
        .an_user_senden(&gateway.registry, &req.recipient_id, &ereignis);
    Ok(())
}
