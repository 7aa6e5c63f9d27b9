//! Nachrichten-Handler – Nachrichten, Dateien, Lesebestaetigungen
//!
//! Der Server sieht nur Envelopes und leitet sie unveraendert weiter.
//! Fehlende Message-IDs und Zeitstempel vergibt er selbst.

use chrono::Utc;
use sealroom_core::types::{ConnectionId, MessageId};
use sealroom_protocol::{
    FileShareRequest, MessageKind, MessageReadRequest, MessageSendRequest, ReadReceipt,
    RelayedFile, RelayedMessage, ServerEvent,
};

use crate::error::{SignalingError, SignalingResult};
use crate::gateway::Gateway;

/// MIME-Typ, wenn der Client keinen angibt
const STANDARD_DATEITYP: &str = "application/octet-stream";

/// `message:send` – an alle im Raum inklusive Absender
pub fn nachricht_senden(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: MessageSendRequest,
) -> SignalingResult<()> {
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    let envelope = req
        .envelope
        .ok_or_else(|| SignalingError::protocol("envelope fehlt"))?;
    let (sender_id, sender_name) = gateway.absender(connection_id)?;

    let nachricht = RelayedMessage {
        message_id: req.message_id.unwrap_or_else(MessageId::new),
        sender_id,
        sender_name,
        room_id: room_id.clone(),
        envelope,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        kind: MessageKind::Message,
    };
    tracing::debug!(
        message_id = %nachricht.message_id,
        room_id = %room_id,
        "Nachricht weitergeleitet"
    );
    gateway.broadcaster.an_raum_senden(
        &gateway.registry,
        &room_id,
        &ServerEvent::MessageReceived(nachricht),
    );
    Ok(())
}

/// `file:share` – wie Nachrichten, mit Klartext-Metadaten
pub fn datei_teilen(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: FileShareRequest,
) -> SignalingResult<()> {
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    let envelope = req
        .envelope
        .ok_or_else(|| SignalingError::protocol("envelope fehlt"))?;
    let (sender_id, sender_name) = gateway.absender(connection_id)?;

    let datei = RelayedFile {
        message_id: req.message_id.unwrap_or_else(MessageId::new),
        sender_id,
        sender_name,
        room_id: room_id.clone(),
        envelope,
        file_name: req.file_name.unwrap_or_default(),
        file_size: req.file_size.unwrap_or(0),
        file_type: req
            .file_type
            .unwrap_or_else(|| STANDARD_DATEITYP.to_string()),
        timestamp: Utc::now(),
        kind: MessageKind::File,
    };
    tracing::debug!(
        message_id = %datei.message_id,
        room_id = %room_id,
        file_size = datei.file_size,
        "Datei weitergeleitet"
    );
    gateway.broadcaster.an_raum_senden(
        &gateway.registry,
        &room_id,
        &ServerEvent::FileReceived(datei),
    );
    Ok(())
}

/// `message:read` – an alle im Raum ausser dem Leser
pub fn als_gelesen_markieren(
    gateway: &mut Gateway,
    connection_id: ConnectionId,
    req: MessageReadRequest,
) -> SignalingResult<()> {
    let message_id = req
        .message_id
        .ok_or_else(|| SignalingError::protocol("messageId fehlt"))?;
    let room_id = gateway.mitglied_pruefen(connection_id, req.room_id)?;
    let (read_by, read_by_username) = gateway.absender(connection_id)?;

    let quittung = ReadReceipt {
        message_id,
        room_id: room_id.clone(),
        read_by,
        read_by_username,
        timestamp: Utc::now(),
    };
    gateway.broadcaster.an_raum_ausser_senden(
        &gateway.registry,
        &room_id,
        connection_id,
        &ServerEvent::MessageRead(quittung),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealroom_auth::AuthenticatedUser;
    use sealroom_core::types::{RoomId, UserId};
    use sealroom_observability::SealroomMetrics;
    use sealroom_protocol::{ClientEvent, Envelope, ErrorCode, RoomRequest};
    use tokio::sync::mpsc;

    fn im_raum(gw: &mut Gateway, user: &str) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let c = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(16);
        gw.verbinden(
            c,
            AuthenticatedUser {
                user_id: UserId::from(user),
                username: user.to_uppercase(),
            },
            tx,
        );
        gw.ereignis(c, ClientEvent::RoomJoin(RoomRequest::neu(RoomId::from("r1"))));
        while rx.try_recv().is_ok() {}
        (c, rx)
    }

    fn envelope() -> Envelope {
        Envelope {
            ciphertext: "AAAA".into(),
            iv: "BBBB".into(),
            salt: None,
        }
    }

    #[test]
    fn client_message_id_und_zeit_bleiben_erhalten() {
        let mut gw = Gateway::neu(SealroomMetrics::neu().unwrap());
        let (c1, mut rx1) = im_raum(&mut gw, "u1");
        let zeit = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        nachricht_senden(
            &mut gw,
            c1,
            MessageSendRequest {
                room_id: Some(RoomId::from("r1")),
                envelope: Some(envelope()),
                message_id: Some(MessageId::from("m-42")),
                timestamp: Some(zeit),
            },
        )
        .unwrap();

        match rx1.try_recv().unwrap() {
            ServerEvent::MessageReceived(m) => {
                assert_eq!(m.message_id, MessageId::from("m-42"));
                assert_eq!(m.timestamp, zeit);
                assert_eq!(m.kind, MessageKind::Message);
            }
            anderes => panic!("Unerwartet: {anderes:?}"),
        }
    }

    #[test]
    fn datei_mit_standardwerten() {
        let mut gw = Gateway::neu(SealroomMetrics::neu().unwrap());
        let (c1, mut rx1) = im_raum(&mut gw, "u1");
        let (_c2, mut rx2) = im_raum(&mut gw, "u2");
        while rx1.try_recv().is_ok() {}

        datei_teilen(
            &mut gw,
            c1,
            FileShareRequest {
                room_id: Some(RoomId::from("r1")),
                envelope: Some(envelope()),
                file_name: Some("bild.png".into()),
                file_size: None,
                file_type: None,
                message_id: None,
            },
        )
        .unwrap();

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                ServerEvent::FileReceived(f) => {
                    assert_eq!(f.file_name, "bild.png");
                    assert_eq!(f.file_size, 0);
                    assert_eq!(f.file_type, STANDARD_DATEITYP);
                    assert_eq!(f.kind, MessageKind::File);
                    assert_eq!(f.sender_name, "U1");
                }
                anderes => panic!("Unerwartet: {anderes:?}"),
            }
        }
    }

    #[test]
    fn gelesen_ohne_message_id_ist_ungueltig() {
        let mut gw = Gateway::neu(SealroomMetrics::neu().unwrap());
        let (c1, _rx1) = im_raum(&mut gw, "u1");
        let fehler = als_gelesen_markieren(
            &mut gw,
            c1,
            MessageReadRequest {
                message_id: None,
                room_id: Some(RoomId::from("r1")),
            },
        )
        .unwrap_err();
        assert_eq!(fehler.error_code(), ErrorCode::InvalidRequest);

        let fehler = als_gelesen_markieren(
            &mut gw,
            c1,
            MessageReadRequest {
                message_id: Some(MessageId::from("m1")),
                room_id: None,
            },
        )
        .unwrap_err();
        assert_eq!(fehler.error_code(), ErrorCode::RoomError);
    }
}
