//! Orchestrator gegen einen Gateway im selben Prozess
//!
//! Keine Sockets: die Ausgangs-Queues der Clients werden direkt in den
//! Gateway gespeist und dessen Send-Queues zurueck in die Orchestratoren.

use std::time::Duration;

use sealroom_auth::AuthenticatedUser;
use sealroom_client::{ClientOrchestrator, Notification, OrchestratorKanaele};
use sealroom_core::types::{ConnectionId, RoomId, UserId};
use sealroom_crypto::KeyStore;
use sealroom_observability::SealroomMetrics;
use sealroom_protocol::ServerEvent;
use sealroom_signaling::Gateway;
use tokio::sync::mpsc;

struct Teilnehmer {
    conn: ConnectionId,
    orch: ClientOrchestrator,
    kanaele: OrchestratorKanaele,
    eingang: mpsc::Receiver<ServerEvent>,
}

impl Teilnehmer {
    fn hinweise(&mut self) -> Vec<Notification> {
        let mut alle = Vec::new();
        while let Ok(h) = self.kanaele.hinweise.try_recv() {
            alle.push(h);
        }
        alle
    }
}

fn gateway() -> Gateway {
    Gateway::neu(SealroomMetrics::neu().unwrap())
}

fn anmelden(gw: &mut Gateway, user: &str) -> Teilnehmer {
    let conn = ConnectionId::new();
    let (tx, eingang) = mpsc::channel(256);
    gw.verbinden(
        conn,
        AuthenticatedUser {
            user_id: UserId::from(user),
            username: format!("Name {user}"),
        },
        tx,
    );
    let (orch, kanaele) = ClientOrchestrator::neu(
        UserId::from(user),
        format!("Name {user}"),
        KeyStore::generate().unwrap(),
    );
    Teilnehmer {
        conn,
        orch,
        kanaele,
        eingang,
    }
}

/// Leitet Ereignisse hin und her, bis nichts mehr unterwegs ist
async fn pumpen(gw: &mut Gateway, alle: &mut [&mut Teilnehmer]) {
    loop {
        let mut bewegt = false;
        for t in alle.iter_mut() {
            while let Ok(ereignis) = t.kanaele.abgehend.try_recv() {
                gw.ereignis(t.conn, ereignis);
                bewegt = true;
            }
            while let Ok(ereignis) = t.eingang.try_recv() {
                t.orch.ereignis_verarbeiten(ereignis).await.unwrap();
                bewegt = true;
            }
        }
        if !bewegt {
            break;
        }
    }
}

fn fingerprint(t: &Teilnehmer) -> String {
    t.orch.raumschluessel().unwrap().fingerprint().to_string()
}

async fn zwei_im_raum(gw: &mut Gateway, raum: &str) -> (Teilnehmer, Teilnehmer) {
    let mut u1 = anmelden(gw, "u1");
    let mut u2 = anmelden(gw, "u2");
    u1.orch.raum_beitreten(RoomId::from(raum)).unwrap();
    pumpen(gw, &mut [&mut u1, &mut u2]).await;
    u2.orch.raum_beitreten(RoomId::from(raum)).unwrap();
    pumpen(gw, &mut [&mut u1, &mut u2]).await;
    (u1, u2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn raumschluessel_konvergiert() {
    let mut gw = gateway();
    let (u1, u2) = zwei_im_raum(&mut gw, "r1").await;
    assert_eq!(fingerprint(&u1), fingerprint(&u2));
}

#[tokio::test]
async fn hallo_wird_entschluesselt_und_echo_dedupliziert() {
    let mut gw = gateway();
    let (mut u1, mut u2) = zwei_im_raum(&mut gw, "r1").await;
    u2.hinweise();

    let id = u1.orch.nachricht_senden("hello").unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;

    let bei_u2 = u2.orch.nachrichten();
    assert_eq!(bei_u2.len(), 1);
    assert_eq!(bei_u2[0].message_id, id);
    assert_eq!(bei_u2[0].text(), Some("hello"));
    assert_eq!(bei_u2[0].sender_id, UserId::from("u1"));
    assert!(!bei_u2[0].is_own);
    assert!(u2
        .hinweise()
        .iter()
        .any(|h| matches!(h, Notification::Nachricht(m) if m.message_id == id)));

    // Lokales Echo plus Relay ergibt genau einen Eintrag
    let bei_u1 = u1.orch.nachrichten();
    assert_eq!(bei_u1.len(), 1);
    assert!(bei_u1[0].is_own);
}

#[tokio::test]
async fn getrennte_raeume_sehen_sich_nicht() {
    let mut gw = gateway();
    let mut u1 = anmelden(&mut gw, "u1");
    let mut u2 = anmelden(&mut gw, "u2");
    u1.orch.raum_beitreten(RoomId::from("r1")).unwrap();
    u2.orch.raum_beitreten(RoomId::from("r2")).unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;

    u1.orch.nachricht_senden("nur r1").unwrap();
    u1.orch.tippen().unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;

    assert!(u2.orch.nachrichten().is_empty());
    assert!(u2.orch.tippende().is_empty());
    assert_ne!(fingerprint(&u1), fingerprint(&u2));
}

#[tokio::test]
async fn gelesen_bestaetigung_erreicht_absender() {
    let mut gw = gateway();
    let (mut u1, mut u2) = zwei_im_raum(&mut gw, "r1").await;

    let id = u1.orch.nachricht_senden("lies mich").unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    u2.orch.als_gelesen_markieren(id.clone()).unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;

    assert_eq!(u1.orch.gelesen_von(&id), vec![UserId::from("u2")]);
}

#[tokio::test]
async fn verlassen_meldet_user_gegangen() {
    let mut gw = gateway();
    let (mut u1, mut u2) = zwei_im_raum(&mut gw, "r1").await;
    u1.hinweise();

    u2.orch.raum_verlassen().unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;

    assert!(u2.orch.aktiver_raum().is_none());
    assert!(u1
        .hinweise()
        .iter()
        .any(|h| matches!(h, Notification::UserGegangen { user_id, .. } if *user_id == UserId::from("u2"))));
}

#[tokio::test(start_paused = true)]
async fn tippen_endet_nach_ruhepause() {
    let mut gw = gateway();
    let (mut u1, mut u2) = zwei_im_raum(&mut gw, "r1").await;

    u1.orch.tippen().unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    assert_eq!(u2.orch.tippende(), vec![UserId::from("u1")]);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    u1.orch.tippen().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    assert_eq!(u2.orch.tippende(), vec![UserId::from("u1")]);

    tokio::time::sleep(Duration::from_millis(600)).await;
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    assert!(u2.orch.tippende().is_empty());
    assert!(!u1.orch.tippt());
}

#[tokio::test]
async fn raumwechsel_hinterlaesst_keinen_tippenden() {
    let mut gw = gateway();
    let (mut u1, mut u2) = zwei_im_raum(&mut gw, "r1").await;

    u1.orch.tippen().unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    assert_eq!(u2.orch.tippende(), vec![UserId::from("u1")]);

    u1.orch.raum_beitreten(RoomId::from("r2")).unwrap();
    pumpen(&mut gw, &mut [&mut u1, &mut u2]).await;
    assert!(u2.orch.tippende().is_empty());
}
