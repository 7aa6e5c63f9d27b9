//! Zwei Client-Sitzungen ueber echte WebSockets gegen den Gateway

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sealroom_auth::{testing, TokenVerifier};
use sealroom_client::{
    ClientOrchestrator, ClientSession, Notification, ServerConnection, SessionHandle,
};
use sealroom_core::types::{RoomId, UserId};
use sealroom_crypto::KeyStore;
use sealroom_observability::SealroomMetrics;
use sealroom_signaling::{SignalingConfig, SignalingServer, SignalingState};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const SECRET: &str = "sitzung-test-secret";

async fn server_starten() -> (SocketAddr, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state, _reaktor) = SignalingState::neu(
        SignalingConfig::default(),
        TokenVerifier::neu(SECRET).unwrap(),
        SealroomMetrics::neu().unwrap(),
        shutdown_rx,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SignalingServer::neu(Arc::clone(&state));
    tokio::spawn(async move {
        let _ = server.starten(listener).await;
    });
    (addr, shutdown_tx)
}

struct Sitzung {
    handle: SessionHandle,
    hinweise: mpsc::UnboundedReceiver<Notification>,
    task: JoinHandle<ClientOrchestrator>,
}

async fn sitzung(addr: SocketAddr, user: &str) -> Sitzung {
    let token = testing::token_signieren(
        SECRET,
        user,
        &format!("Name {user}"),
        chrono::Duration::hours(1),
    );
    let verbindung = ServerConnection::verbinden(&format!("ws://{addr}/socket"), &token)
        .await
        .unwrap();
    let (orch, kanaele) = ClientOrchestrator::neu(
        UserId::from(user),
        format!("Name {user}"),
        KeyStore::generate().unwrap(),
    );
    let (handle, task) = ClientSession::starten(verbindung, orch, kanaele.abgehend);
    Sitzung {
        handle,
        hinweise: kanaele.hinweise,
        task,
    }
}

/// Wartet auf den ersten Hinweis, der `passt` erfuellt
async fn warten_auf(
    hinweise: &mut mpsc::UnboundedReceiver<Notification>,
    passt: impl Fn(&Notification) -> bool,
) -> Notification {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let h = hinweise.recv().await.expect("Hinweiskanal geschlossen");
            if passt(&h) {
                return h;
            }
        }
    })
    .await
    .expect("Hinweis nicht rechtzeitig erhalten")
}

fn uebernommen(h: &Notification) -> bool {
    matches!(h, Notification::SchluesselUebernommen { .. })
}

#[tokio::test]
async fn nachricht_ueber_websocket() {
    let (addr, _shutdown) = server_starten().await;
    let mut s1 = sitzung(addr, "u1").await;
    let mut s2 = sitzung(addr, "u2").await;

    s1.handle.raum_beitreten(RoomId::from("r1")).await.unwrap();
    s2.handle.raum_beitreten(RoomId::from("r1")).await.unwrap();

    // Einer der beiden uebernimmt den aelteren Schluessel
    tokio::time::timeout(Duration::from_secs(30), async {
        tokio::select! {
            _ = warten_auf(&mut s1.hinweise, uebernommen) => {}
            _ = warten_auf(&mut s2.hinweise, uebernommen) => {}
        }
    })
    .await
    .unwrap();

    let id = s1.handle.nachricht_senden("hello").await.unwrap();
    let h = warten_auf(&mut s2.hinweise, |h| matches!(h, Notification::Nachricht(_))).await;
    let Notification::Nachricht(m) = h else {
        unreachable!()
    };
    assert_eq!(m.message_id, id);
    assert_eq!(m.text(), Some("hello"));

    let verlauf = s2.handle.nachrichten().await.unwrap();
    assert_eq!(verlauf.len(), 1);

    s1.handle.trennen().await;
    s2.handle.trennen().await;
    let orch = s1.task.await.unwrap();
    assert!(orch.aktiver_raum().is_none());
    s2.task.await.unwrap();
}

#[tokio::test]
async fn sitzung_endet_bei_server_shutdown() {
    let (addr, shutdown) = server_starten().await;
    let mut s1 = sitzung(addr, "u1").await;
    s1.handle.raum_beitreten(RoomId::from("r1")).await.unwrap();

    shutdown.send(true).unwrap();
    warten_auf(&mut s1.hinweise, |h| matches!(h, Notification::Getrennt)).await;

    let orch = tokio::time::timeout(Duration::from_secs(5), s1.task)
        .await
        .unwrap()
        .unwrap();
    assert!(orch.aktiver_raum().is_none());
    assert!(s1.handle.nachricht_senden("zu spaet").await.is_err());
}

#[tokio::test]
async fn ungueltiges_token_wird_abgelehnt() {
    let (addr, _shutdown) = server_starten().await;
    let ergebnis = ServerConnection::verbinden(&format!("ws://{addr}/socket"), "kaputt").await;
    assert!(ergebnis.is_err());
}
