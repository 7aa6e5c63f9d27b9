//! Startet den kompletten Server auf einem freien Port

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use sealroom_auth::testing;
use sealroom_protocol::{ClientEvent, RoomRequest, ServerEvent};
use sealroom_server::config::ServerConfig;
use sealroom_server::Server;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const SECRET: &str = "server-test-secret";

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.auth.jwt_secret = Some(SECRET.into());
    config.observability.aktiviert = false;
    config
}

#[tokio::test]
async fn server_laeuft_und_faehrt_sauber_herunter() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = Server::neu(config()).unwrap();
    let lauf = tokio::spawn(server.laufen(listener, async {
        let _ = stop_rx.await;
    }));

    let token = testing::token_signieren(SECRET, "u1", "Anna", chrono::Duration::hours(1));
    let (mut ws, _) = connect_async(format!("ws://{addr}/socket?token={token}"))
        .await
        .unwrap();

    // Join ohne Raum-ID wird abgelehnt
    let join = ClientEvent::RoomJoin(RoomRequest { room_id: None });
    ws.send(Message::Text(join.to_json().unwrap())).await.unwrap();
    let antwort = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return ServerEvent::from_json(&text).unwrap(),
                Some(Ok(_)) => {}
                anderes => panic!("Verbindung beendet: {anderes:?}"),
            }
        }
    })
    .await
    .unwrap();
    assert!(matches!(antwort, ServerEvent::Error(_)));

    stop_tx.send(()).unwrap();
    let ende = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ende.is_ok());

    tokio::time::timeout(Duration::from_secs(5), lauf)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn token_secret_aus_config_reicht() {
    assert!(Server::neu(config()).is_ok());
}
