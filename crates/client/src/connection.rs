//! Client-seitige WebSocket-Verbindung zum Sealroom-Gateway
//!
//! [`ServerConnection`] spricht das JSON-Textframe-Format;
//! [`ClientSession`] pumpt Ereignisse zwischen Socket und
//! [`ClientOrchestrator`] und nimmt Befehle ueber ein [`SessionHandle`]
//! entgegen.

use futures_util::{SinkExt, StreamExt};
use sealroom_core::types::{MessageId, RoomId};
use sealroom_crypto::FileData;
use sealroom_protocol::{ClientEvent, ServerEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};
use crate::orchestrator::ClientOrchestrator;
use crate::state::ChatMessage;

// ---------------------------------------------------------------------------
// ServerConnection
// ---------------------------------------------------------------------------

/// WebSocket-Verbindung zum Gateway
pub struct ServerConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ServerConnection {
    /// Verbindet sich mit Bearer-Token im `Authorization`-Header
    ///
    /// `url` ist der volle Socket-Pfad, z.B. `ws://host:port/socket`.
    pub async fn verbinden(url: &str, token: &str) -> ClientResult<Self> {
        let mut request = url.into_client_request()?;
        let wert = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ClientError::Transport(format!("Ungueltiges Token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, wert);

        tracing::info!(url = %url, "Verbinde mit Gateway");
        let (ws, antwort) = connect_async(request).await?;
        tracing::info!(status = %antwort.status(), "WebSocket-Verbindung hergestellt");
        Ok(Self { ws })
    }

    /// Sendet ein Ereignis als Textframe
    pub async fn senden(&mut self, ereignis: &ClientEvent) -> ClientResult<()> {
        let text = ereignis
            .to_json()
            .map_err(|e| ClientError::Protokoll(e.to_string()))?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Wartet auf das naechste Ereignis vom Gateway
    ///
    /// `Ok(None)`, wenn der Server die Verbindung geschlossen hat.
    /// Pings beantwortet tungstenite selbst.
    pub async fn naechstes_ereignis(&mut self) -> ClientResult<Option<ServerEvent>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return ServerEvent::from_json(&text)
                        .map(Some)
                        .map_err(|e| ClientError::Protokoll(e.to_string()));
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(ClientError::Protokoll(
                        "Binaerframe vom Server".to_string(),
                    ));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Schliesst die Verbindung sauber
    pub async fn trennen(&mut self) {
        let _ = self.ws.close(None).await;
        tracing::info!("WebSocket-Verbindung getrennt");
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

enum ClientCommand {
    Beitreten(RoomId, oneshot::Sender<ClientResult<()>>),
    Verlassen(oneshot::Sender<ClientResult<()>>),
    Nachricht(String, oneshot::Sender<ClientResult<MessageId>>),
    Datei(FileData, oneshot::Sender<ClientResult<MessageId>>),
    Tippen(oneshot::Sender<ClientResult<()>>),
    Status(String, Option<String>, oneshot::Sender<ClientResult<()>>),
    Gelesen(MessageId, oneshot::Sender<ClientResult<()>>),
    Verlauf(oneshot::Sender<Vec<ChatMessage>>),
    Trennen,
}

/// Laufende Sitzung: Socket + Orchestrator in einem Task
pub struct ClientSession;

impl ClientSession {
    /// Startet den Pump-Task
    ///
    /// `abgehend` ist die Ausgangs-Queue des Orchestrators. Sie ist
    /// unbegrenzt; dieser Task ist ihr einziger Leser. Der Task endet
    /// bei Verbindungsende oder [`SessionHandle::trennen`] und gibt den
    /// Orchestrator zurueck.
    pub fn starten(
        mut verbindung: ServerConnection,
        mut orchestrator: ClientOrchestrator,
        mut abgehend: mpsc::UnboundedReceiver<ClientEvent>,
    ) -> (SessionHandle, JoinHandle<ClientOrchestrator>) {
        let (befehl_tx, mut befehle) = mpsc::channel::<ClientCommand>(32);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    ereignis = verbindung.naechstes_ereignis() => match ereignis {
                        Ok(Some(ereignis)) => {
                            if let Err(e) = orchestrator.ereignis_verarbeiten(ereignis).await {
                                tracing::warn!(fehler = %e, "Ereignis nicht verarbeitet");
                            }
                        }
                        Ok(None) => {
                            tracing::info!("Gateway hat die Verbindung geschlossen");
                            break;
                        }
                        Err(ClientError::Protokoll(e)) => {
                            tracing::warn!(fehler = %e, "Ungueltiger Frame vom Gateway");
                        }
                        Err(e) => {
                            tracing::warn!(fehler = %e, "Verbindung abgebrochen");
                            break;
                        }
                    },

                    Some(ereignis) = abgehend.recv() => {
                        if let Err(e) = verbindung.senden(&ereignis).await {
                            tracing::warn!(fehler = %e, event = ereignis.name(), "Senden fehlgeschlagen");
                            break;
                        }
                    }

                    befehl = befehle.recv() => match befehl {
                        Some(ClientCommand::Trennen) | None => {
                            verbindung.trennen().await;
                            break;
                        }
                        Some(befehl) => befehl_ausfuehren(&mut orchestrator, befehl),
                    },
                }
            }
            orchestrator.verbindung_getrennt();
            orchestrator
        });

        (SessionHandle { tx: befehl_tx }, task)
    }
}

fn befehl_ausfuehren(orchestrator: &mut ClientOrchestrator, befehl: ClientCommand) {
    // Antworten an verschwundene Aufrufer werden verworfen
    match befehl {
        ClientCommand::Beitreten(room_id, antwort) => {
            let _ = antwort.send(orchestrator.raum_beitreten(room_id));
        }
        ClientCommand::Verlassen(antwort) => {
            let _ = antwort.send(orchestrator.raum_verlassen());
        }
        ClientCommand::Nachricht(text, antwort) => {
            let _ = antwort.send(orchestrator.nachricht_senden(&text));
        }
        ClientCommand::Datei(datei, antwort) => {
            let _ = antwort.send(orchestrator.datei_senden(datei));
        }
        ClientCommand::Tippen(antwort) => {
            let _ = antwort.send(orchestrator.tippen());
        }
        ClientCommand::Status(status, custom_message, antwort) => {
            let _ = antwort.send(orchestrator.status_setzen(status, custom_message));
        }
        ClientCommand::Gelesen(message_id, antwort) => {
            let _ = antwort.send(orchestrator.als_gelesen_markieren(message_id));
        }
        ClientCommand::Verlauf(antwort) => {
            let _ = antwort.send(orchestrator.nachrichten().to_vec());
        }
        ClientCommand::Trennen => {}
    }
}

/// Klonbares Handle auf eine laufende Sitzung
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<ClientCommand>,
}

impl SessionHandle {
    pub async fn raum_beitreten(&self, room_id: RoomId) -> ClientResult<()> {
        self.anfrage(|a| ClientCommand::Beitreten(room_id, a)).await?
    }

    pub async fn raum_verlassen(&self) -> ClientResult<()> {
        self.anfrage(ClientCommand::Verlassen).await?
    }

    pub async fn nachricht_senden(&self, text: impl Into<String>) -> ClientResult<MessageId> {
        let text = text.into();
        self.anfrage(|a| ClientCommand::Nachricht(text, a)).await?
    }

    pub async fn datei_senden(&self, datei: FileData) -> ClientResult<MessageId> {
        self.anfrage(|a| ClientCommand::Datei(datei, a)).await?
    }

    pub async fn tippen(&self) -> ClientResult<()> {
        self.anfrage(ClientCommand::Tippen).await?
    }

    pub async fn status_setzen(
        &self,
        status: impl Into<String>,
        custom_message: Option<String>,
    ) -> ClientResult<()> {
        let status = status.into();
        self.anfrage(|a| ClientCommand::Status(status, custom_message, a))
            .await?
    }

    pub async fn als_gelesen_markieren(&self, message_id: MessageId) -> ClientResult<()> {
        self.anfrage(|a| ClientCommand::Gelesen(message_id, a)).await?
    }

    /// Nachrichtenverlauf des aktiven Raums
    pub async fn nachrichten(&self) -> ClientResult<Vec<ChatMessage>> {
        self.anfrage(ClientCommand::Verlauf).await
    }

    /// Beendet die Sitzung
    pub async fn trennen(&self) {
        let _ = self.tx.send(ClientCommand::Trennen).await;
    }

    async fn anfrage<T>(
        &self,
        befehl: impl FnOnce(oneshot::Sender<T>) -> ClientCommand,
    ) -> ClientResult<T> {
        let (antwort, rx) = oneshot::channel();
        self.tx
            .send(befehl(antwort))
            .await
            .map_err(|_| ClientError::SitzungBeendet)?;
        rx.await.map_err(|_| ClientError::SitzungBeendet)
    }
}
