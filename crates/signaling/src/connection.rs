//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede authentifizierte Verbindung bekommt eine `ClientConnection` in einem
//! eigenen tokio-Task. Der Task uebersetzt zwischen JSON-Textframes und
//! Gateway-Befehlen.
//!
//! ## Ablauf
//! ```text
//! Upgrade -> verbinden -> (Frames <-> Gateway)* -> trennen
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Ohne eingehenden Frame innerhalb von `verbindungs_timeout_sek` wird
//!   die Verbindung getrennt

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use sealroom_auth::AuthenticatedUser;
use sealroom_core::types::ConnectionId;
use sealroom_protocol::{ClientEvent, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Grund fuer das Ende einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrennGrund {
    /// Client hat geschlossen
    Geschlossen,
    /// Keepalive-Timeout
    Timeout,
    /// Lese- oder Schreibfehler
    Transport,
    /// Server faehrt herunter
    Shutdown,
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    connection_id: ConnectionId,
    user: AuthenticatedUser,
}

impl ClientConnection {
    pub fn neu(state: Arc<SignalingState>, user: AuthenticatedUser) -> Self {
        Self {
            state,
            connection_id: ConnectionId::new(),
            user,
        }
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Meldet die Verbindung am Ende immer beim Gateway ab.
    pub async fn verarbeiten(self, socket: WebSocket) -> TrennGrund {
        let connection_id = self.connection_id;
        let user_id = self.user.user_id.clone();
        let config = Arc::clone(&self.state.config);

        let (sende_tx, mut sende_rx) = mpsc::channel::<ServerEvent>(config.send_queue_groesse);
        if let Err(e) = self
            .state
            .gateway
            .verbinden(connection_id, self.user.clone(), sende_tx)
            .await
        {
            tracing::error!(user_id = %user_id, fehler = %e, "Verbindung nicht registriert");
            return TrennGrund::Shutdown;
        }

        let (mut sender, mut empfaenger) = socket.split();
        let mut shutdown_rx = self.state.shutdown_rx.clone();

        let keepalive = Duration::from_secs(config.keepalive_sek.max(1));
        let timeout = Duration::from_secs(config.verbindungs_timeout_sek);
        let mut ping_takt = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        let mut letzter_empfang = Instant::now();

        let grund = loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = empfaenger.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            letzter_empfang = Instant::now();
                            if let Err(e) = self.frame_verarbeiten(&text, &mut sender).await {
                                tracing::warn!(
                                    connection_id = %connection_id,
                                    fehler = %e,
                                    "Frame-Verarbeitung fehlgeschlagen"
                                );
                                break TrennGrund::Transport;
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            letzter_empfang = Instant::now();
                            let fehler = SignalingError::protocol("Nur Textframes erlaubt");
                            if Self::direkt_senden(&mut sender, &fehler_ereignis(&fehler)).await.is_err() {
                                break TrennGrund::Transport;
                            }
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                            letzter_empfang = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(connection_id = %connection_id, "Verbindung vom Client geschlossen");
                            break TrennGrund::Geschlossen;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %connection_id, fehler = %e, "Lesefehler");
                            break TrennGrund::Transport;
                        }
                    }
                }

                // Ausgehendes Ereignis aus dem Gateway
                Some(ereignis) = sende_rx.recv() => {
                    if Self::direkt_senden(&mut sender, &ereignis).await.is_err() {
                        break TrennGrund::Transport;
                    }
                }

                // Keepalive-Ping und Timeout-Pruefung
                _ = ping_takt.tick() => {
                    if letzter_empfang.elapsed() > timeout {
                        tracing::warn!(user_id = %user_id, connection_id = %connection_id, "Verbindungs-Timeout");
                        break TrennGrund::Timeout;
                    }
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break TrennGrund::Transport;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection_id = %connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = sender.send(Message::Close(None)).await;
                        break TrennGrund::Shutdown;
                    }
                }
            }
        };

        if let Err(e) = self.state.gateway.trennen(connection_id).await {
            tracing::debug!(connection_id = %connection_id, fehler = %e, "Abmeldung nicht moeglich");
        }
        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            grund = ?grund,
            "Verbindungs-Task beendet"
        );
        grund
    }

    /// Parst einen Textframe und reicht ihn an den Gateway weiter
    ///
    /// Ungueltige Frames werden direkt mit `INVALID_REQUEST` beantwortet.
    /// Nur Transportfehler beenden die Verbindung.
    async fn frame_verarbeiten(
        &self,
        text: &str,
        sender: &mut SplitSink<WebSocket, Message>,
    ) -> SignalingResult<()> {
        match ClientEvent::from_json(text) {
            Ok(ereignis) => {
                tracing::trace!(
                    connection_id = %self.connection_id,
                    event = ereignis.name(),
                    "Ereignis empfangen"
                );
                self.state
                    .gateway
                    .ereignis(self.connection_id, ereignis)
                    .await
            }
            Err(e) => {
                let fehler = SignalingError::protocol(format!("Ungueltiger Frame: {e}"));
                Self::direkt_senden(sender, &fehler_ereignis(&fehler)).await
            }
        }
    }

    async fn direkt_senden(
        sender: &mut SplitSink<WebSocket, Message>,
        ereignis: &ServerEvent,
    ) -> SignalingResult<()> {
        let text = ereignis
            .to_json()
            .map_err(|e| SignalingError::intern(format!("Serialisierung: {e}")))?;
        sender
            .send(Message::Text(text))
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))
    }
}

fn fehler_ereignis(fehler: &SignalingError) -> ServerEvent {
    ServerEvent::error(fehler.error_code(), fehler.client_meldung())
}
