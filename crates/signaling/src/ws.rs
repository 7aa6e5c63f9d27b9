//! WebSocket-Endpunkt – Handshake, Token-Pruefung, Upgrade
//!
//! `GET /socket` mit `Authorization: Bearer <jwt>` oder `?token=<jwt>`.
//! Ohne gueltiges Token wird mit 401 abgelehnt, bevor irgendein
//! Session-Zustand entsteht. Ist der Server voll oder faehrt er herunter,
//! gibt es 503.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use sealroom_auth::{bearer_token, AuthError, AuthResult, AuthenticatedUser};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::connection::ClientConnection;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Pfad des WebSocket-Endpunkts
pub const SOCKET_PFAD: &str = "/socket";

/// Query-Parameter des Handshakes
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeParams {
    pub token: Option<String>,
}

/// Axum-Router mit dem WebSocket-Endpunkt
pub fn signaling_router(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route(SOCKET_PFAD, get(ws_handler))
        .with_state(state)
}

/// Liest das Token aus Header oder Query und prueft es
///
/// Der Header hat Vorrang vor dem Query-Parameter.
pub fn handshake_pruefen(
    state: &SignalingState,
    params: &HandshakeParams,
    headers: &HeaderMap,
) -> AuthResult<AuthenticatedUser> {
    let aus_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);
    let token = aus_header
        .or(params.token.as_deref())
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::TokenFehlt)?;
    state.verifier.verifizieren(token)
}

/// Prueft Shutdown-Zustand und Verbindungslimit vor dem Upgrade
pub async fn kapazitaet_pruefen(state: &SignalingState) -> SignalingResult<()> {
    if *state.shutdown_rx.borrow() {
        return Err(SignalingError::intern("Server faehrt herunter"));
    }
    let statistik = state.gateway.statistik().await?;
    if statistik.verbindungen >= state.config.max_clients as usize {
        tracing::warn!(
            verbindungen = statistik.verbindungen,
            max = state.config.max_clients,
            "Server voll, Verbindung abgelehnt"
        );
        return Err(SignalingError::ServerVoll);
    }
    Ok(())
}

fn ablehnen(fehler: SignalingError) -> Response {
    (fehler.http_status(), fehler.client_meldung()).into_response()
}

async fn ws_handler(
    State(state): State<Arc<SignalingState>>,
    Query(params): Query<HandshakeParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match handshake_pruefen(&state, &params, &headers) {
        Ok(user) => user,
        Err(e) => {
            state.metriken.auth_rejected_total.inc();
            tracing::warn!(fehler = %e, "Handshake abgelehnt");
            return ablehnen(e.into());
        }
    };

    if let Err(e) = kapazitaet_pruefen(&state).await {
        tracing::warn!(user_id = %user.user_id, fehler = %e, "Upgrade abgelehnt");
        return ablehnen(e);
    }

    ws.on_upgrade(move |socket| async move {
        ClientConnection::neu(state, user).verarbeiten(socket).await;
    })
}

// ---------------------------------------------------------------------------
// SignalingServer
// ---------------------------------------------------------------------------

/// WebSocket-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
}

impl SignalingServer {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Startet den Server auf einem bereits gebundenen Listener
    ///
    /// Laeuft bis das Shutdown-Signal im Zustand auf `true` springt.
    pub async fn starten(self, listener: TcpListener) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;
        tracing::info!(
            adresse = %lokale_addr,
            server = %self.state.config.server_name,
            "WebSocket Signaling-Server gestartet"
        );

        let mut shutdown_rx = self.state.shutdown_rx.clone();
        let app = signaling_router(self.state).layer(TraceLayer::new_for_http());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await?;

        tracing::info!("Signaling-Server beendet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use sealroom_auth::{testing, TokenVerifier};
    use sealroom_observability::SealroomMetrics;
    use tokio::sync::watch;

    use crate::server_state::SignalingConfig;

    const SECRET: &str = "handshake-test-secret";

    fn state() -> Arc<SignalingState> {
        let (_tx, rx) = watch::channel(false);
        let (state, _reaktor) = SignalingState::neu(
            SignalingConfig::default(),
            TokenVerifier::neu(SECRET).unwrap(),
            SealroomMetrics::neu().unwrap(),
            rx,
        );
        state
    }

    fn token(user: &str) -> String {
        testing::token_signieren(SECRET, user, "Anna", chrono::Duration::days(1))
    }

    #[tokio::test]
    async fn token_aus_header() {
        let state = state();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token("u1"))).unwrap(),
        );
        let user = handshake_pruefen(&state, &HandshakeParams::default(), &headers).unwrap();
        assert_eq!(user.user_id.as_str(), "u1");
    }

    #[tokio::test]
    async fn token_aus_query() {
        let state = state();
        let params = HandshakeParams {
            token: Some(token("u2")),
        };
        let user = handshake_pruefen(&state, &params, &HeaderMap::new()).unwrap();
        assert_eq!(user.user_id.as_str(), "u2");
    }

    #[tokio::test]
    async fn ohne_token_abgelehnt() {
        let state = state();
        let fehler =
            handshake_pruefen(&state, &HandshakeParams::default(), &HeaderMap::new()).unwrap_err();
        assert!(matches!(fehler, AuthError::TokenFehlt));
    }

    #[tokio::test]
    async fn fremd_signiertes_token_abgelehnt() {
        let state = state();
        let params = HandshakeParams {
            token: Some(testing::token_signieren(
                "anderes-secret",
                "u1",
                "Anna",
                chrono::Duration::days(1),
            )),
        };
        let fehler = handshake_pruefen(&state, &params, &HeaderMap::new()).unwrap_err();
        assert!(matches!(fehler, AuthError::TokenUngueltig(_)));
    }

    #[tokio::test]
    async fn volle_kapazitaet_ergibt_server_voll() {
        let (_tx, rx) = watch::channel(false);
        let (state, _reaktor) = SignalingState::neu(
            SignalingConfig {
                max_clients: 0,
                ..SignalingConfig::default()
            },
            TokenVerifier::neu(SECRET).unwrap(),
            SealroomMetrics::neu().unwrap(),
            rx,
        );
        let fehler = kapazitaet_pruefen(&state).await.unwrap_err();
        assert!(matches!(fehler, SignalingError::ServerVoll));
        assert_eq!(fehler.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn beim_herunterfahren_abgelehnt() {
        let (tx, rx) = watch::channel(false);
        let (state, _reaktor) = SignalingState::neu(
            SignalingConfig::default(),
            TokenVerifier::neu(SECRET).unwrap(),
            SealroomMetrics::neu().unwrap(),
            rx,
        );
        assert!(kapazitaet_pruefen(&state).await.is_ok());

        tx.send(true).unwrap();
        let fehler = kapazitaet_pruefen(&state).await.unwrap_err();
        assert_eq!(fehler.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn auth_fehler_ergibt_401() {
        let state = state();
        let fehler: SignalingError =
            handshake_pruefen(&state, &HandshakeParams::default(), &HeaderMap::new())
                .unwrap_err()
                .into();
        assert!(matches!(fehler, SignalingError::Auth(AuthError::TokenFehlt)));
        assert_eq!(fehler.http_status(), StatusCode::UNAUTHORIZED);
    }
}
