//! sealroom-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Token-Pruefung, Gateway und Observability
//! und stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use sealroom_auth::TokenVerifier;
use sealroom_observability::{observability_server_starten, HealthState, SealroomMetrics};
use sealroom_signaling::{SignalingServer, SignalingState};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    verifier: TokenVerifier,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    ///
    /// Schlaegt fehl, wenn kein Token-Geheimnis gesetzt ist.
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let secret = config.jwt_secret()?;
        let verifier = TokenVerifier::neu(&secret).context("Token-Pruefung nicht initialisierbar")?;
        Ok(Self { config, verifier })
    }

    /// Bindet den Listener und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let adresse = self.config.bind_adresse();
        let listener = TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("WebSocket-Port {adresse} nicht bindbar"))?;

        self.laufen(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        })
        .await
    }

    /// Startet alle Subsysteme auf `listener` und laeuft bis `shutdown`
    ///
    /// Reihenfolge:
    /// 1. Metriken und Health-Zustand anlegen
    /// 2. Gateway-Reaktor starten
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. WebSocket-Endpunkt starten
    /// 5. Bei Shutdown: Health auf draining, Verbindungen schliessen
    pub async fn laufen(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let metriken = SealroomMetrics::neu()?;
        let health = HealthState::neu(metriken.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (state, reaktor) = SignalingState::neu(
            self.config.signaling_config(),
            self.verifier,
            metriken.clone(),
            shutdown_rx.clone(),
        );

        let observability = if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let metriken = metriken.clone();
            let health = health.clone();
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %listener.local_addr()?,
            max_clients = self.config.server.max_clients,
            "Server startet"
        );
        let signaling = tokio::spawn(SignalingServer::neu(Arc::clone(&state)).starten(listener));
        drop(state);

        shutdown.await;
        health.draining_setzen();
        let _ = shutdown_tx.send(true);

        match signaling.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(fehler = %e, "Signaling-Server mit Fehler beendet"),
            Err(e) => tracing::error!(fehler = %e, "Signaling-Task abgebrochen"),
        }
        if let Some(task) = observability {
            let _ = task.await;
        }
        reaktor.abort();
        tracing::info!("Server beendet");
        Ok(())
    }
}
