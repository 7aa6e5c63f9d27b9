//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Konfiguration, Token-Pruefung und das Handle auf den
//! Gateway-Reaktor. Wird als `Arc` an alle Verbindungs-Tasks verteilt.

use sealroom_auth::TokenVerifier;
use sealroom_observability::SealroomMetrics;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gateway::{Gateway, GatewayHandle};

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Kapazitaet der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Sealroom".to_string(),
            max_clients: 512,
            send_queue_groesse: 64,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    /// Prueft Bearer-Tokens beim Upgrade
    pub verifier: TokenVerifier,
    /// Handle auf den Gateway-Reaktor
    pub gateway: GatewayHandle,
    pub metriken: SealroomMetrics,
    /// Shutdown-Signal fuer alle Verbindungs-Tasks
    pub shutdown_rx: watch::Receiver<bool>,
}

impl SignalingState {
    /// Erstellt den Zustand und startet den Gateway-Reaktor
    ///
    /// Der Reaktor endet, sobald der letzte Zustand gedroppt ist.
    pub fn neu(
        config: SignalingConfig,
        verifier: TokenVerifier,
        metriken: SealroomMetrics,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (gateway, reaktor) = Gateway::neu(metriken.clone()).starten();
        let state = Arc::new(Self {
            config: Arc::new(config),
            verifier,
            gateway,
            metriken,
            shutdown_rx,
        });
        (state, reaktor)
    }
}
