//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Einzige Ausnahme ist das Token-Geheimnis, das aus der
//! Datei oder aus `SEALROOM_JWT_SECRET` kommen muss.

use anyhow::{bail, Context};
use sealroom_observability::logging::{log_format_gueltig, log_level_gueltig};
use sealroom_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Umgebungsvariable mit dem Pfad zur Konfigurationsdatei
pub const CONFIG_ENV: &str = "SEALROOM_CONFIG";

/// Umgebungsvariable mit dem Token-Geheimnis
pub const JWT_SECRET_ENV: &str = "SEALROOM_JWT_SECRET";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Token-Pruefung
    pub auth: AuthEinstellungen,
    /// Session-Gateway
    pub gateway: GatewayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Sealroom".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer WebSocket und Observability
    pub bind_adresse: String,
    /// Port des WebSocket-Endpunkts
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Token-Pruefung
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Gemeinsames HS256-Geheimnis (leer = aus Umgebung)
    pub jwt_secret: Option<String>,
}

/// Session-Gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayEinstellungen {
    /// Kapazitaet der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Ohne eingehenden Frame wird nach dieser Zeit getrennt
    pub verbindungs_timeout_sek: u64,
}

impl Default for GatewayEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            send_queue_groesse: standard.send_queue_groesse,
            keepalive_sek: standard.keepalive_sek,
            verbindungs_timeout_sek: standard.verbindungs_timeout_sek,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                config
                    .validieren()
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            bail!(
                "[logging] level '{}' ungueltig (trace, debug, info, warn, error)",
                self.logging.level
            );
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!(
                "[logging] format '{}' ungueltig (text, json)",
                self.logging.format
            );
        }
        Ok(())
    }

    /// Token-Geheimnis aus Datei, sonst aus `SEALROOM_JWT_SECRET`
    pub fn jwt_secret(&self) -> anyhow::Result<String> {
        let aus_umgebung = std::env::var(JWT_SECRET_ENV).ok();
        Self::secret_waehlen(self.auth.jwt_secret.as_deref(), aus_umgebung.as_deref())
    }

    fn secret_waehlen(datei: Option<&str>, umgebung: Option<&str>) -> anyhow::Result<String> {
        match datei.or(umgebung).map(str::trim) {
            Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
            _ => bail!(
                "Kein Token-Geheimnis konfiguriert: [auth] jwt_secret oder {JWT_SECRET_ENV} setzen"
            ),
        }
    }

    /// Einstellungen fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            server_name: self.server.name.clone(),
            max_clients: self.server.max_clients,
            send_queue_groesse: self.gateway.send_queue_groesse.max(1),
            keepalive_sek: self.gateway.keepalive_sek,
            verbindungs_timeout_sek: self.gateway.verbindungs_timeout_sek,
        }
    }

    /// Gibt die Bind-Adresse fuer den WebSocket-Endpunkt zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
