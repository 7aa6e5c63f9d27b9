//! Prometheus-kompatible Metriken fuer Sealroom
//!
//! Registrierte Metriken:
//! - `sealroom_connected_sessions` – Gauge: Offene Socket-Verbindungen
//! - `sealroom_active_rooms` – Gauge: Raeume mit mindestens einem Mitglied
//! - `sealroom_events_relayed_total` – Counter: Zugestellte Ereignisse (event)
//! - `sealroom_events_dropped_total` – Counter: Verworfene Ereignisse (volle Queue)
//! - `sealroom_auth_rejected_total` – Counter: Abgelehnte Handshakes
//! - `sealroom_sessions_evicted_total` – Counter: Verdraengte Sessions

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Sealroom-Prometheus-Metriken
#[derive(Clone)]
pub struct SealroomMetrics {
    pub registry: Arc<Registry>,

    pub connected_sessions: IntGauge,
    pub active_rooms: IntGauge,
    pub events_relayed_total: IntCounterVec,
    pub events_dropped_total: IntCounter,
    pub auth_rejected_total: IntCounter,
    pub sessions_evicted_total: IntCounter,
}

impl SealroomMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_sessions = IntGauge::with_opts(Opts::new(
            "sealroom_connected_sessions",
            "Anzahl offener Socket-Verbindungen",
        ))?;
        registry.register(Box::new(connected_sessions.clone()))?;

        let active_rooms = IntGauge::with_opts(Opts::new(
            "sealroom_active_rooms",
            "Anzahl Raeume mit mindestens einem Mitglied",
        ))?;
        registry.register(Box::new(active_rooms.clone()))?;

        let events_relayed_total = IntCounterVec::new(
            Opts::new(
                "sealroom_events_relayed_total",
                "Zugestellte Ereignisse pro Ereignisname",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_relayed_total.clone()))?;

        let events_dropped_total = IntCounter::with_opts(Opts::new(
            "sealroom_events_dropped_total",
            "Wegen voller Sende-Queue verworfene Ereignisse",
        ))?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let auth_rejected_total = IntCounter::with_opts(Opts::new(
            "sealroom_auth_rejected_total",
            "Abgelehnte Verbindungsversuche (Token fehlt oder ungueltig)",
        ))?;
        registry.register(Box::new(auth_rejected_total.clone()))?;

        let sessions_evicted_total = IntCounter::with_opts(Opts::new(
            "sealroom_sessions_evicted_total",
            "Durch eine neuere Verbindung verdraengte Sessions",
        ))?;
        registry.register(Box::new(sessions_evicted_total.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_sessions,
            active_rooms,
            events_relayed_total,
            events_dropped_total,
            auth_rejected_total,
            sessions_evicted_total,
        })
    }

    /// Zaehlt eine erfolgreiche Zustellung
    pub fn ereignis_zugestellt(&self, event: &str) {
        self.events_relayed_total.with_label_values(&[event]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: SealroomMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<SealroomMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(fehler = %err, "Metriken-Export fehlgeschlagen");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = SealroomMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_kollidieren_nicht() {
        // Jede Instanz hat ihre eigene Registry
        let a = SealroomMetrics::neu().unwrap();
        let b = SealroomMetrics::neu().unwrap();
        a.connected_sessions.set(3);
        assert_eq!(b.connected_sessions.get(), 0);
    }

    #[test]
    fn zustellung_mit_label() {
        let metriken = SealroomMetrics::neu().unwrap();
        metriken.ereignis_zugestellt("message:received");
        metriken.ereignis_zugestellt("message:received");
        let wert = metriken
            .events_relayed_total
            .with_label_values(&["message:received"])
            .get();
        assert_eq!(wert, 2);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = SealroomMetrics::neu().unwrap();
        metriken.connected_sessions.set(5);
        metriken.auth_rejected_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("sealroom_connected_sessions 5"));
        assert!(output.contains("sealroom_auth_rejected_total 1"));
        assert!(output.contains("# TYPE"));
    }
}
