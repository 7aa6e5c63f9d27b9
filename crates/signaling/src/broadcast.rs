//! Event-Broadcaster – Sendet Events an alle relevanten Verbindungen
//!
//! Der Broadcaster haelt selbst keinen Zustand ueber Verbindungen; er loest
//! ein Zustellziel gegen die [`SessionRegistry`] auf und reiht das Ereignis
//! in die Send-Queues ein.
//!
//! ## Zustellziele
//! - Ganzer Raum (inkl. Absender): `Zustellung::Raum`
//! - Raum ohne Absender: `Zustellung::RaumAusser`
//! - Alle ausser einer Verbindung: `Zustellung::AlleAusser`
//! - Aktive Session eines Users: `Zustellung::User`
//! - Eine einzelne Verbindung: `Zustellung::Verbindung`

use sealroom_core::types::{ConnectionId, RoomId, UserId};
use sealroom_observability::SealroomMetrics;
use sealroom_protocol::ServerEvent;
use tokio::sync::mpsc;

use crate::registry::SessionRegistry;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Grund, warum ein Ereignis nicht eingereiht wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeFehler {
    /// Queue voll, Ereignis verworfen
    Voll,
    /// Verbindungs-Task beendet
    Geschlossen,
}

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Sendet ein Ereignis nicht-blockierend an die Verbindung
    pub fn senden(&self, ereignis: ServerEvent) -> Result<(), SendeFehler> {
        match self.tx.try_send(ereignis) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(ev)) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    connection_id = %self.connection_id,
                    event = ev.name(),
                    "Send-Queue voll – Ereignis verworfen"
                );
                Err(SendeFehler::Voll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Verbindung getrennt)"
                );
                Err(SendeFehler::Geschlossen)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Zustellziel eines Ereignisses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zustellung {
    Raum(RoomId),
    RaumAusser(RoomId, ConnectionId),
    AlleAusser(ConnectionId),
    User(UserId),
    Verbindung(ConnectionId),
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Loest Zustellziele auf und zaehlt Zustellungen
#[derive(Clone)]
pub struct EventBroadcaster {
    metriken: SealroomMetrics,
}

impl EventBroadcaster {
    pub fn neu(metriken: SealroomMetrics) -> Self {
        Self { metriken }
    }

    /// Stellt ein Ereignis zu und gibt die Anzahl erfolgreicher Sendungen zurueck
    pub fn zustellen(
        &self,
        registry: &SessionRegistry,
        ziel: &Zustellung,
        ereignis: &ServerEvent,
    ) -> usize {
        let empfaenger: Vec<ConnectionId> = match ziel {
            Zustellung::Raum(room_id) => registry.gruppe(room_id).to_vec(),
            Zustellung::RaumAusser(room_id, ausgeschlossen) => registry
                .gruppe(room_id)
                .iter()
                .copied()
                .filter(|c| c != ausgeschlossen)
                .collect(),
            Zustellung::AlleAusser(ausgeschlossen) => registry
                .verbindungs_ids()
                .filter(|c| c != ausgeschlossen)
                .collect(),
            Zustellung::User(user_id) => registry.aktive_verbindung(user_id).into_iter().collect(),
            Zustellung::Verbindung(connection_id) => vec![*connection_id],
        };

        let mut gesendet = 0;
        for connection_id in &empfaenger {
            let Some(sitzung) = registry.sitzung(connection_id) else {
                continue;
            };
            match sitzung.sender.senden(ereignis.clone()) {
                Ok(()) => {
                    gesendet += 1;
                    self.metriken.ereignis_zugestellt(ereignis.name());
                }
                Err(SendeFehler::Voll) => self.metriken.events_dropped_total.inc(),
                Err(SendeFehler::Geschlossen) => {}
            }
        }
        gesendet
    }

    /// Sendet an alle Verbindungen eines Raums (inkl. Absender)
    pub fn an_raum_senden(
        &self,
        registry: &SessionRegistry,
        room_id: &RoomId,
        ereignis: &ServerEvent,
    ) -> usize {
        self.zustellen(registry, &Zustellung::Raum(room_id.clone()), ereignis)
    }

    /// Sendet an alle Verbindungen eines Raums ausser einer
    pub fn an_raum_ausser_senden(
        &self,
        registry: &SessionRegistry,
        room_id: &RoomId,
        ausgeschlossen: ConnectionId,
        ereignis: &ServerEvent,
    ) -> usize {
        self.zustellen(
            registry,
            &Zustellung::RaumAusser(room_id.clone(), ausgeschlossen),
            ereignis,
        )
    }

    /// Sendet an alle Verbindungen ausser einer
    pub fn an_alle_ausser_senden(
        &self,
        registry: &SessionRegistry,
        ausgeschlossen: ConnectionId,
        ereignis: &ServerEvent,
    ) -> usize {
        self.zustellen(registry, &Zustellung::AlleAusser(ausgeschlossen), ereignis)
    }

    /// Sendet an die aktive Session eines Users
    ///
    /// Verdraengte Verbindungen desselben Users erhalten nichts.
    pub fn an_user_senden(
        &self,
        registry: &SessionRegistry,
        user_id: &UserId,
        ereignis: &ServerEvent,
    ) -> bool {
        self.zustellen(registry, &Zustellung::User(user_id.clone()), ereignis) > 0
    }

    /// Sendet an genau eine Verbindung (Fehlerantworten)
    pub fn an_verbindung_senden(
        &self,
        registry: &SessionRegistry,
        connection_id: ConnectionId,
        ereignis: &ServerEvent,
    ) -> bool {
        self.zustellen(registry, &Zustellung::Verbindung(connection_id), ereignis) > 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
