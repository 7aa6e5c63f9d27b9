//! Session-Gateway – Reaktor ueber der Session-Registry
//!
//! Der [`Gateway`] besitzt die [`SessionRegistry`] und den
//! [`EventBroadcaster`]. Er wird von genau einem Task betrieben
//! ([`Gateway::starten`]); alle Verbindungs-Tasks sprechen ueber einen
//! [`GatewayHandle`] mit ihm. Jedes Ereignis wird vollstaendig verarbeitet,
//! bevor das naechste drankommt.
//!
//! ## Lebenszyklus einer Verbindung
//! `verbinden` -> beliebig viele `ereignis` -> `trennen`

use chrono::Utc;
use sealroom_auth::AuthenticatedUser;
use sealroom_core::types::{ConnectionId, RoomId, UserId};
use sealroom_observability::SealroomMetrics;
use sealroom_protocol::{ClientEvent, PresenceInfo, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::broadcast::{ClientSender, EventBroadcaster};
use crate::dispatcher;
use crate::error::{SignalingError, SignalingResult};
use crate::registry::SessionRegistry;

/// Groesse der Befehls-Queue zum Reaktor
const BEFEHL_QUEUE_GROESSE: usize = 1024;

/// Momentaufnahme des Gateway-Zustands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewayStatistik {
    pub verbindungen: usize,
    pub aktive_user: usize,
    pub raeume: usize,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Zustand und Logik des Session-Gateways
pub struct Gateway {
    pub(crate) registry: SessionRegistry,
    pub(crate) broadcaster: EventBroadcaster,
    metriken: SealroomMetrics,
}

impl Gateway {
    pub fn neu(metriken: SealroomMetrics) -> Self {
        Self {
            registry: SessionRegistry::neu(),
            broadcaster: EventBroadcaster::neu(metriken.clone()),
            metriken,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Registriert eine authentifizierte Verbindung
    ///
    /// Eine bestehende Session desselben Users wird still verdraengt.
    pub fn verbinden(
        &mut self,
        connection_id: ConnectionId,
        user: AuthenticatedUser,
        tx: mpsc::Sender<ServerEvent>,
    ) {
        let sender = ClientSender {
            connection_id,
            user_id: user.user_id.clone(),
            tx,
        };
        let verdraengt = self.registry.registrieren(
            connection_id,
            user.user_id.clone(),
            user.username.clone(),
            sender,
        );

        if let Some(alt) = verdraengt {
            self.metriken.sessions_evicted_total.inc();
            tracing::info!(
                user_id = %user.user_id,
                alt = %alt,
                neu = %connection_id,
                "Session verdraengt"
            );
        }
        tracing::info!(
            user_id = %user.user_id,
            username = %user.username,
            connection_id = %connection_id,
            "Client verbunden"
        );

        let ereignis = ServerEvent::UserOnline(PresenceInfo {
            user_id: user.user_id,
            username: user.username,
            timestamp: Utc::now(),
        });
        self.broadcaster
            .an_alle_ausser_senden(&self.registry, connection_id, &ereignis);
        self.gauges_aktualisieren();
    }

    /// Verarbeitet ein eingehendes Client-Ereignis
    ///
    /// Fehler gehen als `error`-Ereignis nur an die Ursprungsverbindung.
    pub fn ereignis(&mut self, connection_id: ConnectionId, ereignis: ClientEvent) {
        let name = ereignis.name();
        if let Err(e) = dispatcher::dispatch(self, connection_id, ereignis) {
            tracing::debug!(
                connection_id = %connection_id,
                event = name,
                fehler = %e,
                "Ereignis abgelehnt"
            );
            self.fehler_senden(connection_id, &e);
        }
        self.gauges_aktualisieren();
    }

    /// Sendet ein `error`-Ereignis an eine Verbindung
    pub fn fehler_senden(&self, connection_id: ConnectionId, fehler: &SignalingError) {
        let ereignis = ServerEvent::error(fehler.error_code(), fehler.client_meldung());
        self.broadcaster
            .an_verbindung_senden(&self.registry, connection_id, &ereignis);
    }

    /// Entfernt eine Verbindung
    ///
    /// Nur die aktive Session eines Users loest `user:left` und
    /// `user:offline` aus; eine verdraengte Verbindung verlaesst still ihre
    /// Gruppe.
    pub fn trennen(&mut self, connection_id: ConnectionId) {
        let Some(abmeldung) = self.registry.entfernen(connection_id) else {
            return;
        };
        let eintrag = abmeldung.eintrag;

        if !abmeldung.war_aktiv {
            tracing::debug!(
                user_id = %eintrag.user_id,
                connection_id = %connection_id,
                "Verdraengte Verbindung getrennt"
            );
            self.gauges_aktualisieren();
            return;
        }

        let jetzt = Utc::now();
        if let Some(room_id) = eintrag.gruppe.clone() {
            let ereignis = ServerEvent::UserLeft(sealroom_protocol::RoomPresence {
                user_id: eintrag.user_id.clone(),
                username: eintrag.username.clone(),
                room_id: room_id.clone(),
                timestamp: jetzt,
            });
            self.broadcaster
                .an_raum_senden(&self.registry, &room_id, &ereignis);
        }

        let ereignis = ServerEvent::UserOffline(PresenceInfo {
            user_id: eintrag.user_id.clone(),
            username: eintrag.username.clone(),
            timestamp: jetzt,
        });
        self.broadcaster
            .an_alle_ausser_senden(&self.registry, connection_id, &ereignis);

        tracing::info!(
            user_id = %eintrag.user_id,
            connection_id = %connection_id,
            "Client getrennt"
        );
        self.gauges_aktualisieren();
    }

    /// Sendet ein Ereignis an die aktive Session eines Users
    pub fn an_user_senden(&self, user_id: &UserId, ereignis: &ServerEvent) -> bool {
        self.broadcaster
            .an_user_senden(&self.registry, user_id, ereignis)
    }

    pub fn aktive_user(&self) -> Vec<UserId> {
        self.registry.aktive_user()
    }

    pub fn statistik(&self) -> GatewayStatistik {
        GatewayStatistik {
            verbindungen: self.registry.anzahl_verbindungen(),
            aktive_user: self.registry.aktive_user().len(),
            raeume: self.registry.anzahl_raeume(),
        }
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen fuer Handler
    // -----------------------------------------------------------------------

    /// User-ID und Anzeigename einer Verbindung
    pub(crate) fn absender(&self, connection_id: ConnectionId) -> SignalingResult<(UserId, String)> {
        self.registry
            .sitzung(&connection_id)
            .map(|e| (e.user_id.clone(), e.username.clone()))
            .ok_or_else(|| SignalingError::intern("Unbekannte Verbindung"))
    }

    /// Prueft, dass eine Raum-ID vorhanden und nicht leer ist
    pub(crate) fn raum_id_pruefen(room_id: Option<RoomId>) -> SignalingResult<RoomId> {
        match room_id {
            Some(r) if !r.is_blank() => Ok(r),
            _ => Err(SignalingError::room("roomId fehlt")),
        }
    }

    /// Prueft Raum-ID und Mitgliedschaft der Verbindung im Raum
    pub(crate) fn mitglied_pruefen(
        &self,
        connection_id: ConnectionId,
        room_id: Option<RoomId>,
    ) -> SignalingResult<RoomId> {
        let room_id = Self::raum_id_pruefen(room_id)?;
        if !self.registry.in_gruppe(&connection_id, &room_id) {
            return Err(SignalingError::room(format!(
                "Nicht Mitglied von Raum {room_id}"
            )));
        }
        Ok(room_id)
    }

    fn gauges_aktualisieren(&self) {
        self.metriken
            .connected_sessions
            .set(self.registry.anzahl_verbindungen() as i64);
        self.metriken
            .active_rooms
            .set(self.registry.anzahl_raeume() as i64);
    }

    // -----------------------------------------------------------------------
    // Reaktor
    // -----------------------------------------------------------------------

    /// Startet den Reaktor-Task und gibt das Handle zurueck
    ///
    /// Der Task endet, wenn alle Handles gedroppt wurden.
    pub fn starten(self) -> (GatewayHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(BEFEHL_QUEUE_GROESSE);
        let task = tokio::spawn(self.reaktor(rx));
        (GatewayHandle { tx }, task)
    }

    async fn reaktor(mut self, mut rx: mpsc::Receiver<GatewayBefehl>) {
        tracing::debug!("Gateway-Reaktor gestartet");
        while let Some(befehl) = rx.recv().await {
            match befehl {
                GatewayBefehl::Verbinden {
                    connection_id,
                    user,
                    tx,
                } => self.verbinden(connection_id, user, tx),
                GatewayBefehl::Ereignis {
                    connection_id,
                    ereignis,
                } => self.ereignis(connection_id, ereignis),
                GatewayBefehl::Trennen { connection_id } => self.trennen(connection_id),
                GatewayBefehl::AnUserSenden {
                    user_id,
                    ereignis,
                    antwort,
                } => {
                    let _ = antwort.send(self.an_user_senden(&user_id, &ereignis));
                }
                GatewayBefehl::AktiveUser { antwort } => {
                    let _ = antwort.send(self.aktive_user());
                }
                GatewayBefehl::Statistik { antwort } => {
                    let _ = antwort.send(self.statistik());
                }
            }
        }
        tracing::debug!("Gateway-Reaktor beendet");
    }
}

// ---------------------------------------------------------------------------
// GatewayHandle
// ---------------------------------------------------------------------------

enum GatewayBefehl {
    Verbinden {
        connection_id: ConnectionId,
        user: AuthenticatedUser,
        tx: mpsc::Sender<ServerEvent>,
    },
    Ereignis {
        connection_id: ConnectionId,
        ereignis: ClientEvent,
    },
    Trennen {
        connection_id: ConnectionId,
    },
    AnUserSenden {
        user_id: UserId,
        ereignis: ServerEvent,
        antwort: oneshot::Sender<bool>,
    },
    AktiveUser {
        antwort: oneshot::Sender<Vec<UserId>>,
    },
    Statistik {
        antwort: oneshot::Sender<GatewayStatistik>,
    },
}

/// Klonbares Handle auf den laufenden Gateway-Reaktor
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<GatewayBefehl>,
}

impl GatewayHandle {
    pub async fn verbinden(
        &self,
        connection_id: ConnectionId,
        user: AuthenticatedUser,
        tx: mpsc::Sender<ServerEvent>,
    ) -> SignalingResult<()> {
        self.befehl(GatewayBefehl::Verbinden {
            connection_id,
            user,
            tx,
        })
        .await
    }

    pub async fn ereignis(
        &self,
        connection_id: ConnectionId,
        ereignis: ClientEvent,
    ) -> SignalingResult<()> {
        self.befehl(GatewayBefehl::Ereignis {
            connection_id,
            ereignis,
        })
        .await
    }

    pub async fn trennen(&self, connection_id: ConnectionId) -> SignalingResult<()> {
        self.befehl(GatewayBefehl::Trennen { connection_id }).await
    }

    /// Sendet ein Ereignis an die aktive Session eines Users
    ///
    /// `Ok(false)`, wenn der User keine aktive Session hat.
    pub async fn an_user_senden(
        &self,
        user_id: UserId,
        ereignis: ServerEvent,
    ) -> SignalingResult<bool> {
        let (antwort, rx) = oneshot::channel();
        self.befehl(GatewayBefehl::AnUserSenden {
            user_id,
            ereignis,
            antwort,
        })
        .await?;
        rx.await.map_err(|_| reaktor_beendet())
    }

    pub async fn aktive_user(&self) -> SignalingResult<Vec<UserId>> {
        let (antwort, rx) = oneshot::channel();
        self.befehl(GatewayBefehl::AktiveUser { antwort }).await?;
        rx.await.map_err(|_| reaktor_beendet())
    }

    pub async fn statistik(&self) -> SignalingResult<GatewayStatistik> {
        let (antwort, rx) = oneshot::channel();
        self.befehl(GatewayBefehl::Statistik { antwort }).await?;
        rx.await.map_err(|_| reaktor_beendet())
    }

    async fn befehl(&self, befehl: GatewayBefehl) -> SignalingResult<()> {
        self.tx.send(befehl).await.map_err(|_| reaktor_beendet())
    }
}

fn reaktor_beendet() -> SignalingError {
    SignalingError::intern("Gateway-Reaktor beendet")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
