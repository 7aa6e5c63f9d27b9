//! Session-Registry – Verbindungen, aktive Sessions, Raumgruppen
//!
//! Die Registry gehoert genau einem Gateway-Reaktor und wird nur von dessen
//! Task veraendert; sie braucht deshalb keine Locks.
//!
//! ## Drei Sichten
//! - Verbindungen: jede offene Socket-Verbindung mit ihrem Sender
//! - Aktive Session: pro User genau eine Verbindung (die zuletzt verbundene)
//! - Mitgliedschaft: pro User hoechstens ein Raum
//!
//! Multicast-Gruppen enthalten Verbindungen, nicht User. Eine verdraengte
//! Verbindung bleibt in ihrer Gruppe, bis sie selbst trennt.

use std::collections::HashMap;

use sealroom_core::types::{ConnectionId, RoomId, UserId};

use crate::broadcast::ClientSender;

/// Eintrag fuer eine offene Verbindung
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub user_id: UserId,
    pub username: String,
    pub sender: ClientSender,
    /// Multicast-Gruppe dieser Verbindung
    pub gruppe: Option<RoomId>,
}

/// Ergebnis einer Abmeldung
#[derive(Debug)]
pub struct Abmeldung {
    pub eintrag: SessionEntry,
    /// false bei einer bereits verdraengten Verbindung
    pub war_aktiv: bool,
    /// Raum-Mitgliedschaft des Users (nur wenn `war_aktiv`)
    pub mitgliedschaft: Option<RoomId>,
}

/// Zustand aller Sessions eines Gateways
#[derive(Debug, Default)]
pub struct SessionRegistry {
    verbindungen: HashMap<ConnectionId, SessionEntry>,
    aktiv: HashMap<UserId, ConnectionId>,
    mitgliedschaften: HashMap<UserId, RoomId>,
    gruppen: HashMap<RoomId, Vec<ConnectionId>>,
}

impl SessionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine neue Verbindung als aktive Session des Users
    ///
    /// Gibt die verdraengte Verbindung zurueck, falls der User schon eine
    /// aktive Session hatte.
    pub fn registrieren(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        username: String,
        sender: ClientSender,
    ) -> Option<ConnectionId> {
        self.verbindungen.insert(
            connection_id,
            SessionEntry {
                user_id: user_id.clone(),
                username,
                sender,
                gruppe: None,
            },
        );
        self.aktiv
            .insert(user_id, connection_id)
            .filter(|alt| *alt != connection_id)
    }

    pub fn sitzung(&self, connection_id: &ConnectionId) -> Option<&SessionEntry> {
        self.verbindungen.get(connection_id)
    }

    /// true, wenn die Verbindung die aktive Session ihres Users ist
    pub fn ist_aktiv(&self, connection_id: &ConnectionId) -> bool {
        self.verbindungen
            .get(connection_id)
            .and_then(|e| self.aktiv.get(&e.user_id))
            .is_some_and(|aktiv| aktiv == connection_id)
    }

    pub fn aktive_verbindung(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.aktiv.get(user_id).copied()
    }

    /// Verschiebt die Verbindung in die Gruppe `room_id`
    ///
    /// Gibt die vorherige Gruppe zurueck. Die alte Gruppe wird still
    /// verlassen.
    pub fn gruppe_beitreten(
        &mut self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> Option<RoomId> {
        let eintrag = self.verbindungen.get_mut(&connection_id)?;
        let vorher = eintrag.gruppe.replace(room_id.clone());

        if let Some(alt) = &vorher {
            if alt != room_id {
                Self::aus_gruppe_entfernen(&mut self.gruppen, alt, connection_id);
            }
        }
        let mitglieder = self.gruppen.entry(room_id.clone()).or_default();
        if !mitglieder.contains(&connection_id) {
            mitglieder.push(connection_id);
        }
        vorher
    }

    /// Entfernt die Verbindung aus der Gruppe `room_id`
    ///
    /// Gibt `false` zurueck, wenn sie nicht Mitglied war.
    pub fn gruppe_verlassen(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let Some(eintrag) = self.verbindungen.get_mut(&connection_id) else {
            return false;
        };
        if eintrag.gruppe.as_ref() != Some(room_id) {
            return false;
        }
        eintrag.gruppe = None;
        Self::aus_gruppe_entfernen(&mut self.gruppen, room_id, connection_id);
        true
    }

    pub fn in_gruppe(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.verbindungen
            .get(connection_id)
            .is_some_and(|e| e.gruppe.as_ref() == Some(room_id))
    }

    /// Verbindungen einer Gruppe in Beitrittsreihenfolge
    pub fn gruppe(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.gruppen.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Setzt die Mitgliedschaft des Users, gibt die vorherige zurueck
    pub fn mitgliedschaft_setzen(&mut self, user_id: &UserId, room_id: &RoomId) -> Option<RoomId> {
        self.mitgliedschaften.insert(user_id.clone(), room_id.clone())
    }

    pub fn mitgliedschaft(&self, user_id: &UserId) -> Option<&RoomId> {
        self.mitgliedschaften.get(user_id)
    }

    /// Loescht die Mitgliedschaft, aber nur wenn sie `room_id` ist
    pub fn mitgliedschaft_loeschen(&mut self, user_id: &UserId, room_id: &RoomId) -> bool {
        if self.mitgliedschaften.get(user_id) == Some(room_id) {
            self.mitgliedschaften.remove(user_id);
            true
        } else {
            false
        }
    }

    /// Entfernt eine Verbindung vollstaendig
    ///
    /// War sie die aktive Session, werden auch Session und Mitgliedschaft
    /// des Users geloescht. Eine verdraengte Verbindung verlaesst nur ihre
    /// Gruppe.
    pub fn entfernen(&mut self, connection_id: ConnectionId) -> Option<Abmeldung> {
        let eintrag = self.verbindungen.remove(&connection_id)?;
        if let Some(gruppe) = &eintrag.gruppe {
            Self::aus_gruppe_entfernen(&mut self.gruppen, gruppe, connection_id);
        }

        let war_aktiv = self.aktiv.get(&eintrag.user_id) == Some(&connection_id);
        let mitgliedschaft = if war_aktiv {
            self.aktiv.remove(&eintrag.user_id);
            self.mitgliedschaften.remove(&eintrag.user_id)
        } else {
            None
        };

        Some(Abmeldung {
            eintrag,
            war_aktiv,
            mitgliedschaft,
        })
    }

    pub fn verbindungs_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.verbindungen.keys().copied()
    }

    /// User mit aktiver Session, sortiert
    pub fn aktive_user(&self) -> Vec<UserId> {
        let mut user: Vec<UserId> = self.aktiv.keys().cloned().collect();
        user.sort();
        user
    }

    pub fn anzahl_verbindungen(&self) -> usize {
        self.verbindungen.len()
    }

    pub fn anzahl_raeume(&self) -> usize {
        self.gruppen.len()
    }

    fn aus_gruppe_entfernen(
        gruppen: &mut HashMap<RoomId, Vec<ConnectionId>>,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) {
        if let Some(mitglieder) = gruppen.get_mut(room_id) {
            mitglieder.retain(|c| *c != connection_id);
            if mitglieder.is_empty() {
                gruppen.remove(room_id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
