//! Client-Zustand – Nachrichtenverlauf und Benachrichtigungen

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sealroom_core::types::{MessageId, RoomId, UserId};
use sealroom_crypto::FileData;
use sealroom_protocol::ErrorCode;

/// Entschluesselter Inhalt einer Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inhalt {
    Text(String),
    Datei(FileData),
}

/// Eine Nachricht im Verlauf des aktiven Raums
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub room_id: RoomId,
    pub inhalt: Inhalt,
    pub timestamp: DateTime<Utc>,
    /// Eigene Nachricht (lokales Echo)
    pub is_own: bool,
}

impl ChatMessage {
    /// Text der Nachricht, `None` bei Dateien
    pub fn text(&self) -> Option<&str> {
        match &self.inhalt {
            Inhalt::Text(t) => Some(t),
            Inhalt::Datei(_) => None,
        }
    }
}

/// Nachrichtenverlauf mit Deduplizierung ueber die Message-ID
#[derive(Debug, Default)]
pub struct MessageLog {
    eintraege: Vec<ChatMessage>,
    ids: HashSet<MessageId>,
}

impl MessageLog {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine Nachricht an; `false`, wenn die ID schon bekannt ist
    pub fn hinzufuegen(&mut self, nachricht: ChatMessage) -> bool {
        if !self.ids.insert(nachricht.message_id.clone()) {
            return false;
        }
        self.eintraege.push(nachricht);
        true
    }

    pub fn enthaelt(&self, message_id: &MessageId) -> bool {
        self.ids.contains(message_id)
    }

    pub fn eintraege(&self) -> &[ChatMessage] {
        &self.eintraege
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub fn leeren(&mut self) {
        self.eintraege.clear();
        self.ids.clear();
    }
}

/// Status eines anderen Users aus `status:updated`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatus {
    pub status: String,
    pub custom_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Alles, was dem Benutzer angezeigt werden soll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    RaumBetreten { room_id: RoomId },
    RaumVerlassen { room_id: RoomId },
    UserBeigetreten { user_id: UserId, username: String },
    UserGegangen { user_id: UserId, username: String },
    /// Neue Nachricht eines anderen Users im aktiven Raum
    Nachricht(ChatMessage),
    /// Nachricht konnte nicht entschluesselt werden und wurde verworfen
    EntschluesselungFehlgeschlagen { message_id: MessageId, fehler: String },
    /// Aelterer Raumschluessel eines Mitglieds uebernommen
    SchluesselUebernommen { fingerprint: String },
    /// Schluesselaustausch fehlgeschlagen
    SchluesselFehler { fehler: String },
    ServerFehler { code: ErrorCode, message: String },
    Getrennt,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nachricht(id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            message_id: MessageId::from(id),
            sender_id: UserId::from("u1"),
            sender_name: "Anna".into(),
            room_id: RoomId::from("r1"),
            inhalt: Inhalt::Text(text.into()),
            timestamp: Utc::now(),
            is_own: false,
        }
    }

    #[test]
    fn doppelte_id_wird_ignoriert() {
        let mut log = MessageLog::neu();
        assert!(log.hinzufuegen(nachricht("m1", "hallo")));
        assert!(!log.hinzufuegen(nachricht("m1", "anders")));
        assert_eq!(log.len(), 1);
        assert_eq!(log.eintraege()[0].text(), Some("hallo"));
    }

    #[test]
    fn leeren_vergisst_ids() {
        let mut log = MessageLog::neu();
        log.hinzufuegen(nachricht("m1", "hallo"));
        log.leeren();
        assert!(log.is_empty());
        assert!(!log.enthaelt(&MessageId::from("m1")));
        assert!(log.hinzufuegen(nachricht("m1", "hallo")));
    }
}
