//! Client-Orchestrator – Raumzustand, Verschluesselung, Praesenz
//!
//! ## Zustandsmaschine
//! ```text
//! Idle --beitreten(raum)--> Aktiv(raum, raumschluessel)
//!   ^                          |
//!   +---- verlassen/getrennt --+
//! ```
//!
//! Der Orchestrator ist transportfrei: abgehende Ereignisse landen in einer
//! Queue, eingehende kommen ueber [`ClientOrchestrator::ereignis_verarbeiten`].
//! Sichtbare Ergebnisse gehen als [`Notification`] auf einen eigenen Kanal.
//!
//! ## Raumschluessel-Einigung
//! Jeder Client erzeugt beim Beitritt einen eigenen Raumschluessel und
//! meldet seinen oeffentlichen Schluessel (`key:announce`). Mitglieder
//! antworten mit ihrem paarweise verpackten Raumschluessel (`room:key`).
//! Uebernommen wird nur ein aelterer Schluessel; ist der eigene aelter,
//! geht er an den Absender zurueck. Alle landen beim aeltesten Schluessel.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use sealroom_core::types::{MessageId, RoomId, UserId};
use sealroom_crypto::{
    decrypt_file, decrypt_text, encrypt_file, encrypt_text, generate_room_key, unwrap_room_key,
    wrap_room_key, CryptoError, CryptoResult, EncryptedFile, EncryptedPayload, FileData, KeyStore,
    PublicKey, RoomKey,
};
use sealroom_protocol::{
    ClientEvent, FileMeta, FileShareRequest, KeyAnnounceRequest, KeyAnnouncement,
    MessageReadRequest, MessageSendRequest, RelayedFile, RelayedMessage, RoomKeyDelivery,
    RoomKeyShare, RoomRequest, ServerEvent, StatusUpdateRequest,
};
use tokio::sync::mpsc;

use crate::error::{ClientError, ClientResult};
use crate::state::{ChatMessage, Inhalt, MessageLog, Notification, PeerStatus};
use crate::typing::TypingDebounce;

/// Raumzustand des Clients
#[derive(Debug)]
pub enum RaumZustand {
    Idle,
    Aktiv { room_id: RoomId, room_key: RoomKey },
}

/// Empfangsseite eines neuen Orchestrators
pub struct OrchestratorKanaele {
    /// Abgehende Ereignisse an den Gateway
    pub abgehend: mpsc::UnboundedReceiver<ClientEvent>,
    /// Benachrichtigungen fuer die Oberflaeche
    pub hinweise: mpsc::UnboundedReceiver<Notification>,
}

/// Zustand und Logik eines Chat-Clients
pub struct ClientOrchestrator {
    user_id: UserId,
    username: String,
    schluessel: KeyStore,
    zustand: RaumZustand,
    nachrichten: MessageLog,
    tippen: TypingDebounce,
    online: BTreeMap<UserId, String>,
    tippende: BTreeMap<UserId, String>,
    gelesen: HashMap<MessageId, BTreeSet<UserId>>,
    status: HashMap<UserId, PeerStatus>,
    abgehend: mpsc::UnboundedSender<ClientEvent>,
    hinweise: mpsc::UnboundedSender<Notification>,
}

impl ClientOrchestrator {
    /// Erstellt einen Orchestrator mit gegebener Identitaet
    pub fn neu(
        user_id: UserId,
        username: impl Into<String>,
        schluessel: KeyStore,
    ) -> (Self, OrchestratorKanaele) {
        let (abgehend_tx, abgehend_rx) = mpsc::unbounded_channel();
        let (hinweise_tx, hinweise_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            user_id,
            username: username.into(),
            schluessel,
            zustand: RaumZustand::Idle,
            nachrichten: MessageLog::neu(),
            tippen: TypingDebounce::default(),
            online: BTreeMap::new(),
            tippende: BTreeMap::new(),
            gelesen: HashMap::new(),
            status: HashMap::new(),
            abgehend: abgehend_tx,
            hinweise: hinweise_tx,
        };
        (
            orchestrator,
            OrchestratorKanaele {
                abgehend: abgehend_rx,
                hinweise: hinweise_rx,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn zustand(&self) -> &RaumZustand {
        &self.zustand
    }

    pub fn aktiver_raum(&self) -> Option<&RoomId> {
        match &self.zustand {
            RaumZustand::Aktiv { room_id, .. } => Some(room_id),
            RaumZustand::Idle => None,
        }
    }

    /// Raumschluessel des aktiven Raums
    pub fn raumschluessel(&self) -> Option<&RoomKey> {
        match &self.zustand {
            RaumZustand::Aktiv { room_key, .. } => Some(room_key),
            RaumZustand::Idle => None,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.schluessel.public_key()
    }

    pub fn nachrichten(&self) -> &[ChatMessage] {
        self.nachrichten.eintraege()
    }

    /// Online-User (ohne sich selbst)
    pub fn online(&self) -> Vec<UserId> {
        self.online.keys().cloned().collect()
    }

    /// Tippende User im aktiven Raum (ohne sich selbst)
    pub fn tippende(&self) -> Vec<UserId> {
        self.tippende.keys().cloned().collect()
    }

    /// Wer hat eine Nachricht gelesen
    pub fn gelesen_von(&self, message_id: &MessageId) -> Vec<UserId> {
        self.gelesen
            .get(message_id)
            .map(|leser| leser.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn status_von(&self, user_id: &UserId) -> Option<&PeerStatus> {
        self.status.get(user_id)
    }

    pub fn tippt(&self) -> bool {
        self.tippen.tippt()
    }

    // -----------------------------------------------------------------------
    // Aktionen des Benutzers
    // -----------------------------------------------------------------------

    /// Betritt einen Raum mit frischem Raumschluessel
    ///
    /// Ein Wechsel aus einem anderen Raum verwirft dessen Schluessel, ohne
    /// `room:leave` zu senden.
    pub fn raum_beitreten(&mut self, room_id: RoomId) -> ClientResult<()> {
        if room_id.is_blank() {
            return Err(ClientError::Intern("Raum-ID ist leer".to_string()));
        }
        let room_key = match generate_room_key() {
            Ok(k) => k,
            Err(e) => {
                self.melden(Notification::SchluesselFehler {
                    fehler: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.zuruecksetzen();
        self.zustand = RaumZustand::Aktiv {
            room_id: room_id.clone(),
            room_key,
        };
        tracing::info!(user_id = %self.user_id, room_id = %room_id, "Raum betreten");

        self.senden(ClientEvent::RoomJoin(RoomRequest::neu(room_id.clone())))?;
        self.senden(ClientEvent::KeyAnnounce(KeyAnnounceRequest {
            room_id: Some(room_id.clone()),
            public_key: self.schluessel.public_key().to_base64(),
        }))?;
        self.melden(Notification::RaumBetreten { room_id });
        Ok(())
    }

    /// Verlaesst den aktiven Raum; im Idle-Zustand folgenlos
    pub fn raum_verlassen(&mut self) -> ClientResult<()> {
        let Some(room_id) = self.aktiver_raum().cloned() else {
            return Ok(());
        };
        self.zuruecksetzen();
        tracing::info!(user_id = %self.user_id, room_id = %room_id, "Raum verlassen");
        self.senden(ClientEvent::RoomLeave(RoomRequest::neu(room_id.clone())))?;
        self.melden(Notification::RaumVerlassen { room_id });
        Ok(())
    }

    /// Verbindung verloren: Zustand verwerfen, nichts senden
    pub fn verbindung_getrennt(&mut self) {
        self.zuruecksetzen();
        self.online.clear();
        self.melden(Notification::Getrennt);
    }

    /// Verschluesselt und sendet eine Textnachricht
    ///
    /// Die Nachricht steht sofort als lokales Echo im Verlauf.
    pub fn nachricht_senden(&mut self, text: &str) -> ClientResult<MessageId> {
        let (room_id, room_key) = self.aktiv()?;
        if text.trim().is_empty() {
            return Err(ClientError::LeereNachricht);
        }
        let payload = self.krypto_pruefen(encrypt_text(text, room_key.key()))?;

        let message_id = MessageId::new();
        let timestamp = Utc::now();
        self.senden(ClientEvent::MessageSend(MessageSendRequest {
            room_id: Some(room_id.clone()),
            envelope: Some(payload.to_envelope()),
            message_id: Some(message_id.clone()),
            timestamp: Some(timestamp),
        }))?;

        self.nachrichten.hinzufuegen(ChatMessage {
            message_id: message_id.clone(),
            sender_id: self.user_id.clone(),
            sender_name: self.username.clone(),
            room_id,
            inhalt: Inhalt::Text(text.to_string()),
            timestamp,
            is_own: true,
        });
        Ok(message_id)
    }

    /// Verschluesselt und teilt eine Datei
    pub fn datei_senden(&mut self, datei: FileData) -> ClientResult<MessageId> {
        let (room_id, room_key) = self.aktiv()?;
        let verschluesselt = self.krypto_pruefen(encrypt_file(&datei, room_key.key()))?;

        let message_id = MessageId::new();
        self.senden(ClientEvent::FileShare(FileShareRequest {
            room_id: Some(room_id.clone()),
            envelope: Some(verschluesselt.payload.to_envelope()),
            file_name: Some(verschluesselt.meta.file_name),
            file_size: Some(verschluesselt.meta.file_size),
            file_type: Some(verschluesselt.meta.file_type),
            message_id: Some(message_id.clone()),
        }))?;

        self.nachrichten.hinzufuegen(ChatMessage {
            message_id: message_id.clone(),
            sender_id: self.user_id.clone(),
            sender_name: self.username.clone(),
            room_id,
            inhalt: Inhalt::Datei(datei),
            timestamp: Utc::now(),
            is_own: true,
        });
        Ok(message_id)
    }

    /// Tastendruck im Eingabefeld
    pub fn tippen(&mut self) -> ClientResult<()> {
        let (room_id, _) = self.aktiv()?;
        if self.tippen.tastendruck(room_id.clone(), self.abgehend.clone()) {
            self.senden(ClientEvent::TypingStart(RoomRequest::neu(room_id)))?;
        }
        Ok(())
    }

    pub fn status_setzen(
        &mut self,
        status: impl Into<String>,
        custom_message: Option<String>,
    ) -> ClientResult<()> {
        self.senden(ClientEvent::StatusUpdate(StatusUpdateRequest {
            status: status.into(),
            custom_message,
        }))
    }

    pub fn als_gelesen_markieren(&mut self, message_id: MessageId) -> ClientResult<()> {
        let (room_id, _) = self.aktiv()?;
        self.senden(ClientEvent::MessageRead(MessageReadRequest {
            message_id: Some(message_id),
            room_id: Some(room_id),
        }))
    }

    // -----------------------------------------------------------------------
    // Eingehende Ereignisse
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Ereignis vom Gateway
    pub async fn ereignis_verarbeiten(&mut self, ereignis: ServerEvent) -> ClientResult<()> {
        match ereignis {
            ServerEvent::UserOnline(p) => {
                if p.user_id != self.user_id {
                    self.online.insert(p.user_id, p.username);
                }
            }
            ServerEvent::UserOffline(p) => {
                self.online.remove(&p.user_id);
                self.tippende.remove(&p.user_id);
            }
            ServerEvent::UserJoined(p) => {
                if self.ist_aktiver_raum(&p.room_id) && p.user_id != self.user_id {
                    self.melden(Notification::UserBeigetreten {
                        user_id: p.user_id,
                        username: p.username,
                    });
                }
            }
            ServerEvent::UserLeft(p) => {
                if self.ist_aktiver_raum(&p.room_id) {
                    self.tippende.remove(&p.user_id);
                    self.schluessel.forget_peer(&p.user_id);
                    self.melden(Notification::UserGegangen {
                        user_id: p.user_id,
                        username: p.username,
                    });
                }
            }
            ServerEvent::MessageReceived(m) => self.nachricht_empfangen(m),
            ServerEvent::FileReceived(f) => self.datei_empfangen(f),
            ServerEvent::TypingStarted(t) => {
                if self.ist_aktiver_raum(&t.room_id) && t.user_id != self.user_id {
                    self.tippende.insert(t.user_id, t.username);
                }
            }
            ServerEvent::TypingStopped(t) => {
                if self.ist_aktiver_raum(&t.room_id) {
                    self.tippende.remove(&t.user_id);
                }
            }
            ServerEvent::MessageRead(q) => {
                if self.ist_aktiver_raum(&q.room_id) {
                    self.gelesen
                        .entry(q.message_id)
                        .or_default()
                        .insert(q.read_by);
                }
            }
            ServerEvent::StatusUpdated(s) => {
                self.status.insert(
                    s.user_id,
                    PeerStatus {
                        status: s.status,
                        custom_message: s.custom_message,
                        timestamp: s.timestamp,
                    },
                );
            }
            ServerEvent::KeyAnnounced(a) => self.schluessel_angekuendigt(a).await?,
            ServerEvent::RoomKey(d) => self.schluessel_erhalten(d).await?,
            ServerEvent::Error(info) => {
                tracing::warn!(code = ?info.code, meldung = %info.message, "Fehler vom Gateway");
                self.melden(Notification::ServerFehler {
                    code: info.code,
                    message: info.message,
                });
            }
        }
        Ok(())
    }

    fn nachricht_empfangen(&mut self, m: RelayedMessage) {
        let Some(room_key) = self.schluessel_fuer(&m.room_id, &m.message_id) else {
            return;
        };
        let text = EncryptedPayload::from_envelope(&m.envelope)
            .and_then(|payload| decrypt_text(&payload, room_key.key()));
        match text {
            Ok(text) => self.empfangen(ChatMessage {
                is_own: m.sender_id == self.user_id,
                message_id: m.message_id,
                sender_id: m.sender_id,
                sender_name: m.sender_name,
                room_id: m.room_id,
                inhalt: Inhalt::Text(text),
                timestamp: m.timestamp,
            }),
            Err(e) => self.entschluesselung_fehlgeschlagen(m.message_id, e),
        }
    }

    fn datei_empfangen(&mut self, f: RelayedFile) {
        let Some(room_key) = self.schluessel_fuer(&f.room_id, &f.message_id) else {
            return;
        };
        let datei = EncryptedPayload::from_envelope(&f.envelope).and_then(|payload| {
            decrypt_file(
                &EncryptedFile {
                    payload,
                    meta: FileMeta {
                        file_name: f.file_name.clone(),
                        file_size: f.file_size,
                        file_type: f.file_type.clone(),
                    },
                },
                room_key.key(),
            )
        });
        match datei {
            Ok(datei) => self.empfangen(ChatMessage {
                is_own: f.sender_id == self.user_id,
                message_id: f.message_id,
                sender_id: f.sender_id,
                sender_name: f.sender_name,
                room_id: f.room_id,
                inhalt: Inhalt::Datei(datei),
                timestamp: f.timestamp,
            }),
            Err(e) => self.entschluesselung_fehlgeschlagen(f.message_id, e),
        }
    }

    /// Raumschluessel fuer eine eingehende Nachricht, `None` bei fremdem
    /// Raum oder bereits bekannter ID
    fn schluessel_fuer(&self, room_id: &RoomId, message_id: &MessageId) -> Option<RoomKey> {
        match &self.zustand {
            RaumZustand::Aktiv {
                room_id: aktiv,
                room_key,
            } if aktiv == room_id && !self.nachrichten.enthaelt(message_id) => {
                Some(room_key.clone())
            }
            _ => None,
        }
    }

    fn empfangen(&mut self, nachricht: ChatMessage) {
        let fremd = !nachricht.is_own;
        if self.nachrichten.hinzufuegen(nachricht.clone()) && fremd {
            self.melden(Notification::Nachricht(nachricht));
        }
    }

    fn entschluesselung_fehlgeschlagen(&self, message_id: MessageId, fehler: CryptoError) {
        tracing::warn!(message_id = %message_id, fehler = %fehler, "Nachricht nicht entschluesselbar");
        self.melden(Notification::EntschluesselungFehlgeschlagen {
            message_id,
            fehler: fehler.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Raumschluessel-Einigung
    // -----------------------------------------------------------------------

    /// Ein Mitglied hat seinen oeffentlichen Schluessel gemeldet
    async fn schluessel_angekuendigt(&mut self, a: KeyAnnouncement) -> ClientResult<()> {
        if !self.ist_aktiver_raum(&a.room_id) || a.user_id == self.user_id {
            return Ok(());
        }
        let peer_key = match self
            .schluessel
            .register_peer_base64(a.user_id.clone(), &a.public_key)
        {
            Ok(k) => k,
            Err(e) => {
                self.schluesselfehler(&e);
                return Ok(());
            }
        };
        self.schluessel_teilen(a.room_id, a.user_id, peer_key).await
    }

    /// Ein Mitglied hat seinen Raumschluessel fuer uns verpackt
    async fn schluessel_erhalten(&mut self, d: RoomKeyDelivery) -> ClientResult<()> {
        let Some(eigener) = self.raumschluessel().cloned() else {
            return Ok(());
        };
        if !self.ist_aktiver_raum(&d.room_id) || d.key_fingerprint == eigener.fingerprint() {
            return Ok(());
        }

        let sender_key = match self
            .schluessel
            .register_peer_base64(d.sender_id.clone(), &d.sender_public_key)
        {
            Ok(k) => k,
            Err(e) => {
                self.schluesselfehler(&e);
                return Ok(());
            }
        };

        let identity = self.schluessel.identity();
        let ergebnis = blockierend(move || {
            let wrapped = EncryptedPayload::from_envelope(&d.wrapped)?;
            unwrap_room_key(
                &wrapped,
                &identity,
                &sender_key,
                d.key_created_at,
                &d.key_fingerprint,
            )
        })
        .await;
        let empfangen = match ergebnis {
            Ok(k) => k,
            Err(e) => {
                self.schluesselfehler(&e);
                return Ok(());
            }
        };

        // Waehrend der Ableitung kann der Raum gewechselt haben
        let RaumZustand::Aktiv { room_id, room_key } = &mut self.zustand else {
            return Ok(());
        };
        if *room_id != d.room_id {
            return Ok(());
        }

        if empfangen.supersedes(room_key) {
            tracing::info!(
                room_id = %room_id,
                alt = %room_key.fingerprint(),
                neu = %empfangen.fingerprint(),
                "Aelteren Raumschluessel uebernommen"
            );
            let fingerprint = empfangen.fingerprint().to_string();
            *room_key = empfangen;
            self.melden(Notification::SchluesselUebernommen { fingerprint });
            Ok(())
        } else {
            // Eigener Schluessel ist aelter: zurueck an den Absender
            let room_id = room_id.clone();
            self.schluessel_teilen(room_id, d.sender_id, sender_key).await
        }
    }

    /// Verpackt den aktuellen Raumschluessel fuer einen Peer und sendet ihn
    async fn schluessel_teilen(
        &mut self,
        room_id: RoomId,
        empfaenger: UserId,
        peer_key: PublicKey,
    ) -> ClientResult<()> {
        let Some(room_key) = self.raumschluessel().cloned() else {
            return Ok(());
        };
        let identity = self.schluessel.identity();
        let eigener_pk = self.schluessel.public_key().to_base64();

        let schluessel = room_key.clone();
        let wrapped = match blockierend(move || wrap_room_key(&schluessel, &identity, &peer_key))
            .await
        {
            Ok(w) => w,
            Err(e) => {
                self.schluesselfehler(&e);
                return Ok(());
            }
        };

        tracing::debug!(
            room_id = %room_id,
            empfaenger = %empfaenger,
            fingerprint = %room_key.fingerprint(),
            "Raumschluessel geteilt"
        );
        self.senden(ClientEvent::RoomKey(RoomKeyShare {
            room_id: Some(room_id),
            recipient_id: empfaenger,
            wrapped: wrapped.to_envelope(),
            sender_public_key: eigener_pk,
            key_created_at: room_key.created_at_ms(),
            key_fingerprint: room_key.fingerprint().to_string(),
        }))
    }

    fn schluesselfehler(&self, fehler: &CryptoError) {
        tracing::warn!(fehler = %fehler, "Schluesselaustausch fehlgeschlagen");
        self.melden(Notification::SchluesselFehler {
            fehler: fehler.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn aktiv(&self) -> ClientResult<(RoomId, RoomKey)> {
        match &self.zustand {
            RaumZustand::Aktiv { room_id, room_key } => Ok((room_id.clone(), room_key.clone())),
            RaumZustand::Idle => Err(ClientError::NichtImRaum),
        }
    }

    fn ist_aktiver_raum(&self, room_id: &RoomId) -> bool {
        self.aktiver_raum() == Some(room_id)
    }

    /// Raumschluessel, Verlauf, Tipp-Zustand und Quittungen verwerfen
    fn zuruecksetzen(&mut self) {
        self.zustand = RaumZustand::Idle;
        self.nachrichten.leeren();
        self.tippen.abbrechen();
        self.tippende.clear();
        self.gelesen.clear();
    }

    /// Wandelt Kryptofehler in eine Benachrichtigung um
    fn krypto_pruefen<T>(&self, ergebnis: CryptoResult<T>) -> ClientResult<T> {
        ergebnis.map_err(|e| {
            tracing::warn!(fehler = %e, "Verschluesselung fehlgeschlagen");
            self.melden(Notification::SchluesselFehler {
                fehler: e.to_string(),
            });
            ClientError::Crypto(e)
        })
    }

    fn senden(&self, ereignis: ClientEvent) -> ClientResult<()> {
        self.abgehend
            .send(ereignis)
            .map_err(|_| ClientError::SitzungBeendet)
    }

    fn melden(&self, hinweis: Notification) {
        // Ohne Empfaenger wird die Benachrichtigung verworfen
        let _ = self.hinweise.send(hinweis);
    }
}

/// Fuehrt PBKDF2-lastige Arbeit ausserhalb des Event-Loops aus
async fn blockierend<T, F>(arbeit: F) -> CryptoResult<T>
where
    F: FnOnce() -> CryptoResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(arbeit)
        .await
        .map_err(|e| CryptoError::Unavailable(format!("Krypto-Task abgebrochen: {e}")))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sealroom_protocol::{ErrorCode, ErrorInfo, MessageKind, PresenceInfo, TypingInfo};

    fn orchestrator(user: &str) -> (ClientOrchestrator, OrchestratorKanaele) {
        ClientOrchestrator::neu(
            UserId::from(user),
            format!("Name {user}"),
            KeyStore::generate().unwrap(),
        )
    }

    fn abgehend(kanaele: &mut OrchestratorKanaele) -> Vec<ClientEvent> {
        let mut alle = Vec::new();
        while let Ok(ev) = kanaele.abgehend.try_recv() {
            alle.push(ev);
        }
        alle
    }

    fn hinweise(kanaele: &mut OrchestratorKanaele) -> Vec<Notification> {
        let mut alle = Vec::new();
        while let Ok(h) = kanaele.hinweise.try_recv() {
            alle.push(h);
        }
        alle
    }

    fn relayed(room: &str, id: &str, payload: &EncryptedPayload) -> ServerEvent {
        ServerEvent::MessageReceived(RelayedMessage {
            message_id: MessageId::from(id),
            sender_id: UserId::from("u2"),
            sender_name: "Name u2".into(),
            room_id: RoomId::from(room),
            envelope: payload.to_envelope(),
            timestamp: Utc::now(),
            kind: MessageKind::Message,
        })
    }

    #[tokio::test]
    async fn beitritt_sendet_join_und_announce() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();

        let ev = abgehend(&mut k);
        assert_eq!(ev.len(), 2);
        assert!(matches!(&ev[0], ClientEvent::RoomJoin(r) if r.room_id == Some(RoomId::from("r1"))));
        match &ev[1] {
            ClientEvent::KeyAnnounce(a) => assert_eq!(a.public_key, o.public_key().to_base64()),
            anderes => panic!("Unerwartet: {anderes:?}"),
        }
        assert!(o.raumschluessel().is_some());
        assert_eq!(
            hinweise(&mut k),
            vec![Notification::RaumBetreten {
                room_id: RoomId::from("r1")
            }]
        );
    }

    #[tokio::test]
    async fn raumwechsel_ohne_leave() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        let alter = o.raumschluessel().unwrap().fingerprint().to_string();
        o.nachricht_senden("hallo").unwrap();
        abgehend(&mut k);

        o.raum_beitreten(RoomId::from("r2")).unwrap();
        let ev = abgehend(&mut k);
        assert!(ev.iter().all(|e| !matches!(e, ClientEvent::RoomLeave(_))));
        assert_eq!(o.aktiver_raum(), Some(&RoomId::from("r2")));
        assert_ne!(o.raumschluessel().unwrap().fingerprint(), alter);
        assert!(o.nachrichten().is_empty());
    }

    #[tokio::test]
    async fn senden_ohne_raum_oder_leer_scheitert() {
        let (mut o, mut k) = orchestrator("u1");
        assert!(matches!(
            o.nachricht_senden("hallo"),
            Err(ClientError::NichtImRaum)
        ));
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut k);
        assert!(matches!(
            o.nachricht_senden("   "),
            Err(ClientError::LeereNachricht)
        ));
        assert!(abgehend(&mut k).is_empty());
    }

    #[tokio::test]
    async fn lokales_echo_und_deduplizierung() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut k);

        let id = o.nachricht_senden("hallo").unwrap();
        assert_eq!(o.nachrichten().len(), 1);
        assert!(o.nachrichten()[0].is_own);
        assert_eq!(o.nachrichten()[0].text(), Some("hallo"));

        // Echo vom Gateway mit derselben ID
        let envelope = match abgehend(&mut k).pop() {
            Some(ClientEvent::MessageSend(req)) => req.envelope.unwrap(),
            anderes => panic!("Unerwartet: {anderes:?}"),
        };
        let echo = ServerEvent::MessageReceived(RelayedMessage {
            message_id: id,
            sender_id: UserId::from("u1"),
            sender_name: "Name u1".into(),
            room_id: RoomId::from("r1"),
            envelope,
            timestamp: Utc::now(),
            kind: MessageKind::Message,
        });
        o.ereignis_verarbeiten(echo).await.unwrap();
        assert_eq!(o.nachrichten().len(), 1);
    }

    #[tokio::test]
    async fn fremde_nachricht_wird_entschluesselt() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        hinweise(&mut k);

        let payload = encrypt_text("servus", o.raumschluessel().unwrap().key()).unwrap();
        o.ereignis_verarbeiten(relayed("r1", "m1", &payload))
            .await
            .unwrap();

        assert_eq!(o.nachrichten().len(), 1);
        assert!(!o.nachrichten()[0].is_own);
        assert_eq!(o.nachrichten()[0].text(), Some("servus"));
        assert!(matches!(hinweise(&mut k).as_slice(), [Notification::Nachricht(_)]));
    }

    #[tokio::test]
    async fn falscher_schluessel_ergibt_hinweis() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        hinweise(&mut k);

        let fremd = generate_room_key().unwrap();
        let payload = encrypt_text("geheim", fremd.key()).unwrap();
        o.ereignis_verarbeiten(relayed("r1", "m1", &payload))
            .await
            .unwrap();

        assert!(o.nachrichten().is_empty());
        assert!(matches!(
            hinweise(&mut k).as_slice(),
            [Notification::EntschluesselungFehlgeschlagen { message_id, .. }] if message_id.as_str() == "m1"
        ));
    }

    #[tokio::test]
    async fn nachricht_aus_anderem_raum_wird_ignoriert() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        hinweise(&mut k);

        let payload = encrypt_text("x", o.raumschluessel().unwrap().key()).unwrap();
        o.ereignis_verarbeiten(relayed("r2", "m1", &payload))
            .await
            .unwrap();
        assert!(o.nachrichten().is_empty());
        assert!(hinweise(&mut k).is_empty());
    }

    #[tokio::test]
    async fn praesenz_und_tippende() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut k);

        let presence = PresenceInfo {
            user_id: UserId::from("u2"),
            username: "Name u2".into(),
            timestamp: Utc::now(),
        };
        o.ereignis_verarbeiten(ServerEvent::UserOnline(presence.clone()))
            .await
            .unwrap();
        assert_eq!(o.online(), vec![UserId::from("u2")]);

        let tippen = TypingInfo {
            user_id: UserId::from("u2"),
            username: "Name u2".into(),
            room_id: RoomId::from("r1"),
        };
        o.ereignis_verarbeiten(ServerEvent::TypingStarted(tippen.clone()))
            .await
            .unwrap();
        assert_eq!(o.tippende(), vec![UserId::from("u2")]);
        o.ereignis_verarbeiten(ServerEvent::TypingStopped(tippen))
            .await
            .unwrap();
        assert!(o.tippende().is_empty());

        o.ereignis_verarbeiten(ServerEvent::UserOffline(presence))
            .await
            .unwrap();
        assert!(o.online().is_empty());
    }

    #[tokio::test]
    async fn serverfehler_wird_gemeldet() {
        let (mut o, mut k) = orchestrator("u1");
        o.ereignis_verarbeiten(ServerEvent::Error(ErrorInfo {
            code: ErrorCode::RoomError,
            message: "roomId fehlt".into(),
        }))
        .await
        .unwrap();
        assert_eq!(
            hinweise(&mut k),
            vec![Notification::ServerFehler {
                code: ErrorCode::RoomError,
                message: "roomId fehlt".into()
            }]
        );
    }

    #[tokio::test]
    async fn verlassen_verwirft_zustand() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        o.nachricht_senden("hallo").unwrap();
        abgehend(&mut k);

        o.raum_verlassen().unwrap();
        assert!(matches!(o.zustand(), RaumZustand::Idle));
        assert!(o.nachrichten().is_empty());
        assert!(matches!(
            abgehend(&mut k).as_slice(),
            [ClientEvent::RoomLeave(_)]
        ));

        // Im Idle-Zustand folgenlos
        o.raum_verlassen().unwrap();
        assert!(abgehend(&mut k).is_empty());
    }

    #[tokio::test]
    async fn trennung_sendet_nichts() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        o.tippen().unwrap();
        abgehend(&mut k);
        hinweise(&mut k);

        o.verbindung_getrennt();
        assert!(o.aktiver_raum().is_none());
        assert!(!o.tippt());
        assert!(abgehend(&mut k).is_empty());
        assert_eq!(hinweise(&mut k), vec![Notification::Getrennt]);
    }

    #[tokio::test]
    async fn schluessel_einigung_auf_aeltesten() {
        let (mut a, mut ka) = orchestrator("u1");
        let (mut b, mut kb) = orchestrator("u2");
        a.raum_beitreten(RoomId::from("r1")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        b.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut ka);
        abgehend(&mut kb);
        let aelterer = a.raumschluessel().unwrap().fingerprint().to_string();

        // b meldet sich an, a antwortet mit seinem Schluessel
        a.ereignis_verarbeiten(ServerEvent::KeyAnnounced(KeyAnnouncement {
            user_id: UserId::from("u2"),
            username: "Name u2".into(),
            room_id: RoomId::from("r1"),
            public_key: b.public_key().to_base64(),
        }))
        .await
        .unwrap();
        let share = match abgehend(&mut ka).pop() {
            Some(ClientEvent::RoomKey(s)) => s,
            anderes => panic!("Unerwartet: {anderes:?}"),
        };
        assert_eq!(share.recipient_id, UserId::from("u2"));

        b.ereignis_verarbeiten(ServerEvent::RoomKey(RoomKeyDelivery {
            room_id: RoomId::from("r1"),
            sender_id: UserId::from("u1"),
            wrapped: share.wrapped,
            sender_public_key: share.sender_public_key,
            key_created_at: share.key_created_at,
            key_fingerprint: share.key_fingerprint,
        }))
        .await
        .unwrap();

        assert_eq!(b.raumschluessel().unwrap().fingerprint(), aelterer);
        assert!(abgehend(&mut kb).is_empty());
        assert!(hinweise(&mut kb)
            .iter()
            .any(|h| matches!(h, Notification::SchluesselUebernommen { .. })));
    }

    #[tokio::test]
    async fn neuerer_schluessel_wird_zurueckgeschickt() {
        let (mut a, mut ka) = orchestrator("u1");
        let (mut b, mut kb) = orchestrator("u2");
        a.raum_beitreten(RoomId::from("r1")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        b.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut ka);
        abgehend(&mut kb);
        let eigener = a.raumschluessel().unwrap().fingerprint().to_string();

        // b verteilt seinen neueren Schluessel an a
        b.ereignis_verarbeiten(ServerEvent::KeyAnnounced(KeyAnnouncement {
            user_id: UserId::from("u1"),
            username: "Name u1".into(),
            room_id: RoomId::from("r1"),
            public_key: a.public_key().to_base64(),
        }))
        .await
        .unwrap();
        let share = match abgehend(&mut kb).pop() {
            Some(ClientEvent::RoomKey(s)) => s,
            anderes => panic!("Unerwartet: {anderes:?}"),
        };
        a.ereignis_verarbeiten(ServerEvent::RoomKey(RoomKeyDelivery {
            room_id: RoomId::from("r1"),
            sender_id: UserId::from("u2"),
            wrapped: share.wrapped,
            sender_public_key: share.sender_public_key,
            key_created_at: share.key_created_at,
            key_fingerprint: share.key_fingerprint,
        }))
        .await
        .unwrap();

        // a behaelt seinen aelteren Schluessel und schickt ihn an b
        assert_eq!(a.raumschluessel().unwrap().fingerprint(), eigener);
        match abgehend(&mut ka).as_slice() {
            [ClientEvent::RoomKey(s)] => {
                assert_eq!(s.recipient_id, UserId::from("u2"));
                assert_eq!(s.key_fingerprint, eigener);
            }
            anderes => panic!("Unerwartet: {anderes:?}"),
        }
    }

    #[tokio::test]
    async fn viele_ankuendigungen_ohne_leser_blockieren_nicht() {
        let (mut o, mut k) = orchestrator("u1");
        o.raum_beitreten(RoomId::from("r1")).unwrap();
        abgehend(&mut k);

        // Mehr Antworten, als eine begrenzte Queue von 64 fassen wuerde
        for i in 0..70 {
            let peer = KeyStore::generate().unwrap();
            let ankuendigung = ServerEvent::KeyAnnounced(KeyAnnouncement {
                user_id: UserId::from(format!("peer{i}").as_str()),
                username: format!("Peer {i}"),
                room_id: RoomId::from("r1"),
                public_key: peer.public_key().to_base64(),
            });
            tokio::time::timeout(
                std::time::Duration::from_secs(10),
                o.ereignis_verarbeiten(ankuendigung),
            )
            .await
            .expect("Verarbeitung blockiert")
            .unwrap();
        }

        let antworten = abgehend(&mut k);
        assert_eq!(antworten.len(), 70);
        assert!(antworten
            .iter()
            .all(|ev| matches!(ev, ClientEvent::RoomKey(_))));
    }
}
