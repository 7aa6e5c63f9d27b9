//! Client- und Server-Ereignisse
//!
//! ## Design
//! - Adjacently-tagged Enums: `{"event": "room:join", "data": {...}}`
//! - Felder im Draht-Format als camelCase
//! - Pflichtfelder von Anfragen sind `Option`, damit fehlende Werte als
//!   Raum- bzw. Protokollfehler beantwortet werden statt als Parse-Fehler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sealroom_core::types::{MessageId, RoomId, UserId};

use crate::envelope::Envelope;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `error`-Ereignisse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame nicht parsebar oder Pflichtfeld fehlt
    InvalidRequest,
    /// Raum fehlt oder Sender ist nicht Mitglied
    RoomError,
    InternalError,
}

/// Payload eines `error`-Ereignisses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Client -> Gateway
// ---------------------------------------------------------------------------

/// Anfrage mit nur einer Raum-ID (join, leave, typing)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_id: Option<RoomId>,
}

impl RoomRequest {
    pub fn neu(room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendRequest {
    pub room_id: Option<RoomId>,
    pub envelope: Option<Envelope>,
    /// Fehlt die ID, vergibt das Gateway eine
    pub message_id: Option<MessageId>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileShareRequest {
    pub room_id: Option<RoomId>,
    pub envelope: Option<Envelope>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadRequest {
    pub message_id: Option<MessageId>,
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
    pub custom_message: Option<String>,
}

/// Oeffentlicher Identitaetsschluessel eines Raummitglieds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAnnounceRequest {
    pub room_id: Option<RoomId>,
    /// X25519-Public-Key, Base64
    #[serde(default)]
    pub public_key: String,
}

/// Raumschluessel, fuer genau einen Empfaenger verpackt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomKeyShare {
    pub room_id: Option<RoomId>,
    pub recipient_id: UserId,
    /// Pairwise-Envelope (mit Salt) um die 32 Schluesselbytes
    pub wrapped: Envelope,
    pub sender_public_key: String,
    /// Erzeugungszeitpunkt des Raumschluessels (Unix-Millisekunden)
    pub key_created_at: i64,
    pub key_fingerprint: String,
}

/// Alle Ereignisse, die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "room:join")]
    RoomJoin(RoomRequest),
    #[serde(rename = "room:leave")]
    RoomLeave(RoomRequest),
    #[serde(rename = "message:send")]
    MessageSend(MessageSendRequest),
    #[serde(rename = "file:share")]
    FileShare(FileShareRequest),
    #[serde(rename = "typing:start")]
    TypingStart(RoomRequest),
    #[serde(rename = "typing:stop")]
    TypingStop(RoomRequest),
    #[serde(rename = "message:read")]
    MessageRead(MessageReadRequest),
    #[serde(rename = "status:update")]
    StatusUpdate(StatusUpdateRequest),
    #[serde(rename = "key:announce")]
    KeyAnnounce(KeyAnnounceRequest),
    #[serde(rename = "room:key")]
    RoomKey(RoomKeyShare),
}

impl ClientEvent {
    /// Name des Ereignisses wie auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoin(_) => "room:join",
            Self::RoomLeave(_) => "room:leave",
            Self::MessageSend(_) => "message:send",
            Self::FileShare(_) => "file:share",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::MessageRead(_) => "message:read",
            Self::StatusUpdate(_) => "status:update",
            Self::KeyAnnounce(_) => "key:announce",
            Self::RoomKey(_) => "room:key",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Gateway -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInfo {
    pub user_id: UserId,
    pub username: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedMessage {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub room_id: RoomId,
    pub envelope: Envelope,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedFile {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub room_id: RoomId,
    pub envelope: Envelope,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingInfo {
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub read_by: UserId,
    pub read_by_username: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub user_id: UserId,
    pub username: String,
    pub status: String,
    pub custom_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAnnouncement {
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomKeyDelivery {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub wrapped: Envelope,
    pub sender_public_key: String,
    pub key_created_at: i64,
    pub key_fingerprint: String,
}

/// Alle Ereignisse, die das Gateway an Clients verteilt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user:online")]
    UserOnline(PresenceInfo),
    #[serde(rename = "user:offline")]
    UserOffline(PresenceInfo),
    #[serde(rename = "user:joined")]
    UserJoined(RoomPresence),
    #[serde(rename = "user:left")]
    UserLeft(RoomPresence),
    #[serde(rename = "message:received")]
    MessageReceived(RelayedMessage),
    #[serde(rename = "file:received")]
    FileReceived(RelayedFile),
    #[serde(rename = "typing:started")]
    TypingStarted(TypingInfo),
    #[serde(rename = "typing:stopped")]
    TypingStopped(TypingInfo),
    #[serde(rename = "message:read")]
    MessageRead(ReadReceipt),
    #[serde(rename = "status:updated")]
    StatusUpdated(StatusInfo),
    #[serde(rename = "key:announced")]
    KeyAnnounced(KeyAnnouncement),
    #[serde(rename = "room:key")]
    RoomKey(RoomKeyDelivery),
    #[serde(rename = "error")]
    Error(ErrorInfo),
}

impl ServerEvent {
    /// Erstellt ein Fehler-Ereignis
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorInfo {
            code,
            message: message.into(),
        })
    }

    /// Name des Ereignisses wie auf dem Draht (auch Metrik-Label)
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserOnline(_) => "user:online",
            Self::UserOffline(_) => "user:offline",
            Self::UserJoined(_) => "user:joined",
            Self::UserLeft(_) => "user:left",
            Self::MessageReceived(_) => "message:received",
            Self::FileReceived(_) => "file:received",
            Self::TypingStarted(_) => "typing:started",
            Self::TypingStopped(_) => "typing:stopped",
            Self::MessageRead(_) => "message:read",
            Self::StatusUpdated(_) => "status:updated",
            Self::KeyAnnounced(_) => "key:announced",
            Self::RoomKey(_) => "room:key",
            Self::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
