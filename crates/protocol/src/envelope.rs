//! Verschluesselte Nutzlast auf dem Draht
//!
//! Alle Binaerfelder sind Standard-Base64 (mit Padding) kodiert.
//! Das Gateway reicht Envelopes unveraendert weiter.

use serde::{Deserialize, Serialize};

/// Ciphertext + IV (+ Salt beim Pairwise-Profil)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub ciphertext: String,
    pub iv: String,
    /// Nur gesetzt, wenn der Schluessel per PBKDF2 aus einem
    /// ECDH-Geheimnis abgeleitet wurde
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// Unverschluesselte Datei-Metadaten
///
/// Name, Groesse und MIME-Typ sind fuer das Gateway sichtbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
}
