//! Fehlertypen fuer den Client

use sealroom_crypto::CryptoError;
use thiserror::Error;

/// Fehlertyp fuer den Client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Aktion braucht einen aktiven Raum
    #[error("Nicht in einem Raum")]
    NichtImRaum,

    /// Leere Nachrichten werden nicht gesendet
    #[error("Nachricht ist leer")]
    LeereNachricht,

    /// Ver- oder Entschluesselung fehlgeschlagen
    #[error("Kryptofehler: {0}")]
    Crypto(#[from] CryptoError),

    /// WebSocket-Verbindung fehlgeschlagen oder abgebrochen
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Frame vom Server nicht lesbar
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Sitzung oder Ausgangs-Queue bereits beendet
    #[error("Sitzung beendet")]
    SitzungBeendet,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result-Typ fuer den Client
pub type ClientResult<T> = Result<T, ClientError>;
