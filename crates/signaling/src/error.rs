//! Fehlertypen fuer den Signaling-Service

use axum::http::StatusCode;
use sealroom_auth::AuthError;
use sealroom_protocol::ErrorCode;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Authentifizierungsfehler (nur beim Handshake)
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Raum fehlt, ist leer oder der Sender ist kein Mitglied
    #[error("Raumfehler: {0}")]
    Room(String),

    /// Protokollfehler (ungueltiger Frame, fehlendes Pflichtfeld)
    #[error("Protokollfehler: {0}")]
    Protocol(String),

    /// Socket-Fehler, Verbindung wird beendet
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Server ist voll
    #[error("Server ist voll")]
    ServerVoll,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen Raumfehler
    pub fn room(msg: impl Into<String>) -> Self {
        Self::Room(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fehler-Code fuer das `error`-Ereignis an den Client
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Room(_) => ErrorCode::RoomError,
            Self::Protocol(_) => ErrorCode::InvalidRequest,
            Self::Auth(_) | Self::Transport(_) | Self::ServerVoll | Self::Intern(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// HTTP-Status, mit dem ein Upgrade abgelehnt wird
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::ServerVoll | Self::Intern(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Room(_) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Meldung fuer den Client (ohne Praefix)
    pub fn client_meldung(&self) -> String {
        match self {
            Self::Room(m) | Self::Protocol(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
