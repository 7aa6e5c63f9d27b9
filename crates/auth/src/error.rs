//! Fehlertypen fuer die Token-Pruefung

use thiserror::Error;

/// Alle moeglichen Fehler beim Handshake-Auth
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Kein Token uebergeben")]
    TokenFehlt,

    #[error("Token ungueltig: {0}")]
    TokenUngueltig(String),

    #[error("Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

/// Result-Alias fuer die Token-Pruefung
pub type AuthResult<T> = Result<T, AuthError>;
