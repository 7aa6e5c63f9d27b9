//! Fehlertypen fuer das Kryptografie-Subsystem
//!
//! Jede Operation liefert genau einen dieser Fehler. Die Meldungen
//! enthalten niemals Schluesselmaterial oder Klartext.

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Kryptografie-Primitive nicht verfuegbar: {0}")]
    Unavailable(String),

    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    KeyGenerationFailed(String),

    #[error("Schluessel-Import fehlgeschlagen: {0}")]
    KeyImportFailed(String),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivationFailed(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    EncryptionFailed(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    DecryptionFailed(String),

    #[error("Ungueltige Daten: {0}")]
    InvalidData(String),

    #[error("Kein oeffentlicher Schluessel fuer {0}")]
    UnknownPeer(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
