//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sealroom_protocol::Envelope;

use crate::error::{CryptoError, CryptoResult};

/// Laenge eines AES-256-Schluessels
pub const KEY_LEN: usize = 32;
/// Laenge des AES-GCM-IV
pub const IV_LEN: usize = 12;
/// Laenge des PBKDF2-Salts
pub const SALT_LEN: usize = 16;
/// PBKDF2-HMAC-SHA256 Iterationen
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fuellt einen Puffer aus dem Betriebssystem-RNG
pub(crate) fn zufallsbytes<const N: usize>() -> CryptoResult<[u8; N]> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::Unavailable(format!("OS-Zufallsquelle: {e}")))?;
    Ok(buf)
}

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Symmetrischer AES-256-GCM Schluessel (genau 32 Bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricKey(SecretBytes);

impl SymmetricKey {
    /// Uebernimmt 32 Rohbytes als Schluessel
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::KeyImportFailed(format!(
                "erwartet {KEY_LEN} Bytes, erhalten {}",
                bytes.len()
            )));
        }
        Ok(Self(SecretBytes::new(bytes.to_vec())))
    }

    pub(crate) fn from_secret(secret: SecretBytes) -> CryptoResult<Self> {
        if secret.len() != KEY_LEN {
            return Err(CryptoError::KeyImportFailed(format!(
                "erwartet {KEY_LEN} Bytes, erhalten {}",
                secret.len()
            )));
        }
        Ok(Self(secret))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// AES-GCM Initialisierungsvektor (pro Verschluesselung neu)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_LEN]);

impl Iv {
    pub fn random() -> CryptoResult<Self> {
        Ok(Self(zufallsbytes::<IV_LEN>()?))
    }

    pub fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// PBKDF2-Salt (pro Schluesselableitung neu)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    pub fn random() -> CryptoResult<Self> {
        Ok(Self(zufallsbytes::<SALT_LEN>()?))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// Verschluesselter Payload (Ciphertext inkl. Auth-Tag + IV, optional Salt)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: Iv,
    pub salt: Option<Salt>,
}

impl EncryptedPayload {
    /// Kodiert den Payload fuer den Draht (Standard-Base64)
    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            ciphertext: STANDARD.encode(&self.ciphertext),
            iv: STANDARD.encode(self.iv.as_bytes()),
            salt: self.salt.map(|s| STANDARD.encode(s.as_bytes())),
        }
    }

    /// Dekodiert einen Envelope und prueft die Feldlaengen
    pub fn from_envelope(envelope: &Envelope) -> CryptoResult<Self> {
        let ciphertext = decode_feld("ciphertext", &envelope.ciphertext)?;
        let iv = Iv(fixe_laenge("iv", &decode_feld("iv", &envelope.iv)?)?);
        let salt = match &envelope.salt {
            Some(s) => Some(Salt(fixe_laenge("salt", &decode_feld("salt", s)?)?)),
            None => None,
        };
        Ok(Self {
            ciphertext,
            iv,
            salt,
        })
    }
}

fn decode_feld(feld: &str, wert: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(wert)
        .map_err(|e| CryptoError::InvalidData(format!("{feld}: {e}")))
}

fn fixe_laenge<const N: usize>(feld: &str, bytes: &[u8]) -> CryptoResult<[u8; N]> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidData(format!(
            "{feld}: erwartet {N} Bytes, erhalten {}",
            bytes.len()
        ))
    })
}

/// Entschluesselte bzw. zu verschluesselnde Datei
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
