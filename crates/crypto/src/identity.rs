//! Identitaetsschluessel (X25519)
//!
//! Jeder Client erzeugt pro Sitzung ein X25519-Schluessel-Paar. Der
//! oeffentliche Schluessel wird im Raum angekuendigt, der private
//! Schluessel verlaesst den Client nie.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{zufallsbytes, SecretBytes};

/// Oeffentlicher X25519-Schluessel (32 Bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Importiert einen fremden oeffentlichen Schluessel
    ///
    /// Lehnt falsche Laengen und den Nullpunkt ab.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::KeyImportFailed(format!(
                "oeffentlicher Schluessel: erwartet 32 Bytes, erhalten {}",
                bytes.len()
            ))
        })?;
        if arr.iter().all(|b| *b == 0) {
            return Err(CryptoError::KeyImportFailed(
                "oeffentlicher Schluessel ist der Nullpunkt".to_string(),
            ));
        }
        Ok(Self(arr))
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::KeyImportFailed(format!("Base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

/// Rohes ECDH-Ergebnis, nur Eingabe fuer die Schluesselableitung
#[derive(Debug)]
pub struct SharedSecret(SecretBytes);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Identitaets-Schluessel-Paar eines Clients
#[derive(Clone)]
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Generiert ein neues Schluessel-Paar aus dem OS-RNG
    pub fn generate() -> CryptoResult<Self> {
        let mut seed = zufallsbytes::<32>()?;
        let secret = StaticSecret::from(seed);
        seed.iter_mut().for_each(|b| *b = 0);

        let public = PublicKey(X25519PublicKey::from(&secret).to_bytes());
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// X25519-Austausch mit einem fremden oeffentlichen Schluessel
    ///
    /// Schlaegt fehl, wenn der fremde Punkt niedriger Ordnung ist und das
    /// Ergebnis deshalb nicht von unserem Geheimnis abhaengt.
    pub fn derive_shared_secret(&self, remote: &PublicKey) -> CryptoResult<SharedSecret> {
        let remote_pk = X25519PublicKey::from(*remote.as_bytes());
        let dh_output = self.secret.diffie_hellman(&remote_pk);
        if !dh_output.was_contributory() {
            return Err(CryptoError::KeyDerivationFailed(
                "ECDH-Ergebnis ist nicht kontributiv".to_string(),
            ));
        }
        Ok(SharedSecret(SecretBytes::new(dh_output.as_bytes().to_vec())))
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public.to_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Generiert ein Identitaets-Schluessel-Paar
pub fn generate_identity_key_pair() -> CryptoResult<IdentityKeyPair> {
    IdentityKeyPair::generate()
}

/// Importiert einen fremden oeffentlichen Schluessel aus Rohbytes
pub fn import_public_key(bytes: &[u8]) -> CryptoResult<PublicKey> {
    PublicKey::from_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
