//! Raumschluessel
//!
//! Ein zufaelliger AES-256-Schluessel pro Raum. Mitglieder tauschen ihn
//! paarweise verpackt aus (siehe [`wrap_room_key`]) und einigen sich auf
//! den aeltesten: kleinster `created_at_ms`, bei Gleichstand kleinster
//! Fingerprint.

use std::cmp::Ordering;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use crate::e2e::decrypt::decrypt_pairwise;
use crate::e2e::encrypt::encrypt_pairwise;
use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeyPair, PublicKey};
use crate::types::{zufallsbytes, EncryptedPayload, SecretBytes, SymmetricKey, KEY_LEN};

/// Symmetrischer Schluessel eines Raums mit Herkunftsdaten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomKey {
    key: SymmetricKey,
    created_at_ms: i64,
    fingerprint: String,
}

impl RoomKey {
    /// Erzeugt einen neuen zufaelligen Raumschluessel
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = zufallsbytes::<KEY_LEN>()
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let key = Self::import(&bytes, chrono::Utc::now().timestamp_millis());
        bytes.iter_mut().for_each(|b| *b = 0);
        key
    }

    /// Uebernimmt 32 Rohbytes als Raumschluessel
    pub fn import(bytes: &[u8], created_at_ms: i64) -> CryptoResult<Self> {
        let key = SymmetricKey::from_bytes(bytes)?;
        let fingerprint = fingerprint(key.as_bytes());
        Ok(Self {
            key,
            created_at_ms,
            fingerprint,
        })
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    /// Kurzer, nicht geheimer Bezeichner des Schluessels
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Rohbytes fuer Export oder Verpackung
    pub fn export(&self) -> SecretBytes {
        SecretBytes::new(self.key.as_bytes().to_vec())
    }

    /// Ordnung fuer die Einigung: aelter kommt zuerst
    pub fn precedence(&self, other: &RoomKey) -> Ordering {
        (self.created_at_ms, self.fingerprint.as_str())
            .cmp(&(other.created_at_ms, other.fingerprint.as_str()))
    }

    /// true, wenn dieser Schluessel den anderen ersetzen soll
    pub fn supersedes(&self, other: &RoomKey) -> bool {
        self.precedence(other) == Ordering::Less
    }
}

/// SHA-256 ueber den Schluessel, erste 12 Bytes, URL-sicheres Base64
fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    URL_SAFE_NO_PAD.encode(&digest[..12])
}

/// Erzeugt einen neuen Raumschluessel
pub fn generate_room_key() -> CryptoResult<RoomKey> {
    RoomKey::generate()
}

/// Importiert einen Raumschluessel aus Rohbytes (Erzeugungszeit = jetzt)
pub fn import_room_key(bytes: &[u8]) -> CryptoResult<RoomKey> {
    RoomKey::import(bytes, chrono::Utc::now().timestamp_millis())
}

/// Verpackt einen Raumschluessel fuer genau einen Empfaenger (Pairwise-Profil)
pub fn wrap_room_key(
    room_key: &RoomKey,
    local: &IdentityKeyPair,
    recipient: &PublicKey,
) -> CryptoResult<EncryptedPayload> {
    let raw = room_key.export();
    encrypt_pairwise(raw.as_bytes(), local, recipient)
}

/// Entpackt einen Raumschluessel und prueft den angekuendigten Fingerprint
pub fn unwrap_room_key(
    wrapped: &EncryptedPayload,
    local: &IdentityKeyPair,
    sender: &PublicKey,
    created_at_ms: i64,
    expected_fingerprint: &str,
) -> CryptoResult<RoomKey> {
    let raw = SecretBytes::new(decrypt_pairwise(wrapped, local, sender)?);
    let key = RoomKey::import(raw.as_bytes(), created_at_ms)
        .map_err(|e| CryptoError::InvalidData(e.to_string()))?;
    if key.fingerprint() != expected_fingerprint {
        return Err(CryptoError::InvalidData(
            "Fingerprint des Raumschluessels stimmt nicht".to_string(),
        ));
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raumschluessel_sind_zufaellig() {
        let a = generate_room_key().unwrap();
        let b = generate_room_key().unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn export_import_ergibt_gleichen_schluessel() {
        let key = generate_room_key().unwrap();
        let importiert = import_room_key(key.export().as_bytes()).unwrap();
        assert_eq!(importiert.key(), key.key());
        assert_eq!(importiert.fingerprint(), key.fingerprint());
    }

    #[test]
    fn import_falsche_laenge() {
        assert!(matches!(
            import_room_key(&[1u8; 10]),
            Err(CryptoError::KeyImportFailed(_))
        ));
    }

    #[test]
    fn aelterer_schluessel_gewinnt() {
        let alt = RoomKey::import(&[1u8; KEY_LEN], 1_000).unwrap();
        let neu = RoomKey::import(&[2u8; KEY_LEN], 2_000).unwrap();
        assert!(alt.supersedes(&neu));
        assert!(!neu.supersedes(&alt));
        assert!(!alt.supersedes(&alt.clone()));
    }

    #[test]
    fn gleichstand_entscheidet_fingerprint() {
        let a = RoomKey::import(&[1u8; KEY_LEN], 5).unwrap();
        let b = RoomKey::import(&[2u8; KEY_LEN], 5).unwrap();
        // Genau einer der beiden gewinnt
        assert_ne!(a.supersedes(&b), b.supersedes(&a));
    }

    #[test]
    fn wrap_unwrap_zwischen_zwei_identitaeten() {
        let alice = IdentityKeyPair::generate().unwrap();
        let bob = IdentityKeyPair::generate().unwrap();
        let key = generate_room_key().unwrap();

        let wrapped = wrap_room_key(&key, &alice, &bob.public_key()).unwrap();
        let entpackt = unwrap_room_key(
            &wrapped,
            &bob,
            &alice.public_key(),
            key.created_at_ms(),
            key.fingerprint(),
        )
        .unwrap();
        assert_eq!(entpackt, key);
    }

    #[test]
    fn unwrap_mit_falschem_fingerprint() {
        let alice = IdentityKeyPair::generate().unwrap();
        let bob = IdentityKeyPair::generate().unwrap();
        let key = generate_room_key().unwrap();

        let wrapped = wrap_room_key(&key, &alice, &bob.public_key()).unwrap();
        assert!(matches!(
            unwrap_room_key(&wrapped, &bob, &alice.public_key(), 0, "falsch"),
            Err(CryptoError::InvalidData(_))
        ));
    }
}
