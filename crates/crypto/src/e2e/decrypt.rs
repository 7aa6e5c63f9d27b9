//! Entschluesselung (AES-256-GCM)
//!
//! Jede Manipulation an Ciphertext, IV, Salt oder Schluessel fuehrt zu
//! `DecryptionFailed`. Teilweise entschluesselte Daten werden nie
//! herausgegeben.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};

use crate::e2e::encrypt::EncryptedFile;
use crate::e2e::key_exchange::{derive_shared_secret, derive_symmetric_key};
use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeyPair, PublicKey};
use crate::types::{EncryptedPayload, FileData, SymmetricKey};

/// Entschluesselt einen Payload mit einem symmetrischen Schluessel
pub fn decrypt(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    cipher
        .decrypt(
            AesNonce::from_slice(payload.iv.as_bytes()),
            payload.ciphertext.as_slice(),
        )
        .map_err(|_| {
            CryptoError::DecryptionFailed("Auth-Tag ungueltig oder falscher Schluessel".to_string())
        })
}

/// Entschluesselt einen UTF-8-Text
pub fn decrypt_text(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<String> {
    let bytes = decrypt(payload, key)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::DecryptionFailed("Klartext ist kein UTF-8".to_string()))
}

/// Entschluesselt eine Datei und uebernimmt Name und Typ aus den Metadaten
pub fn decrypt_file(file: &EncryptedFile, key: &SymmetricKey) -> CryptoResult<FileData> {
    let bytes = decrypt(&file.payload, key)?;
    Ok(FileData {
        name: file.meta.file_name.clone(),
        mime_type: file.meta.file_type.clone(),
        bytes,
    })
}

/// Pairwise-Profil: Schluessel mit dem mitgesendeten Salt neu ableiten
pub fn decrypt_pairwise(
    payload: &EncryptedPayload,
    local: &IdentityKeyPair,
    remote: &PublicKey,
) -> CryptoResult<Vec<u8>> {
    let salt = payload
        .salt
        .as_ref()
        .ok_or_else(|| CryptoError::DecryptionFailed("Salt fehlt im Envelope".to_string()))?;

    let shared = derive_shared_secret(local, remote)?;
    let (key, _) = derive_symmetric_key(&shared, Some(salt))?;
    decrypt(payload, &key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
