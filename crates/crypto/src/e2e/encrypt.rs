//! Verschluesselung (AES-256-GCM)
//!
//! ## Profile
//! - Raum: Nachrichten und Dateien mit dem gemeinsamen Raumschluessel
//! - Pairwise: Schluessel per PBKDF2 aus dem ECDH-Geheimnis zweier
//!   Identitaeten, Salt reist im Envelope mit
//!
//! Jede Verschluesselung erzeugt einen frischen 12-Byte-IV.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use sealroom_protocol::FileMeta;

use crate::e2e::key_exchange::{derive_shared_secret, derive_symmetric_key};
use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeyPair, PublicKey};
use crate::types::{EncryptedPayload, FileData, Iv, SymmetricKey};

/// Verschluesselte Datei: Inhalt im Payload, Metadaten im Klartext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFile {
    pub payload: EncryptedPayload,
    pub meta: FileMeta,
}

/// Verschluesselt Rohbytes mit einem symmetrischen Schluessel
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
    let iv = Iv::random()?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(iv.as_bytes()), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedPayload {
        ciphertext,
        iv,
        salt: None,
    })
}

/// Verschluesselt einen UTF-8-Text
pub fn encrypt_text(text: &str, key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
    encrypt(text.as_bytes(), key)
}

/// Verschluesselt den Dateiinhalt; Name, Groesse und Typ bleiben lesbar
pub fn encrypt_file(file: &FileData, key: &SymmetricKey) -> CryptoResult<EncryptedFile> {
    let payload = encrypt(&file.bytes, key)?;
    Ok(EncryptedFile {
        payload,
        meta: FileMeta {
            file_name: file.name.clone(),
            file_size: file.bytes.len() as u64,
            file_type: file.mime_type.clone(),
        },
    })
}

/// Pairwise-Profil: frischer Salt, Schluessel per PBKDF2 aus ECDH
pub fn encrypt_pairwise(
    plaintext: &[u8],
    local: &IdentityKeyPair,
    remote: &PublicKey,
) -> CryptoResult<EncryptedPayload> {
    let shared = derive_shared_secret(local, remote)?;
    let (key, salt) = derive_symmetric_key(&shared, None)?;

    let mut payload = encrypt(plaintext, &key)?;
    payload.salt = Some(salt);
    Ok(payload)
}
