//! # sealroom-crypto
//!
//! Clientseitige Ende-zu-Ende-Verschluesselung fuer Sealroom.
//!
//! ## Module
//! - `e2e` - Raumschluessel, Pairwise-Profil, AES-256-GCM
//! - `identity` - X25519 Identitaetsschluessel
//! - `types` - Gemeinsame Typen (SecretBytes, Iv, Salt, EncryptedPayload)
//! - `error` - Fehlertypen
//!
//! Rechenintensive Operationen (PBKDF2) sind synchron; async Aufrufer
//! lagern sie per `spawn_blocking` aus.

pub mod e2e;
pub mod error;
pub mod identity;
pub mod types;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use identity::{generate_identity_key_pair, import_public_key, IdentityKeyPair, PublicKey, SharedSecret};
pub use types::{EncryptedPayload, FileData, Iv, Salt, SecretBytes, SymmetricKey};

pub use e2e::{
    decrypt, decrypt_file, decrypt_pairwise, decrypt_text, derive_shared_secret,
    derive_symmetric_key, encrypt, encrypt_file, encrypt_pairwise, encrypt_text,
    generate_room_key, import_room_key, unwrap_room_key, wrap_room_key, EncryptedFile, KeyStore,
    RoomKey,
};
