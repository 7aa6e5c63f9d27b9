//! E2E Verschluesselung (End-to-End)
//!
//! Client <-> Client Verschluesselung. Das Gateway reicht Envelopes blind
//! weiter und kann den Inhalt nicht entschluesseln.
//!
//! ## Ablauf
//! 1. Jeder Client erzeugt ein X25519-Identitaets-Paar
//! 2. Beim Raumbeitritt: eigener Raumschluessel + `key:announce`
//! 3. Mitglieder verpacken ihren Raumschluessel paarweise fuer Neue
//! 4. Alle uebernehmen den aeltesten Schluessel
//! 5. Nachrichten und Dateien: AES-256-GCM mit dem Raumschluessel

pub mod decrypt;
pub mod encrypt;
pub mod key_exchange;
pub mod key_manager;
pub mod room_key;

pub use decrypt::{decrypt, decrypt_file, decrypt_pairwise, decrypt_text};
pub use encrypt::{encrypt, encrypt_file, encrypt_pairwise, encrypt_text, EncryptedFile};
pub use key_exchange::{derive_shared_secret, derive_symmetric_key};
pub use key_manager::KeyStore;
pub use room_key::{generate_room_key, import_room_key, unwrap_room_key, wrap_room_key, RoomKey};
