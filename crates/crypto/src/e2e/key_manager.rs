//! Schluesselverwaltung eines Clients
//!
//! Haelt das eigene Identitaets-Paar und die oeffentlichen Schluessel der
//! anderen Raummitglieder (aus `key:announced` bzw. `room:key`).

use std::collections::HashMap;
use std::sync::Arc;

use sealroom_core::types::UserId;

use crate::e2e::decrypt::decrypt_pairwise;
use crate::e2e::encrypt::encrypt_pairwise;
use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeyPair, PublicKey};
use crate::types::EncryptedPayload;

/// Eigene Identitaet + bekannte Peer-Schluessel
#[derive(Debug)]
pub struct KeyStore {
    identity: Arc<IdentityKeyPair>,
    peers: HashMap<UserId, PublicKey>,
}

impl KeyStore {
    pub fn new(identity: IdentityKeyPair) -> Self {
        Self {
            identity: Arc::new(identity),
            peers: HashMap::new(),
        }
    }

    /// Erzeugt einen KeyStore mit frischer Identitaet
    pub fn generate() -> CryptoResult<Self> {
        Ok(Self::new(IdentityKeyPair::generate()?))
    }

    /// Geteilter Zugriff fuer Arbeit ausserhalb des Event-Loops
    pub fn identity(&self) -> Arc<IdentityKeyPair> {
        Arc::clone(&self.identity)
    }

    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// Merkt sich den Schluessel eines Peers, gibt den vorherigen zurueck
    pub fn register_peer(&mut self, user_id: UserId, key: PublicKey) -> Option<PublicKey> {
        let vorher = self.peers.insert(user_id.clone(), key);
        if vorher.is_some_and(|alt| alt != key) {
            tracing::debug!(user_id = %user_id, "Peer-Schluessel ersetzt");
        }
        vorher
    }

    /// Wie [`register_peer`](Self::register_peer), Schluessel als Base64
    pub fn register_peer_base64(&mut self, user_id: UserId, encoded: &str) -> CryptoResult<PublicKey> {
        let key = PublicKey::from_base64(encoded)?;
        self.register_peer(user_id, key);
        Ok(key)
    }

    pub fn peer(&self, user_id: &UserId) -> Option<&PublicKey> {
        self.peers.get(user_id)
    }

    pub fn forget_peer(&mut self, user_id: &UserId) -> Option<PublicKey> {
        self.peers.remove(user_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Pairwise-Verschluesselung fuer einen bekannten Peer
    pub fn encrypt_for_peer(
        &self,
        user_id: &UserId,
        plaintext: &[u8],
    ) -> CryptoResult<EncryptedPayload> {
        let remote = self.peer_or_err(user_id)?;
        encrypt_pairwise(plaintext, &self.identity, remote)
    }

    /// Pairwise-Entschluesselung von einem bekannten Peer
    pub fn decrypt_from_peer(
        &self,
        user_id: &UserId,
        payload: &EncryptedPayload,
    ) -> CryptoResult<Vec<u8>> {
        let remote = self.peer_or_err(user_id)?;
        decrypt_pairwise(payload, &self.identity, remote)
    }

    fn peer_or_err(&self, user_id: &UserId) -> CryptoResult<&PublicKey> {
        self.peers
            .get(user_id)
            .ok_or_else(|| CryptoError::UnknownPeer(user_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_registrieren_und_ersetzen() {
        let mut store = KeyStore::generate().unwrap();
        let a = IdentityKeyPair::generate().unwrap().public_key();
        let b = IdentityKeyPair::generate().unwrap().public_key();

        assert!(store.register_peer(UserId::from("u2"), a).is_none());
        assert_eq!(store.register_peer(UserId::from("u2"), b), Some(a));
        assert_eq!(store.peer(&UserId::from("u2")), Some(&b));
        assert_eq!(store.peer_count(), 1);
    }

    #[test]
    fn unbekannter_peer() {
        let store = KeyStore::generate().unwrap();
        assert!(matches!(
            store.encrypt_for_peer(&UserId::from("niemand"), b"x"),
            Err(CryptoError::UnknownPeer(_))
        ));
    }

    #[test]
    fn ungueltiger_base64_schluessel() {
        let mut store = KeyStore::generate().unwrap();
        assert!(store
            .register_peer_base64(UserId::from("u2"), "@@@")
            .is_err());
        assert!(store.peer(&UserId::from("u2")).is_none());
    }

    #[test]
    fn zwei_stores_tauschen_nachricht() {
        let mut alice = KeyStore::generate().unwrap();
        let mut bob = KeyStore::generate().unwrap();
        alice.register_peer(UserId::from("bob"), bob.public_key());
        bob.register_peer(UserId::from("alice"), alice.public_key());

        let payload = alice.encrypt_for_peer(&UserId::from("bob"), b"hallo").unwrap();
        let klartext = bob.decrypt_from_peer(&UserId::from("alice"), &payload).unwrap();
        assert_eq!(klartext, b"hallo");

        assert!(bob.forget_peer(&UserId::from("alice")).is_some());
        assert!(bob.decrypt_from_peer(&UserId::from("alice"), &payload).is_err());
    }
}
