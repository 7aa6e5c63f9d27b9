//! Schluesselableitung aus einem ECDH-Geheimnis
//!
//! PBKDF2-HMAC-SHA256, 100.000 Iterationen, 16 Byte Salt, 32 Byte Ausgabe.
//! Ohne vorgegebenen Salt wird ein frischer erzeugt; der Empfaenger
//! braucht denselben Salt, um denselben Schluessel abzuleiten.

use std::num::NonZeroU32;

use ring::pbkdf2;

use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeyPair, PublicKey, SharedSecret};
use crate::types::{Salt, SecretBytes, SymmetricKey, KEY_LEN, PBKDF2_ITERATIONS};

/// X25519-Austausch zwischen eigenem Schluessel-Paar und fremdem Public Key
pub fn derive_shared_secret(
    local: &IdentityKeyPair,
    remote: &PublicKey,
) -> CryptoResult<SharedSecret> {
    local.derive_shared_secret(remote)
}

/// Leitet einen AES-256-Schluessel aus einem Shared Secret ab
///
/// Gibt Schluessel und verwendeten Salt zurueck.
pub fn derive_symmetric_key(
    shared: &SharedSecret,
    salt: Option<&Salt>,
) -> CryptoResult<(SymmetricKey, Salt)> {
    let salt = match salt {
        Some(s) => *s,
        None => Salt::random()?,
    };
    let iterationen = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| CryptoError::KeyDerivationFailed("Iterationen = 0".to_string()))?;

    let mut out = vec![0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterationen,
        salt.as_bytes(),
        shared.as_bytes(),
        &mut out,
    );

    let key = SymmetricKey::from_secret(SecretBytes::new(out))
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok((key, salt))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gleicher_salt_gleicher_schluessel() {
        let alice = IdentityKeyPair::generate().unwrap();
        let bob = IdentityKeyPair::generate().unwrap();

        let s_alice = derive_shared_secret(&alice, &bob.public_key()).unwrap();
        let s_bob = derive_shared_secret(&bob, &alice.public_key()).unwrap();

        let (k1, salt) = derive_symmetric_key(&s_alice, None).unwrap();
        let (k2, salt2) = derive_symmetric_key(&s_bob, Some(&salt)).unwrap();
        assert_eq!(salt, salt2);
        assert_eq!(k1, k2);
    }

    #[test]
    fn frischer_salt_ergibt_anderen_schluessel() {
        let alice = IdentityKeyPair::generate().unwrap();
        let bob = IdentityKeyPair::generate().unwrap();
        let shared = derive_shared_secret(&alice, &bob.public_key()).unwrap();

        let (k1, salt1) = derive_symmetric_key(&shared, None).unwrap();
        let (k2, salt2) = derive_symmetric_key(&shared, None).unwrap();
        assert_ne!(salt1, salt2);
        assert_ne!(k1, k2);
    }
}
