//! Token-Pruefung fuer Sealroom
//!
//! Jeder Verbindungsaufbau muss ein HS256-signiertes Token mitbringen.
//! Die Claims liefern die Identitaet der Session; ohne gueltiges Token
//! entsteht keine Session.

use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sealroom_core::types::UserId;

use crate::error::{AuthError, AuthResult};

/// Maximale Lebensdauer eines Tokens: 7 Tage
pub const TOKEN_GUELTIGKEIT_TAGE: i64 = 7;

/// Erlaubte Uhrabweichung in Sekunden
const LEEWAY_SEKUNDEN: u64 = 30;

/// Token-Claims im Draht-Format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
}

/// Identitaet einer authentifizierten Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,
}

/// Prueft Tokens gegen ein gemeinsames Geheimnis
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    /// Erstellt einen Verifier; ein leeres Geheimnis ist ein Konfigurationsfehler
    pub fn neu(secret: &str) -> AuthResult<Self> {
        if secret.trim().is_empty() {
            return Err(AuthError::Konfiguration(
                "JWT-Geheimnis darf nicht leer sein".to_string(),
            ));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = LEEWAY_SEKUNDEN;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Prueft Signatur, Ablauf und Claims
    pub fn verifizieren(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let daten = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenAbgelaufen,
                _ => AuthError::TokenUngueltig(e.to_string()),
            }
        })?;
        let claims = daten.claims;

        if claims.user_id.trim().is_empty() {
            return Err(AuthError::TokenUngueltig("userId fehlt".to_string()));
        }

        if let Some(iat) = claims.iat {
            let max_dauer = TOKEN_GUELTIGKEIT_TAGE * 24 * 60 * 60 + LEEWAY_SEKUNDEN as i64;
            if claims.exp - iat > max_dauer {
                return Err(AuthError::TokenUngueltig(
                    "Gueltigkeitsdauer ueberschreitet 7 Tage".to_string(),
                ));
            }
            if iat > Utc::now().timestamp() + LEEWAY_SEKUNDEN as i64 {
                return Err(AuthError::TokenUngueltig(
                    "Token in der Zukunft ausgestellt".to_string(),
                ));
            }
        }

        tracing::debug!(user_id = %claims.user_id, "Token verifiziert");
        Ok(AuthenticatedUser {
            user_id: UserId::new(claims.user_id),
            username: claims.username,
        })
    }
}

/// Extrahiert das Token aus einem `Authorization`-Header-Wert
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token-Erzeugung fuer Tests
#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::Claims;

    /// Signiert ein Token mit der angegebenen Restlaufzeit
    pub fn token_signieren(secret: &str, user_id: &str, username: &str, gueltig: Duration) -> String {
        let jetzt = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            iat: Some(jetzt.timestamp()),
            exp: (jetzt + gueltig).timestamp(),
        };
        claims_signieren(secret, &claims)
    }

    /// Signiert beliebige Claims
    pub fn claims_signieren(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("HS256-Signierung schlaegt nicht fehl")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::testing::{claims_signieren, token_signieren};
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "test-geheimnis";

    #[test]
    fn gueltiges_token_liefert_identitaet() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        let token = token_signieren(SECRET, "u1", "alice", Duration::hours(1));
        let user = verifier.verifizieren(&token).unwrap();
        assert_eq!(user.user_id, UserId::from("u1"));
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn abgelaufenes_token_wird_abgelehnt() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        let jetzt = Utc::now().timestamp();
        let token = claims_signieren(
            SECRET,
            &Claims {
                user_id: "u1".to_string(),
                username: "alice".to_string(),
                iat: Some(jetzt - 7200),
                exp: jetzt - 3600,
            },
        );
        assert!(matches!(
            verifier.verifizieren(&token),
            Err(AuthError::TokenAbgelaufen)
        ));
    }

    #[test]
    fn falsches_geheimnis_wird_abgelehnt() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        let token = token_signieren("anderes-geheimnis", "u1", "alice", Duration::hours(1));
        assert!(matches!(
            verifier.verifizieren(&token),
            Err(AuthError::TokenUngueltig(_))
        ));
    }

    #[test]
    fn muell_wird_abgelehnt() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        assert!(verifier.verifizieren("kein.jwt.token").is_err());
        assert!(verifier.verifizieren("").is_err());
    }

    #[test]
    fn zu_lange_gueltigkeit_wird_abgelehnt() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        let token = token_signieren(SECRET, "u1", "alice", Duration::days(30));
        assert!(matches!(
            verifier.verifizieren(&token),
            Err(AuthError::TokenUngueltig(_))
        ));
    }

    #[test]
    fn leere_user_id_wird_abgelehnt() {
        let verifier = TokenVerifier::neu(SECRET).unwrap();
        let token = token_signieren(SECRET, "  ", "alice", Duration::hours(1));
        assert!(verifier.verifizieren(&token).is_err());
    }

    #[test]
    fn leeres_geheimnis_ist_konfigurationsfehler() {
        assert!(matches!(
            TokenVerifier::neu(""),
            Err(AuthError::Konfiguration(_))
        ));
    }

    #[test]
    fn bearer_header_parsen() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
