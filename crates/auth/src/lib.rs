//! sealroom-auth – Token-Pruefung beim Verbindungsaufbau
//!
//! Dieses Crate implementiert:
//! - Pruefung signierter HS256-Tokens (userId, username, iat, exp)
//! - Extraktion des Tokens aus `Authorization: Bearer ...`
//!
//! Registrierung und Login sind nicht Teil dieses Crates; Tokens werden
//! von einem externen Dienst ausgestellt.

pub mod error;
pub mod token;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use token::{bearer_token, AuthenticatedUser, Claims, TokenVerifier, TOKEN_GUELTIGKEIT_TAGE};

#[cfg(any(test, feature = "test-util"))]
pub use token::testing;
