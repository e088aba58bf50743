//! Signed credential verification.
//!
//! Credentials are HS256 JWTs carrying `sub`, `email`, `role` and `exp`.
//! Verification failures are collapsed into `None` so callers can only ever
//! tell "authenticated" from "not authenticated".

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Identity, Role};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    role: Role,
    exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no signing secret configured")]
    MissingSecret,
    #[error("failed to sign credential: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Verifies (and, for the sign-in flow, issues) credentials for one secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").field("secret", &self.secret.as_ref().map(|_| "[REDACTED]")).finish()
    }
}

impl TokenVerifier {
    /// A blank secret counts as no secret at all.
    pub fn new(secret: Option<String>) -> Self {
        Self { secret: secret.filter(|s| !s.trim().is_empty()) }
    }

    pub fn has_secret(&self) -> bool { self.secret.is_some() }

    pub fn verify(&self, token: &str) -> Option<Identity> {
        let secret = self.secret.as_deref()?;
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
            Ok(data) => Some(Identity { subject_id: data.claims.sub, email: data.claims.email, role: data.claims.role }),
            Err(error) => {
                tracing::debug!(%error, "credential rejected");
                None
            }
        }
    }

    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        let secret = self.secret.as_deref().ok_or(TokenError::MissingSecret)?;
        let claims = Claims {
            sub: identity.subject_id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
    }
}
