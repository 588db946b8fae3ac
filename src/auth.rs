//! Bearer credential verification.
//!
//! Tokens are HS256 JWTs issued by the identity provider. The `sub` claim
//! is the caller's [`UserId`]; `exp` is enforced. Handlers take an
//! [`AuthUser`] argument to require authentication.

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::MarketError;

/// Claims read from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's identity.
    pub sub: uuid::Uuid,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Issued-at time (Unix seconds).
    #[serde(default)]
    pub iat: i64,
    /// Provider role, e.g. `"authenticated"`.
    #[serde(default)]
    pub role: Option<String>,
}

/// Verifies (and, for tests and tooling, issues) HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Creates a verifier for the shared `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The provider sets `aud`; identity is all this service needs.
        validation.validate_aud = false;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifies `token` and returns the caller's id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unauthenticated`] for bad signatures,
    /// malformed tokens or expired tokens.
    pub fn verify(&self, token: &str) -> Result<UserId, MarketError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| MarketError::Unauthenticated(format!("invalid token: {e}")))?;
        Ok(UserId::from_uuid(data.claims.sub))
    }

    /// Issues a token for `user` valid for `ttl_secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if signing fails.
    pub fn issue(&self, user: UserId, ttl_secs: i64) -> Result<String, MarketError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: *user.as_uuid(),
            exp: now.saturating_add(ttl_secs),
            iat: now,
            role: Some("authenticated".to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| MarketError::Internal(format!("failed to sign token: {e}")))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = extract_bearer(header)
            .ok_or_else(|| MarketError::Unauthenticated("missing bearer token".to_string()))?;
        let user = state.jwt.verify(token)?;
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

    #[test]
    fn issued_token_verifies() {
        let jwt = JwtVerifier::new(SECRET);
        let user = UserId::new();
        let Ok(token) = jwt.issue(user, 3600) else {
            panic!("signing failed");
        };
        assert_eq!(jwt.verify(&token).ok(), Some(user));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = JwtVerifier::new(SECRET);
        let verifier = JwtVerifier::new("another-secret-that-is-also-32-bytes-long");
        let Ok(token) = issuer.issue(UserId::new(), 3600) else {
            panic!("signing failed");
        };
        assert!(matches!(verifier.verify(&token), Err(MarketError::Unauthenticated(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtVerifier::new(SECRET);
        let Ok(token) = jwt.issue(UserId::new(), -3600) else {
            panic!("signing failed");
        };
        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
