//! Bearer token verification and the authenticated caller extractor.
//!
//! Tokens are HS256 JWTs signed by the hosted platform with the project's
//! signing secret. Verification checks the signature, `exp` and `aud`, then
//! exposes the `sub` claim as the caller identity. Row scoping itself is left
//! to the platform; this crate only establishes who is calling.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelf_http::error::AppError;

/// Reasons a bearer token is refused. All of them surface as 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must be Bearer <token>")]
    InvalidScheme,

    #[error("token has expired")]
    Expired,

    #[error("token has no subject")]
    MissingSubject,

    #[error("invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Signing(e) => AppError::Internal(anyhow::Error::new(e)),
            other => AppError::unauthorized(other.to_string()),
        }
    }
}

/// Claims carried by platform access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A verified caller: identity plus the raw token it presented.
///
/// The token is kept so downstream platform calls run under the caller's
/// own credentials.
#[derive(Clone)]
pub struct Caller {
    user_id: String,
    token: String,
}

impl Caller {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Verifies bearer tokens against the configured signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a raw token (without the `Bearer ` prefix).
    pub fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e),
            }
        })?;

        // The identity is forwarded as issued; blank only counts as absent
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(Caller {
            user_id: data.claims.sub,
            token: token.to_string(),
        })
    }

    /// Verify the value of an `Authorization` header.
    pub fn verify_header(&self, header_value: Option<&str>) -> Result<Caller, AuthError> {
        let value = header_value.ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(value).ok_or(AuthError::InvalidScheme)?;
        self.verify(token)
    }
}

/// Extract the token from `Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Sign a token the way the platform does. Used for local development and tests.
pub fn issue_token(
    secret: &str,
    audience: &str,
    subject: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let claims = Claims {
        sub: subject.to_string(),
        exp: now + ttl.as_secs(),
        iat: Some(now),
        aud: Some(audience.to_string()),
        role: Some("authenticated".to_string()),
        email: None,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Signing)
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let caller = verifier.verify_header(header_value).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            AppError::from(e)
        })?;

        tracing::debug!(user_id = caller.user_id(), "caller authenticated");
        Ok(caller)
    }
}
