//! JWT helpers and the request principal.
//!
//! Bearer tokens are verified here and turned into a `Principal`. A missing or
//! invalid token yields an anonymous principal rather than an error: whether
//! anonymous access is acceptable is decided by the authorization gate.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use herald_common::error::AppError;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the caller's identifier
    pub sub: String,
    /// Role claim, e.g. "Admin"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Verified caller identity. Both fields are empty for anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: Option<String>,
    pub role: Option<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(subject: impl Into<String>, role: Option<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.is_authenticated() && self.role.as_deref() == Some(role)
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject: Some(claims.sub),
            role: claims.role,
        }
    }
}

/// Encode a JWT token for a subject.
///
/// Tokens are issued by an external identity provider; the server only
/// verifies them. This is for tests and local tooling, so the lifetime is an
/// argument rather than configuration.
pub fn encode_jwt(
    subject: &str,
    role: Option<&str>,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: subject.to_string(),
        role: role.map(str::to_string),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))?;

    Ok(token)
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// Resolve the principal from the `Authorization: Bearer <JWT>` header.
pub fn principal_from_headers(headers: &HeaderMap, secret: &str) -> Principal {
    let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return Principal::anonymous();
    };

    match decode_jwt(token.trim(), secret) {
        Ok(claims) if !claims.sub.trim().is_empty() => Principal::from(claims),
        Ok(_) => {
            tracing::debug!("Bearer token has an empty subject, treating caller as anonymous");
            Principal::anonymous()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected, treating caller as anonymous");
            Principal::anonymous()
        }
    }
}

/// Handlers receive the principal the gate resolved for this request.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Principal>()
            .cloned()
            .unwrap_or_default())
    }
}
