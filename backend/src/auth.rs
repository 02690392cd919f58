//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs signed with `ACCESS_TOKEN_SECRET`; the claims carry
//! the user id and role. Handlers take [`AuthUser`] as an extractor and call
//! [`AuthUser::require_admin`] for admin-only operations.

use crate::error::{AppError, AppResult};
use crate::models::Role;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Token lifetime for issued tokens
const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for `user_id`. Login lives outside this service; this is
    /// used by local tooling and tests.
    pub fn issue_token(&self, user_id: Uuid, role: Role) -> AppResult<String> {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: exp as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Message(format!("Failed to issue token: {}", e)))
    }

    /// Validate a token and resolve it to a user identity
    pub fn validate(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            debug!("Rejected token: {}", e);
            AppError::Unauthorized("Invalid Authentication.".to_string())
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid Authentication.".to_string()))?;

        Ok(AuthUser {
            id,
            role: data.claims.role,
        })
    }
}

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin resources access denied.".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<JwtValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authentication.".to_string()))?;

        let validator = Arc::<JwtValidator>::from_ref(state);
        validator.validate(token)
    }
}
