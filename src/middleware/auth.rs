//! Session and admin authentication.
//!
//! Customers authenticate with `Authorization: Bearer <session token>`; the
//! token is looked up by its SHA-256 digest. Admin routes compare the bearer
//! value against `ADMIN_API_KEY`.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::User;
use crate::error::AppError;
use crate::signature::token_digest;
use crate::AppState;

/// Authenticated customer; rejects with 401 when no valid session is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Optional customer session. A supplied but unknown token is still a 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(token) = bearer_token(parts) else {
        return Ok(None);
    };

    let user = state
        .engine
        .repository()
        .find_user_by_token_hash(&token_digest(token))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match user {
        Some(user) => Ok(Some(user)),
        None => Err(AppError::Unauthorized("invalid or expired session".to_string())),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .await?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session(parts, state).await?))
    }
}

/// Constant-time comparison of the presented key against the configured one.
fn admin_key_matches(presented: &str, expected: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(b"admin-key-compare") else {
        return false;
    };
    mac.update(expected.as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(b"admin-key-compare") else {
        return false;
    };
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

pub async fn admin_auth(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return Err(AppError::Unauthorized("admin api is disabled".to_string()));
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim());

    match presented {
        Some(key) if admin_key_matches(key, expected) => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized("invalid admin key".to_string())),
    }
}
