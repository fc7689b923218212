use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, warn};

use ballot_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::token::decode_token;

/// A caller holding a valid bearer token. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// The caller's identity when one was presented. A missing, malformed or
/// expired token yields an anonymous viewer instead of an error.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|c| c.user_id)
    }
}

/// A caller with a registered (non-guest) account. Guests get 403.
#[derive(Debug, Clone)]
pub struct Registered(pub Claims);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized("No token provided"))?;

        let claims = decode_token(&state.jwt_secret, token).map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            ApiError::Unauthorized("Invalid token")
        })?;

        Ok(AuthUser(claims))
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Viewer(None));
        };

        match decode_token(&state.jwt_secret, token) {
            Ok(claims) => Ok(Viewer(Some(claims))),
            Err(e) => {
                debug!("Ignoring unusable bearer token on public route: {}", e);
                Ok(Viewer(None))
            }
        }
    }
}

impl FromRequestParts<AppState> for Registered {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.is_guest {
            return Err(ApiError::Forbidden(
                "Guest users cannot perform this action".into(),
            ));
        }
        Ok(Registered(claims))
    }
}
