use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use tracing::{info, warn};

use ballot_db::Database;
use ballot_db::models::{Account, NewUser, UserRow};
use ballot_types::api::{
    AuthResponse, ConvertGuestRequest, GuestRequest, LoginRequest, MeResponse, RegisterRequest,
};

use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::token::create_token;
use crate::users::user_response;
use crate::validate::{MAX_EMAIL_LEN, MAX_NAME_LEN, max_len};
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Name, email and password are required"));
    }
    max_len("Name", &name, MAX_NAME_LEN)?;
    max_len("Email", &email, MAX_EMAIL_LEN)?;

    let password_hash = hash_password_blocking(req.password).await?;

    // The unique email index decides races between concurrent registrations.
    let user = with_db(&state, move |db| {
        db.create_user(&NewUser {
            name,
            email,
            account: Account::Registered { password_hash },
        })
    })
    .await?;

    info!("Registered user {} ({})", user.id, user.email);
    Ok((StatusCode::CREATED, Json(issue(&state, &user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized("Invalid credentials"))?;

    // Guests have no password and can never log in this way.
    let hash = user
        .account
        .password_hash()
        .ok_or(ApiError::Unauthorized("Invalid credentials"))?
        .to_string();

    if !verify_password_blocking(req.password, hash).await? {
        warn!("Failed login for user {}", user.id);
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    Ok(Json(issue(&state, &user)?))
}

pub async fn create_guest(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<GuestRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    max_len("Name", &name, MAX_NAME_LEN)?;

    let email = guest_email();
    let user = with_db(&state, move |db| {
        db.create_user(&NewUser {
            name,
            email,
            account: Account::Guest,
        })
    })
    .await?;

    info!("Created guest user {}", user.id);
    Ok((StatusCode::CREATED, Json(issue(&state, &user)?)))
}

pub async fn convert_guest(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<ConvertGuestRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_guest {
        return Err(ApiError::Conflict("User is already registered".into()));
    }

    let email = req.email.trim().to_string();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }
    max_len("Email", &email, MAX_EMAIL_LEN)?;

    let password_hash = hash_password_blocking(req.password).await?;
    let user_id = claims.user_id;
    let user = with_db(&state, move |db| db.convert_guest(user_id, &email, &password_hash)).await?;

    Ok(Json(issue(&state, &user)?))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id;
    let user = with_db(&state, move |db| db.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(MeResponse {
        user: user_response(&user),
    }))
}

fn issue(state: &AppState, user: &UserRow) -> Result<AuthResponse, ApiError> {
    Ok(AuthResponse {
        user: user_response(user),
        token: create_token(&state.jwt_secret, user)?,
    })
}

/// Placeholder address for a guest: unique, and never a deliverable mailbox.
fn guest_email() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("guest_{}_{}@guest.local", Utc::now().timestamp_millis(), suffix)
}
