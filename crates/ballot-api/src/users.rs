use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use ballot_db::models::{Account, NewUser, UserChanges, UserRow};
use ballot_types::api::{
    CreateUserRequest, UpdateUserRequest, UserEnvelope, UserResponse, UsersEnvelope,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::password::hash_password_blocking;
use crate::validate::{MAX_EMAIL_LEN, MAX_NAME_LEN, max_len};
use crate::with_db;

pub(crate) fn user_response(row: &UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        name: row.name.clone(),
        email: row.email.clone(),
        is_guest: row.is_guest(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn envelope(user: &UserRow) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        success: true,
        user: user_response(user),
    })
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, |db| db.list_users()).await?;
    Ok(Json(UsersEnvelope {
        success: true,
        users: users.iter().map(user_response).collect(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| db.get_user(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(envelope(&user))
}

pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Name, email and password are required"));
    }
    max_len("Name", &name, MAX_NAME_LEN)?;
    max_len("Email", &email, MAX_EMAIL_LEN)?;

    let password_hash = hash_password_blocking(req.password).await?;
    let user = with_db(&state, move |db| {
        db.create_user(&NewUser {
            name,
            email,
            account: Account::Registered { password_hash },
        })
    })
    .await?;

    Ok((StatusCode::CREATED, envelope(&user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    // Blank fields are left untouched.
    let name = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let email = req.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    if let Some(name) = &name {
        max_len("Name", name, MAX_NAME_LEN)?;
    }
    if let Some(email) = &email {
        max_len("Email", email, MAX_EMAIL_LEN)?;
    }

    let user = with_db(&state, move |db| db.update_user(id, &UserChanges { name, email })).await?;
    Ok(envelope(&user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<StatusCode, ApiError> {
    with_db(&state, move |db| db.delete_user(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
