use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use ballot_db::models::UserRow;
use ballot_types::api::Claims;

/// How long an issued bearer token stays valid.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Issue a token reflecting the user's current email and guest state.
pub fn create_token(secret: &str, user: &UserRow) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        user_id: user.id,
        email: user.email.clone(),
        is_guest: user.is_guest(),
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature and expiry, returning the claims.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
