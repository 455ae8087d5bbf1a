use crate::error::{AppError, Result};
use crate::user::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: String,
    pub exp: i64,
}

/// The authenticated identity carried by a validated session credential.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Validate a session token issued by the auth service and extract the
/// identity bound to it.
pub fn validate_session(token: &str, secret: &str) -> Result<Session> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    Ok(Session {
        user_id,
        email: claims.email,
        role,
    })
}

/// Issue a session token. Only used by tests and local tooling; production
/// tokens come from the auth service.
pub fn create_session_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
    expiration_hours: i64,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(expiration_hours))
        .ok_or(AppError::InternalError)?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::InternalError)
}
