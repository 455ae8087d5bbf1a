use crate::{auth::validate_session, error::AppError, state::AppState, user::Role};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// The identity bound to a request after session validation.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let session = validate_session(token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(AuthContext {
        user_id: session.user_id,
        role: session.role,
    });

    Ok(next.run(req).await)
}

/// Extractor for the authenticated identity placed by `auth_middleware`.
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))
    }
}

/// Guard for operator-only actions (alert resolution, schedule decisions,
/// on-demand scans).
pub fn require_operator(ctx: &AuthContext) -> Result<(), AppError> {
    if ctx.role.is_operator() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Operator access required".to_string()))
    }
}

/// Guard for admin-only actions (alert configuration changes).
pub fn require_admin(ctx: &AuthContext) -> Result<(), AppError> {
    if ctx.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}
