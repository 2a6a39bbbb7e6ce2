use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::common::Checks;
use super::users::{existing_permission, PermissionInput};
use crate::api::{ApiJson, Envelope, ResultCode};
use crate::auth::Principal;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

/// POST /auth/login
pub async fn login(State(state): State<AppState>, ApiJson(input): ApiJson<LoginRequest>) -> Result<Envelope, ApiError> {
    Checks::new(&input).finish()?;

    let email = input.email.as_deref().unwrap_or_default();
    let password = input.password.as_deref().unwrap_or_default();
    let outcome = state.sessions.login(email, password).await?;

    Ok(Envelope::ok(outcome, "Login successful").with_status_code(ResultCode::LoginSuccess))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, principal: Principal) -> Result<Envelope, ApiError> {
    state.sessions.logout(&principal).await?;
    Ok(Envelope::ok(json!(null), "Logged out successfully").with_status_code(ResultCode::LogoutSuccess))
}

/// GET /user-profile
pub async fn profile(State(state): State<AppState>, principal: Principal) -> Result<Envelope, ApiError> {
    let user: User = state
        .repo::<User>()
        .find(principal.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;
    Ok(Envelope::ok(user, "User profile retrieved successfully"))
}

/// GET /my-permissions
pub async fn my_permissions(State(state): State<AppState>, principal: Principal) -> Result<Envelope, ApiError> {
    let grants = state.permissions.get_or_load(principal.id).await?;
    Ok(Envelope::ok(
        json!({
            "permissions": grants.permissions,
            "roles": grants.roles,
            "is_admin": principal.is_admin,
        }),
        "User permissions retrieved successfully",
    ))
}

/// POST /check-permission. Admins hold every permission.
pub async fn check_permission(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<PermissionInput>,
) -> Result<Envelope, ApiError> {
    let permission = existing_permission(&state, &input).await?;
    let has_permission = principal.is_admin || state.permissions.get_or_load(principal.id).await?.has_permission(&permission);
    tracing::debug!("Permission check for user {}: {} -> {}", principal.id, permission, has_permission);

    Ok(Envelope::ok(
        json!({
            "has_permission": has_permission,
            "is_admin": principal.is_admin,
            "user_id": principal.id,
        }),
        "Permission check completed",
    ))
}
