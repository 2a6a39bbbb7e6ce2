use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::common::Checks;
use crate::api::{ApiJson, Envelope};
use crate::authz::Assignments;
use crate::database::models::{Permission, RolePermission, UserPermission};
use crate::database::{into_row, Query as StoreQuery, Repository};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionBody {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
}

async fn permission_or_404(state: &AppState, id: i64) -> Result<Permission, ApiError> {
    state
        .repo::<Permission>()
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Permission not found"))
}

/// GET /permissions
pub async fn index(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let permissions = state
        .repo::<Permission>()
        .select_any(StoreQuery::all().order("id asc"))
        .await?;
    Ok(Envelope::ok(json!({ "permissions": permissions }), "Permissions retrieved successfully"))
}

/// POST /permissions
pub async fn store(State(state): State<AppState>, ApiJson(input): ApiJson<PermissionBody>) -> Result<Envelope, ApiError> {
    let permissions = state.repo::<Permission>();
    let mut checks = Checks::new(&input);
    checks.unique(&permissions, "name", input.name.as_deref(), None).await?;
    checks.finish()?;

    let now = Utc::now();
    let permission = permissions
        .create(into_row(json!({ "name": input.name, "created_at": now, "updated_at": now })))
        .await?;
    Ok(Envelope::created(permission, "Permission created successfully"))
}

/// GET /permissions/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let permission = permission_or_404(&state, id).await?;
    Ok(Envelope::ok(permission, "Permission retrieved successfully"))
}

/// PUT /permissions/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<PermissionBody>,
) -> Result<Envelope, ApiError> {
    let permissions = state.repo::<Permission>();
    permission_or_404(&state, id).await?;

    let mut checks = Checks::new(&input);
    checks.unique(&permissions, "name", input.name.as_deref(), Some(id)).await?;
    checks.finish()?;

    let permission = permissions
        .update(id, into_row(json!({ "name": input.name, "updated_at": Utc::now() })))
        .await?;
    state.permissions.invalidate_all().await;
    Ok(Envelope::ok(permission, "Permission updated successfully"))
}

/// DELETE /permissions/:id
pub async fn destroy(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let permission = permission_or_404(&state, id).await?;

    let roles_count = Repository::<RolePermission>::new(state.store.clone())
        .count(json!({ "permission_id": permission.id }))
        .await?;
    if roles_count > 0 {
        return Err(ApiError::conflict(
            "This permission is assigned to one or more roles and cannot be deleted",
            json!({ "roles_count": roles_count }),
        ));
    }

    Repository::<UserPermission>::new(state.store.clone())
        .delete_where(json!({ "permission_id": permission.id }))
        .await?;
    state.repo::<Permission>().delete_where(json!({ "id": permission.id })).await?;
    state.permissions.invalidate_all().await;

    Ok(Envelope::ok(Value::Null, "Permission deleted successfully"))
}

/// GET /permissions/:id/roles
pub async fn roles(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let permission = permission_or_404(&state, id).await?;
    let roles = Assignments::new(state.store.clone())
        .roles_with_permission(permission.id)
        .await?;
    Ok(Envelope::ok(json!({ "roles": roles }), "Roles with this permission retrieved successfully"))
}
