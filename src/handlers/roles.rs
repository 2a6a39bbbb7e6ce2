use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::Checks;
use crate::api::{ApiJson, Envelope};
use crate::authz::Assignments;
use crate::database::models::{Permission, Role, RolePermission, UserRole};
use crate::database::{into_row, Query as StoreQuery, Repository, Row, StoreError};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    /// Permission ids.
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRole {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SyncPermissions {
    #[validate(required)]
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

async fn with_permissions(assignments: &Assignments, role: Role) -> Result<RoleWithPermissions, StoreError> {
    let permissions = assignments.permissions_of_role(role.id).await?;
    Ok(RoleWithPermissions { role, permissions })
}

async fn role_or_404(state: &AppState, id: i64) -> Result<Role, ApiError> {
    state
        .repo::<Role>()
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role not found"))
}

/// Every id must name a stored permission; unknown ones become
/// `permissions.<index>` field errors.
async fn check_permission_ids(
    permissions: &Repository<Permission>,
    ids: Option<&[i64]>,
    checks: &mut Checks,
) -> Result<(), StoreError> {
    for (index, id) in ids.unwrap_or_default().iter().enumerate() {
        if permissions.find(*id).await?.is_none() {
            let field = format!("permissions.{}", index);
            checks.add(&field, format!("The selected {} is invalid.", field));
        }
    }
    Ok(())
}

/// GET /roles
pub async fn index(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let assignments = Assignments::new(state.store.clone());
    let roles = state.repo::<Role>().select_any(StoreQuery::all().order("id asc")).await?;
    let mut out = Vec::with_capacity(roles.len());
    for role in roles {
        out.push(with_permissions(&assignments, role).await?);
    }
    Ok(Envelope::ok(json!({ "roles": out }), "Roles retrieved successfully"))
}

/// POST /roles
pub async fn store(State(state): State<AppState>, ApiJson(input): ApiJson<CreateRole>) -> Result<Envelope, ApiError> {
    let roles = state.repo::<Role>();
    let mut checks = Checks::new(&input);
    checks.unique(&roles, "name", input.name.as_deref(), None).await?;
    check_permission_ids(&state.repo::<Permission>(), input.permissions.as_deref(), &mut checks).await?;
    checks.finish()?;

    let now = Utc::now();
    let role = roles
        .create(into_row(json!({ "name": input.name, "created_at": now, "updated_at": now })))
        .await?;

    let assignments = Assignments::new(state.store.clone());
    if let Some(ids) = &input.permissions {
        assignments.sync_role_permissions(role.id, ids).await?;
    }

    let view = with_permissions(&assignments, role).await?;
    Ok(Envelope::created(view, "Role created successfully"))
}

/// GET /roles/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let role = role_or_404(&state, id).await?;
    let view = with_permissions(&Assignments::new(state.store.clone()), role).await?;
    Ok(Envelope::ok(view, "Role retrieved successfully"))
}

/// PUT /roles/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateRole>,
) -> Result<Envelope, ApiError> {
    let roles = state.repo::<Role>();
    let current = role_or_404(&state, id).await?;
    if current.name == Role::SUPER_ADMIN && input.name.as_deref().is_some_and(|name| name != Role::SUPER_ADMIN) {
        return Err(ApiError::bad_request("Cannot rename the Super Admin role"));
    }

    let mut checks = Checks::new(&input);
    checks.unique(&roles, "name", input.name.as_deref(), Some(id)).await?;
    check_permission_ids(&state.repo::<Permission>(), input.permissions.as_deref(), &mut checks).await?;
    checks.finish()?;

    let mut changes = Row::new();
    if let Some(name) = &input.name {
        changes.insert("name".into(), json!(name));
    }
    changes.insert("updated_at".into(), json!(Utc::now()));
    let role = roles.update(id, changes).await?;

    let assignments = Assignments::new(state.store.clone());
    if let Some(ids) = &input.permissions {
        assignments.sync_role_permissions(role.id, ids).await?;
    }
    state.permissions.invalidate_all().await;

    let view = with_permissions(&assignments, role).await?;
    Ok(Envelope::ok(view, "Role updated successfully"))
}

/// DELETE /roles/:id
pub async fn destroy(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let role = role_or_404(&state, id).await?;
    if role.name == Role::SUPER_ADMIN {
        return Err(ApiError::bad_request("Cannot delete the Super Admin role"));
    }

    Repository::<RolePermission>::new(state.store.clone())
        .delete_where(json!({ "role_id": role.id }))
        .await?;
    Repository::<UserRole>::new(state.store.clone())
        .delete_where(json!({ "role_id": role.id }))
        .await?;
    state.repo::<Role>().delete_where(json!({ "id": role.id })).await?;
    state.permissions.invalidate_all().await;

    Ok(Envelope::ok(Value::Null, "Role deleted successfully"))
}

/// GET /roles/permissions
pub async fn all_permissions(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let permissions = state
        .repo::<Permission>()
        .select_any(StoreQuery::all().order("id asc"))
        .await?;
    Ok(Envelope::ok(json!({ "permissions": permissions }), "Permissions retrieved successfully"))
}

/// PUT /roles/:id/permissions
pub async fn sync_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<SyncPermissions>,
) -> Result<Envelope, ApiError> {
    let role = role_or_404(&state, id).await?;

    let mut checks = Checks::new(&input);
    check_permission_ids(&state.repo::<Permission>(), input.permissions.as_deref(), &mut checks).await?;
    checks.finish()?;

    let assignments = Assignments::new(state.store.clone());
    assignments
        .sync_role_permissions(role.id, input.permissions.as_deref().unwrap_or_default())
        .await?;
    state.permissions.invalidate_all().await;

    let view = with_permissions(&assignments, role).await?;
    Ok(Envelope::ok(view, "Permissions assigned successfully"))
}
