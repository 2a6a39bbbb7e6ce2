use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::common::{all_of, stamp_created, Checks, ListParams};
use crate::api::{ApiJson, Envelope, ResultCode};
use crate::auth::{hash_password, Principal};
use crate::authz::Assignments;
use crate::database::models::{Permission, Role, User};
use crate::database::{into_row, Query as StoreQuery, Repository, Row, StoreError};
use crate::error::ApiError;
use crate::filter::Scope;
use crate::state::AppState;

const SORTABLE: &[&str] = &["id", "username", "email", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(required, length(min = 1, max = 255))]
    pub username: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    /// Role names to assign.
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 3, max = 255))]
    pub username: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleInput {
    #[validate(required, length(min = 1))]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RolesInput {
    #[validate(required)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionInput {
    #[validate(required, length(min = 1))]
    pub permission: Option<String>,
}

/// A user with the roles it holds.
#[derive(Debug, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found").with_code(ResultCode::GetUserNotFound)
}

async fn active_user(state: &AppState, id: i64) -> Result<User, ApiError> {
    state.repo::<User>().find(id).await?.ok_or_else(user_not_found)
}

async fn with_roles(state: &AppState, user: User) -> Result<UserWithRoles, StoreError> {
    let roles = Assignments::new(state.store.clone()).roles_of_user(user.id).await?;
    Ok(UserWithRoles { user, roles })
}

/// Resolves role names to ids, recording a field error for each unknown name.
async fn resolve_roles(
    roles: &Repository<Role>,
    names: &[String],
    field: &str,
    checks: &mut Checks,
) -> Result<Vec<i64>, StoreError> {
    let mut ids = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        match roles.find_by("name", name.as_str()).await? {
            Some(role) => ids.push(role.id),
            None if names.len() == 1 && field == "role" => checks.add(field, "The selected role is invalid."),
            None => checks.add(&format!("{}.{}", field, index), format!("The selected {}.{} is invalid.", field, index)),
        }
    }
    Ok(ids)
}

/// GET /users
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let clauses: Vec<Value> = params.search_clause(&["username", "email"]).into_iter().collect();
    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "id", "asc"));
    let page = state
        .repo::<User>()
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;
    Ok(Envelope::ok(json!({ "users": page.items }), "Users retrieved successfully").with_pagination(&page))
}

/// POST /users
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateUser>,
) -> Result<Envelope, ApiError> {
    let users = state.repo::<User>();
    let mut checks = Checks::new(&input);
    checks.unique(&users, "email", input.email.as_deref(), None).await?;
    let role_ids = match &input.roles {
        Some(names) => resolve_roles(&state.repo::<Role>(), names, "roles", &mut checks).await?,
        None => Vec::new(),
    };
    checks.finish()?;

    let password = hash_password(input.password.as_deref().unwrap_or_default())?;
    let mut row = into_row(json!({
        "uuid": Uuid::new_v4(),
        "username": input.username,
        "email": input.email,
        "phone": input.phone,
        "password": password,
        "is_admin": false,
    }));
    stamp_created(&mut row, principal.id);
    let user = users.create(row).await?;

    if !role_ids.is_empty() {
        Assignments::new(state.store.clone()).sync_user_roles(user.id, &role_ids).await?;
    }

    let view = with_roles(&state, user).await?;
    Ok(Envelope::created(view, "User created successfully").with_status_code(ResultCode::CreatedUserSuccessfully))
}

/// GET /users/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let view = with_roles(&state, user).await?;
    Ok(Envelope::ok(view, "User retrieved successfully"))
}

/// PUT /users/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateUser>,
) -> Result<Envelope, ApiError> {
    let users = state.repo::<User>();
    let user = active_user(&state, id).await?;

    let mut checks = Checks::new(&input);
    let new_email = input.email.as_deref().filter(|email| *email != user.email);
    checks.unique(&users, "email", new_email, Some(id)).await?;
    checks.finish()?;

    let mut changes = Row::new();
    if let Some(username) = &input.username {
        changes.insert("username".into(), json!(username));
    }
    if let Some(email) = new_email {
        changes.insert("email".into(), json!(email));
    }
    if let Some(phone) = &input.phone {
        changes.insert("phone".into(), json!(phone));
    }
    if let Some(password) = input.password.as_deref() {
        changes.insert("password".into(), json!(hash_password(password)?));
    }
    changes.insert("updated_at".into(), json!(Utc::now()));
    changes.insert("updated_by".into(), json!(principal.id));

    let user = users.update(id, changes).await?;
    Ok(Envelope::ok(user, "User updated successfully").with_status_code(ResultCode::UpdateUserSuccessfully))
}

/// DELETE /users/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    state.repo::<User>().soft_delete(user.id, Some(principal.id)).await?;
    state.sessions.revoke_all(user.id).await?;
    state.permissions.invalidate(user.id).await;
    Ok(Envelope::ok(Value::Null, "User deleted successfully").with_status_code(ResultCode::DeleteUserSuccessfully))
}

/// POST /users/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let users = state.repo::<User>();
    let user = users.find_any_scope(id).await?.ok_or_else(user_not_found)?;
    if !user.is_deleted() {
        return Err(ApiError::bad_request("User is not deleted"));
    }
    let user = users.restore(user.id, Some(principal.id)).await?;
    Ok(Envelope::ok(user, "User restored successfully"))
}

/// GET /users/trashed
pub async fn trashed(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let users = state
        .repo::<User>()
        .select_any(StoreQuery::all().scope(Scope::OnlyDeleted).order("deleted_at desc"))
        .await?;
    Ok(Envelope::ok(json!({ "users": users }), "Trashed users retrieved successfully"))
}

/// GET /users/:id/roles
pub async fn roles(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let roles = Assignments::new(state.store.clone()).roles_of_user(user.id).await?;
    Ok(Envelope::ok(json!({ "roles": roles }), "User roles retrieved successfully"))
}

/// POST /users/:id/roles
pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<RoleInput>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let mut checks = Checks::new(&input);
    let names: Vec<String> = input.role.into_iter().collect();
    let role_ids = resolve_roles(&state.repo::<Role>(), &names, "role", &mut checks).await?;
    checks.finish()?;

    let assignments = Assignments::new(state.store.clone());
    for role_id in role_ids {
        assignments.assign_role(user.id, role_id).await?;
    }
    state.permissions.invalidate(user.id).await;

    let view = with_roles(&state, user).await?;
    Ok(Envelope::ok(json!({ "user": view }), "Role assigned to user successfully"))
}

/// DELETE /users/:id/roles
pub async fn remove_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<RoleInput>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let mut checks = Checks::new(&input);
    let names: Vec<String> = input.role.into_iter().collect();
    let role_ids = resolve_roles(&state.repo::<Role>(), &names, "role", &mut checks).await?;
    checks.finish()?;

    let assignments = Assignments::new(state.store.clone());
    for role_id in role_ids {
        assignments.remove_role(user.id, role_id).await?;
    }
    state.permissions.invalidate(user.id).await;

    let view = with_roles(&state, user).await?;
    Ok(Envelope::ok(json!({ "user": view }), "Role removed from user successfully"))
}

/// PUT /users/:id/roles
pub async fn sync_roles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<RolesInput>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let mut checks = Checks::new(&input);
    let names = input.roles.unwrap_or_default();
    let role_ids = resolve_roles(&state.repo::<Role>(), &names, "roles", &mut checks).await?;
    checks.finish()?;

    Assignments::new(state.store.clone()).sync_user_roles(user.id, &role_ids).await?;
    state.permissions.invalidate(user.id).await;

    let view = with_roles(&state, user).await?;
    Ok(Envelope::ok(json!({ "user": view }), "User roles synchronized successfully"))
}

/// GET /users/:id/permissions
pub async fn permissions(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let grants = state.permissions.get_or_load(user.id).await?;
    let names: Vec<&String> = grants.permissions.iter().collect();
    let permissions = state
        .repo::<Permission>()
        .select_any(StoreQuery::filter(json!({ "name": { "$in": names } })).order("id asc"))
        .await?;
    Ok(Envelope::ok(json!({ "permissions": permissions }), "User permissions retrieved successfully"))
}

/// POST /users/:id/has-role
pub async fn has_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<RoleInput>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let mut checks = Checks::new(&input);
    let names: Vec<String> = input.role.iter().cloned().collect();
    resolve_roles(&state.repo::<Role>(), &names, "role", &mut checks).await?;
    checks.finish()?;

    let role = input.role.unwrap_or_default();
    let grants = state.permissions.get_or_load(user.id).await?;
    Ok(Envelope::ok(json!({ "has_role": grants.has_role(&role) }), "Role check completed"))
}

/// POST /users/:id/has-permission
pub async fn has_permission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<PermissionInput>,
) -> Result<Envelope, ApiError> {
    let user = active_user(&state, id).await?;
    let permission = existing_permission(&state, &input).await?;
    let grants = state.permissions.get_or_load(user.id).await?;
    Ok(Envelope::ok(
        json!({ "has_permission": grants.has_permission(&permission) }),
        "Permission check completed",
    ))
}

/// Validates `{permission}` names a stored permission and returns the name.
pub async fn existing_permission(state: &AppState, input: &PermissionInput) -> Result<String, ApiError> {
    let mut checks = Checks::new(input);
    if let Some(name) = input.permission.as_deref().filter(|_| !checks.has("permission")) {
        if state.repo::<Permission>().find_by("name", name).await?.is_none() {
            checks.add("permission", "The selected permission is invalid.");
        }
    }
    checks.finish()?;
    Ok(input.permission.clone().unwrap_or_default())
}
