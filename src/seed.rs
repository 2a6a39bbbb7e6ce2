//! Default permissions, roles and the bootstrap administrator. Safe to run
//! repeatedly: existing rows are reused, missing links are added.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, AuthError};
use crate::authz::Assignments;
use crate::database::models::{Permission, Role, User};
use crate::database::{into_row, Repository, Store, StoreError};

pub const PERMISSION_GROUPS: &[(&str, &[&str])] = &[
    ("users", &["view users", "create users", "edit users", "delete users", "restore users"]),
    ("products", &["view products", "create products", "edit products", "delete products", "restore products"]),
    (
        "orders",
        &["view orders", "create orders", "edit orders", "delete orders", "process orders", "cancel orders"],
    ),
    ("customers", &["view customers", "create customers", "edit customers", "delete customers"]),
    ("roles", &["view roles", "create roles", "edit roles", "delete roles", "assign permissions"]),
    ("permissions", &["view permissions", "create permissions", "edit permissions", "delete permissions"]),
    ("system", &["view system settings", "edit system settings", "view logs", "run maintenance"]),
];

const ADMIN_EXCLUDED: &[&str] = &["run maintenance", "delete permissions", "delete roles"];
const SUPPORT: &[&str] = &["view orders", "edit orders", "process orders", "view customers"];

/// Bootstrap administrator credentials.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl AdminSeed {
    /// `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD`, defaulting to
    /// `admin@example.com` / `password`.
    pub fn from_env() -> Self {
        Self {
            username: std::env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            email: std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string()),
            password: std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "password".to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn all_permissions() -> impl Iterator<Item = &'static str> {
    PERMISSION_GROUPS.iter().flat_map(|(_, names)| names.iter().copied())
}

fn group(name: &str) -> &'static [&'static str] {
    PERMISSION_GROUPS
        .iter()
        .find(|(group, _)| *group == name)
        .map(|(_, names)| *names)
        .unwrap_or_default()
}

/// Role name to the permission names it is granted.
pub fn default_roles() -> Vec<(&'static str, Vec<&'static str>)> {
    let manager: Vec<&'static str> = group("products")
        .iter()
        .chain(group("orders"))
        .chain(group("customers"))
        .copied()
        .chain(["view users"])
        .collect();
    let sales: Vec<&'static str> = ["view products"]
        .into_iter()
        .chain(group("orders").iter().copied())
        .chain(group("customers").iter().copied())
        .collect();

    vec![
        (Role::SUPER_ADMIN, all_permissions().collect()),
        ("Admin", all_permissions().filter(|p| !ADMIN_EXCLUDED.contains(p)).collect()),
        ("Manager", manager),
        ("Sales", sales),
        ("Support", SUPPORT.to_vec()),
    ]
}

async fn find_or_create_named<T>(repo: &Repository<T>, name: &str) -> Result<T, StoreError>
where
    T: crate::database::models::Entity,
{
    if let Some(existing) = repo.find_by("name", name).await? {
        return Ok(existing);
    }
    let now = Utc::now();
    repo.create(into_row(json!({ "name": name, "created_at": now, "updated_at": now })))
        .await
}

pub async fn run(store: Arc<dyn Store>, admin: &AdminSeed) -> Result<User, SeedError> {
    let permissions: Repository<Permission> = Repository::new(store.clone());
    let roles: Repository<Role> = Repository::new(store.clone());
    let users: Repository<User> = Repository::new(store.clone());
    let assignments = Assignments::new(store.clone());

    let mut permission_ids = std::collections::HashMap::new();
    for name in all_permissions() {
        let permission = find_or_create_named(&permissions, name).await?;
        permission_ids.insert(name, permission.id);
    }
    info!("Seeded {} permissions", permission_ids.len());

    let mut super_admin_id = None;
    for (role_name, granted) in default_roles() {
        let role = find_or_create_named(&roles, role_name).await?;
        let ids: Vec<i64> = granted.iter().filter_map(|p| permission_ids.get(p).copied()).collect();
        assignments.sync_role_permissions(role.id, &ids).await?;
        if role_name == Role::SUPER_ADMIN {
            super_admin_id = Some(role.id);
        }
    }
    info!("Seeded {} roles", default_roles().len());

    let user = match users.find_by("email", admin.email.as_str()).await? {
        Some(user) => user,
        None => {
            let now = Utc::now();
            users
                .create(into_row(json!({
                    "uuid": Uuid::new_v4(),
                    "username": admin.username,
                    "email": admin.email,
                    "password": hash_password(&admin.password)?,
                    "is_admin": true,
                    "created_at": now,
                    "updated_at": now,
                })))
                .await?
        }
    };
    if let Some(role_id) = super_admin_id {
        assignments.assign_role(user.id, role_id).await?;
    }
    info!("Bootstrap administrator is {}", user.email);

    Ok(user)
}
