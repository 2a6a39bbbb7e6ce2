use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity;
use crate::database::schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

entity!(Role, schema::ROLES);

impl Role {
    /// The one role that can never be deleted.
    pub const SUPER_ADMIN: &'static str = "Super Admin";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

entity!(Permission, schema::PERMISSIONS);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
    pub id: i64,
    pub role_id: i64,
    pub permission_id: i64,
}

entity!(RolePermission, schema::ROLE_PERMISSIONS);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    pub id: i64,
    pub user_id: i64,
    pub role_id: i64,
}

entity!(UserRole, schema::USER_ROLES);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPermission {
    pub id: i64,
    pub user_id: i64,
    pub permission_id: i64,
}

entity!(UserPermission, schema::USER_PERMISSIONS);

/// Issued bearer credential. Only the SHA-256 of the token id is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

entity!(AccessToken, schema::ACCESS_TOKENS);
