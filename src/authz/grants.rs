use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::requirement::{Requirement, Requirements};
use crate::database::models::{Permission, Role, RolePermission, UserPermission, UserRole};
use crate::database::{Query, Repository, Store, StoreError};

/// Roles and effective permissions (direct plus inherited) of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Grants {
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Grants {
    pub async fn load(store: &Arc<dyn Store>, user_id: i64) -> Result<Self, StoreError> {
        let role_ids: Vec<i64> = Repository::<UserRole>::new(store.clone())
            .select_any(Query::filter(json!({ "user_id": user_id })))
            .await?
            .into_iter()
            .map(|link| link.role_id)
            .collect();
        let roles = Repository::<Role>::new(store.clone()).find_many(&role_ids).await?;

        let mut permission_ids: BTreeSet<i64> = Repository::<UserPermission>::new(store.clone())
            .select_any(Query::filter(json!({ "user_id": user_id })))
            .await?
            .into_iter()
            .map(|link| link.permission_id)
            .collect();
        if !role_ids.is_empty() {
            let inherited = Repository::<RolePermission>::new(store.clone())
                .select_any(Query::filter(json!({ "role_id": { "$in": role_ids } })))
                .await?;
            permission_ids.extend(inherited.into_iter().map(|link| link.permission_id));
        }
        let permission_ids: Vec<i64> = permission_ids.into_iter().collect();
        let permissions = Repository::<Permission>::new(store.clone()).find_many(&permission_ids).await?;

        Ok(Self {
            roles: roles.into_iter().map(|r| r.name).collect(),
            permissions: permissions.into_iter().map(|p| p.name).collect(),
        })
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains(name)
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    pub fn satisfies_one(&self, requirement: &Requirement) -> bool {
        match requirement {
            Requirement::Permission(name) => self.has_permission(name),
            Requirement::Role(name) => self.has_role(name),
            Requirement::RoleOrPermission(name) => self.has_role(name) || self.has_permission(name),
        }
    }

    /// True when any requirement holds; an empty list always holds.
    pub fn satisfies(&self, requirements: &Requirements) -> bool {
        requirements.is_empty() || requirements.iter().any(|r| self.satisfies_one(r))
    }
}
