use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use crate::database::models::{Permission, Role, RolePermission, UserRole};
use crate::database::{into_row, Query, Repository, Store, StoreError};

/// Maintains the `user_roles` and `role_permissions` pivots. Callers own
/// invalidating the [`PermissionCache`](super::PermissionCache) afterwards.
pub struct Assignments {
    roles: Repository<Role>,
    permissions: Repository<Permission>,
    user_roles: Repository<UserRole>,
    role_permissions: Repository<RolePermission>,
}

impl Assignments {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            roles: Repository::new(store.clone()),
            permissions: Repository::new(store.clone()),
            user_roles: Repository::new(store.clone()),
            role_permissions: Repository::new(store),
        }
    }

    pub async fn roles_of_user(&self, user_id: i64) -> Result<Vec<Role>, StoreError> {
        let ids: Vec<i64> = self
            .user_roles
            .select_any(Query::filter(json!({ "user_id": user_id })))
            .await?
            .into_iter()
            .map(|link| link.role_id)
            .collect();
        let mut roles = self.roles.find_many(&ids).await?;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Adds the role unless the user already holds it.
    pub async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), StoreError> {
        if self.user_roles.exists(json!({ "user_id": user_id, "role_id": role_id })).await? {
            return Ok(());
        }
        self.user_roles
            .create(into_row(json!({ "user_id": user_id, "role_id": role_id })))
            .await?;
        Ok(())
    }

    pub async fn remove_role(&self, user_id: i64, role_id: i64) -> Result<u64, StoreError> {
        self.user_roles
            .delete_where(json!({ "user_id": user_id, "role_id": role_id }))
            .await
    }

    /// Makes `role_ids` the user's exact role set.
    pub async fn sync_user_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), StoreError> {
        let wanted: BTreeSet<i64> = role_ids.iter().copied().collect();
        let wanted_list: Vec<i64> = wanted.iter().copied().collect();
        self.user_roles
            .delete_where(json!({ "user_id": user_id, "role_id": { "$nin": wanted_list } }))
            .await?;
        for role_id in wanted {
            self.assign_role(user_id, role_id).await?;
        }
        Ok(())
    }

    pub async fn permissions_of_role(&self, role_id: i64) -> Result<Vec<Permission>, StoreError> {
        let ids: Vec<i64> = self
            .role_permissions
            .select_any(Query::filter(json!({ "role_id": role_id })))
            .await?
            .into_iter()
            .map(|link| link.permission_id)
            .collect();
        let mut permissions = self.permissions.find_many(&ids).await?;
        permissions.sort_by_key(|p| p.id);
        Ok(permissions)
    }

    /// Makes `permission_ids` the role's exact permission set.
    pub async fn sync_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> Result<(), StoreError> {
        let wanted: BTreeSet<i64> = permission_ids.iter().copied().collect();
        let wanted_list: Vec<i64> = wanted.iter().copied().collect();
        self.role_permissions
            .delete_where(json!({ "role_id": role_id, "permission_id": { "$nin": wanted_list } }))
            .await?;
        for permission_id in wanted {
            let link = json!({ "role_id": role_id, "permission_id": permission_id });
            if !self.role_permissions.exists(link.clone()).await? {
                self.role_permissions.create(into_row(link)).await?;
            }
        }
        Ok(())
    }

    pub async fn roles_with_permission(&self, permission_id: i64) -> Result<Vec<Role>, StoreError> {
        let ids: Vec<i64> = self
            .role_permissions
            .select_any(Query::filter(json!({ "permission_id": permission_id })))
            .await?
            .into_iter()
            .map(|link| link.role_id)
            .collect();
        let mut roles = self.roles.find_many(&ids).await?;
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }
}
