use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::grants::Grants;
use crate::database::{Store, StoreError};

#[derive(Default)]
struct Entries {
    grants: HashMap<i64, Arc<Grants>>,
    /// Bumped by every invalidation. A load started under an older
    /// generation is returned to its caller but never stored.
    generation: u64,
}

/// Read-through cache of per-user [`Grants`]. Owned by the application
/// state; callers that change roles or permissions must invalidate it.
pub struct PermissionCache {
    store: Arc<dyn Store>,
    entries: RwLock<Entries>,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, entries: RwLock::new(Entries::default()) }
    }

    pub async fn get_or_load(&self, user_id: i64) -> Result<Arc<Grants>, StoreError> {
        let generation = {
            let entries = self.entries.read().await;
            if let Some(grants) = entries.grants.get(&user_id) {
                return Ok(grants.clone());
            }
            entries.generation
        };

        let grants = Arc::new(Grants::load(&self.store, user_id).await?);

        let mut entries = self.entries.write().await;
        if entries.generation == generation {
            entries.grants.insert(user_id, grants.clone());
        } else {
            debug!("Discarding grants for user {} loaded before an invalidation", user_id);
        }
        Ok(grants)
    }

    /// Forgets one user, e.g. after logout or a role change.
    pub async fn invalidate(&self, user_id: i64) {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        if entries.grants.remove(&user_id).is_some() {
            debug!("Invalidated cached grants for user {}", user_id);
        }
    }

    /// Forgets everyone, e.g. after a role's permissions change.
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        debug!("Invalidated cached grants for {} user(s)", entries.grants.len());
        entries.grants.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.grants.len()
    }
}
