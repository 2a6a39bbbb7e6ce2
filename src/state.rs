use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionManager;
use crate::authz::{Gate, PermissionCache};
use crate::config::AppConfig;
use crate::database::models::Entity;
use crate::database::{Repository, Store};
use crate::middleware::RateLimiter;

/// Shared request state. Cloning is cheap; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub gate: Arc<Gate>,
    pub sessions: Arc<SessionManager>,
    pub permissions: Arc<PermissionCache>,
    pub limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let permissions = Arc::new(PermissionCache::new(store.clone()));
        let sessions = Arc::new(SessionManager::new(store.clone(), &config.security, permissions.clone()));
        let gate = Arc::new(Gate::standard(permissions.clone()));
        let limiter = config.api.enable_rate_limiting.then(|| {
            Arc::new(RateLimiter::new(
                config.api.rate_limit_requests,
                Duration::from_secs(config.api.rate_limit_window_secs),
            ))
        });

        Self {
            config: Arc::new(config),
            store,
            gate,
            sessions,
            permissions,
            limiter,
        }
    }

    pub fn repo<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}
