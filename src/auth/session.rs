use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{token_hash, verify_absent, verify_password, AuthError, Claims, Principal, TokenSigner};
use crate::authz::PermissionCache;
use crate::config::SecurityConfig;
use crate::database::models::{AccessToken, User};
use crate::database::{into_row, Repository, Store};

/// Result of a successful login.
#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Issues, checks and revokes bearer credentials. Token state lives in the
/// store, so any instance can validate any token.
pub struct SessionManager {
    users: Repository<User>,
    tokens: Repository<AccessToken>,
    signer: Option<TokenSigner>,
    ttl: Duration,
    permissions: Arc<PermissionCache>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, security: &SecurityConfig, permissions: Arc<PermissionCache>) -> Self {
        let signer = match TokenSigner::new(&security.jwt_secret) {
            Ok(signer) => Some(signer),
            Err(e) => {
                warn!("Bearer authentication disabled: {}", e);
                None
            }
        };
        Self {
            users: Repository::new(store.clone()),
            tokens: Repository::new(store),
            signer,
            ttl: Duration::hours(security.jwt_expiry_hours as i64),
            permissions,
        }
    }

    fn signer(&self) -> Result<&TokenSigner, AuthError> {
        self.signer.as_ref().ok_or(AuthError::MissingSecret)
    }

    /// Verifies credentials, revokes the user's older tokens and issues a new one.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let verified = match self.users.find_by("email", email).await? {
            Some(user) => verify_password(password, &user.password).then_some(user),
            None => {
                verify_absent(password);
                None
            }
        };
        let user = match verified {
            Some(user) => user,
            None => {
                warn!("Failed login for {}", email);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let revoked = self.revoke_all(user.id).await?;
        if revoked > 0 {
            debug!("Revoked {} previous token(s) for user {}", revoked, user.id);
        }

        let claims = Claims::new(user.id, self.ttl);
        let token = self.signer()?.sign(&claims)?;
        let expires_at = claims.expires_at();
        self.tokens
            .create(into_row(json!({
                "user_id": user.id,
                "name": "api-token",
                "token_hash": token_hash(&claims.jti),
                "expires_at": expires_at,
                "created_at": Utc::now(),
            })))
            .await?;
        debug!("Issued token for user {} expiring {}", user.id, expires_at);

        Ok(LoginOutcome { user, token, token_type: "Bearer", expires_at })
    }

    /// Revokes every token of the principal and forgets its cached grants.
    pub async fn logout(&self, principal: &Principal) -> Result<u64, AuthError> {
        let revoked = self.revoke_all(principal.id).await?;
        self.permissions.invalidate(principal.id).await;
        Ok(revoked)
    }

    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, AuthError> {
        Ok(self.tokens.delete_where(json!({ "user_id": user_id })).await?)
    }

    /// Resolves a bearer token to its principal. Fails when the signature or
    /// expiry is bad, the token was revoked, or the user is gone.
    pub async fn authenticate(&self, bearer: &str) -> Result<Principal, AuthError> {
        let claims = self.signer()?.verify(bearer)?;

        let record = self
            .tokens
            .find_by("token_hash", token_hash(&claims.jti))
            .await?
            .ok_or(AuthError::Revoked)?;
        if record.user_id != claims.sub || record.expires_at <= Utc::now() {
            return Err(AuthError::Revoked);
        }

        let user = self.users.find(claims.sub).await?.ok_or(AuthError::Revoked)?;
        Ok(Principal::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::config::{AppConfig, Environment};
    use crate::database::MemoryStore;

    async fn setup() -> (SessionManager, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let users: Repository<User> = Repository::new(store.clone());
        users
            .create(into_row(json!({
                "username": "ana",
                "email": "ana@example.com",
                "password": hash_password("password123").unwrap(),
                "is_admin": false,
            })))
            .await
            .unwrap();
        let config = AppConfig::for_environment(Environment::Development);
        let cache = Arc::new(PermissionCache::new(store.clone()));
        (SessionManager::new(store.clone(), &config.security, cache), store)
    }

    #[tokio::test]
    async fn login_then_authenticate() {
        let (sessions, _) = setup().await;
        let outcome = sessions.login("ana@example.com", "password123").await.unwrap();
        assert_eq!(outcome.token_type, "Bearer");
        let principal = sessions.authenticate(&outcome.token).await.unwrap();
        assert_eq!(principal.email, "ana@example.com");
        assert!(!principal.is_admin);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (sessions, _) = setup().await;
        let err = sessions.login("ana@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let err = sessions.login("nobody@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn new_login_revokes_previous_token() {
        let (sessions, _) = setup().await;
        let first = sessions.login("ana@example.com", "password123").await.unwrap();
        let second = sessions.login("ana@example.com", "password123").await.unwrap();
        assert!(matches!(sessions.authenticate(&first.token).await, Err(AuthError::Revoked)));
        assert!(sessions.authenticate(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let (sessions, _) = setup().await;
        let outcome = sessions.login("ana@example.com", "password123").await.unwrap();
        let principal = sessions.authenticate(&outcome.token).await.unwrap();
        assert_eq!(sessions.logout(&principal).await.unwrap(), 1);
        assert!(matches!(sessions.authenticate(&outcome.token).await, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn soft_deleted_user_cannot_authenticate() {
        let (sessions, store) = setup().await;
        let outcome = sessions.login("ana@example.com", "password123").await.unwrap();
        let users: Repository<User> = Repository::new(store);
        users.soft_delete(outcome.user.id, None).await.unwrap();
        assert!(matches!(sessions.authenticate(&outcome.token).await, Err(AuthError::Revoked)));
    }
}
