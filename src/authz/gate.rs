use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::cache::PermissionCache;
use super::requirement::Requirements;
use crate::auth::Principal;
use crate::database::StoreError;

/// Answers whether a principal meets a set of requirements.
#[async_trait]
pub trait CapabilityCheck: Send + Sync {
    async fn check(&self, principal: &Principal, requirements: &Requirements) -> Result<bool, StoreError>;
}

/// Role and permission lookup through the [`PermissionCache`].
pub struct GrantCheck {
    cache: Arc<PermissionCache>,
}

impl GrantCheck {
    pub fn new(cache: Arc<PermissionCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CapabilityCheck for GrantCheck {
    async fn check(&self, principal: &Principal, requirements: &Requirements) -> Result<bool, StoreError> {
        let grants = self.cache.get_or_load(principal.id).await?;
        Ok(grants.satisfies(requirements))
    }
}

/// Admins pass without consulting the wrapped check.
pub struct AdminBypass<C> {
    inner: C,
}

pub fn with_admin_bypass<C: CapabilityCheck>(inner: C) -> AdminBypass<C> {
    AdminBypass { inner }
}

#[async_trait]
impl<C: CapabilityCheck> CapabilityCheck for AdminBypass<C> {
    async fn check(&self, principal: &Principal, requirements: &Requirements) -> Result<bool, StoreError> {
        if principal.is_admin {
            return Ok(true);
        }
        self.inner.check(principal, requirements).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Denied,
    RequiresLogin,
}

pub struct Gate {
    check: Box<dyn CapabilityCheck>,
}

impl Gate {
    pub fn new(check: impl CapabilityCheck + 'static) -> Self {
        Self { check: Box::new(check) }
    }

    /// Admin bypass in front of the cached role/permission lookup.
    pub fn standard(cache: Arc<PermissionCache>) -> Self {
        Self::new(with_admin_bypass(GrantCheck::new(cache)))
    }

    pub async fn authorize(
        &self,
        principal: Option<&Principal>,
        requirements: &Requirements,
    ) -> Result<Decision, StoreError> {
        let Some(principal) = principal else {
            return Ok(Decision::RequiresLogin);
        };
        if requirements.is_empty() {
            return Ok(Decision::Authorized);
        }
        if self.check.check(principal, requirements).await? {
            Ok(Decision::Authorized)
        } else {
            warn!("User {} denied; requires {}", principal.id, requirements);
            Ok(Decision::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Grants a fixed answer and counts how often it was asked.
    struct Counting {
        answer: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CapabilityCheck for Counting {
        async fn check(&self, _: &Principal, _: &Requirements) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn gate(answer: bool) -> (Gate, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let check = with_admin_bypass(Counting { answer, calls: calls.clone() });
        (Gate::new(check), calls)
    }

    fn principal(is_admin: bool) -> Principal {
        Principal { id: 3, username: "u".into(), email: "u@example.com".into(), is_admin }
    }

    #[tokio::test]
    async fn missing_principal_requires_login_without_lookup() {
        let (gate, calls) = gate(true);
        let decision = gate.authorize(None, &Requirements::permissions("view users")).await.unwrap();
        assert_eq!(decision, Decision::RequiresLogin);
        let decision = gate.authorize(None, &Requirements::authenticated()).await.unwrap();
        assert_eq!(decision, Decision::RequiresLogin);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn admin_bypasses_every_requirement_kind() {
        let (gate, calls) = gate(false);
        let admin = principal(true);
        for reqs in [
            Requirements::permissions("delete roles"),
            Requirements::roles("Super Admin"),
            Requirements::role_or_permission("Super Admin,assign permissions"),
        ] {
            assert_eq!(gate.authorize(Some(&admin), &reqs).await.unwrap(), Decision::Authorized);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_admin_is_delegated() {
        let (denying, calls) = gate(false);
        let user = principal(false);
        let reqs = Requirements::permissions("view users");
        assert_eq!(denying.authorize(Some(&user), &reqs).await.unwrap(), Decision::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (allowing, _) = gate(true);
        assert_eq!(allowing.authorize(Some(&user), &reqs).await.unwrap(), Decision::Authorized);
    }

    #[tokio::test]
    async fn empty_requirements_admit_any_principal() {
        let (gate, calls) = gate(false);
        let decision = gate.authorize(Some(&principal(false)), &Requirements::authenticated()).await.unwrap();
        assert_eq!(decision, Decision::Authorized);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
