//! Tenant access gate consulted before lifecycle calls.
//!
//! The core never verifies identities; callers pass an already verified user
//! and ask an [`AccessPolicy`] whether it may act on a tenant.

use log::warn;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Capability queries answered by the access-control collaborator.
pub trait AccessPolicy {
    fn has_access_to_tenant(&self, user: &str, tenant: &str) -> bool;

    /// Contacts inherit tenant access unless a policy narrows it.
    fn has_access_to_contact(&self, user: &str, tenant: &str) -> bool {
        self.has_access_to_tenant(user, tenant)
    }
}

/// Negative answer from an [`AccessPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub user: String,
    pub tenant: String,
}

impl Display for AccessDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "user `{}` has no access to tenant `{}`", self.user, self.tenant)
    }
}

impl Error for AccessDenied {}

/// Turns a negative tenant check into [`AccessDenied`].
pub fn require_tenant_access<P: AccessPolicy + ?Sized>(
    policy: &P,
    user: &str,
    tenant: &str,
) -> Result<(), AccessDenied> {
    if policy.has_access_to_tenant(user, tenant) {
        return Ok(());
    }
    warn!("event=access_check module=access status=denied tenant={tenant}");
    Err(AccessDenied {
        user: user.to_string(),
        tenant: tenant.to_string(),
    })
}

/// In-process policy: an explicit user -> tenants table.
#[derive(Debug, Clone, Default)]
pub struct TenantAllowList {
    grants: HashMap<String, BTreeSet<String>>,
}

impl TenantAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `user` access to `tenant`.
    pub fn allow(mut self, user: impl Into<String>, tenant: impl Into<String>) -> Self {
        self.grants
            .entry(user.into())
            .or_default()
            .insert(tenant.into());
        self
    }

    /// Tenants granted to `user`, sorted.
    pub fn tenants_for(&self, user: &str) -> Vec<&str> {
        self.grants
            .get(user)
            .map(|tenants| tenants.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl AccessPolicy for TenantAllowList {
    fn has_access_to_tenant(&self, user: &str, tenant: &str) -> bool {
        self.grants
            .get(user)
            .is_some_and(|tenants| tenants.contains(tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::{require_tenant_access, AccessPolicy, TenantAllowList};
    use crate::service::error::ContactServiceError;

    #[test]
    fn allow_list_grants_only_listed_tenants() {
        let policy = TenantAllowList::new()
            .allow("ana", "acme")
            .allow("ana", "beta");

        assert!(policy.has_access_to_tenant("ana", "acme"));
        assert!(policy.has_access_to_contact("ana", "beta"));
        assert!(!policy.has_access_to_tenant("ana", "gamma"));
        assert!(!policy.has_access_to_tenant("bob", "acme"));
        assert_eq!(policy.tenants_for("ana"), vec!["acme", "beta"]);
    }

    #[test]
    fn denial_maps_to_forbidden_service_error() {
        let policy = TenantAllowList::new().allow("ana", "acme");
        let denied = require_tenant_access(&policy, "bob", "acme").expect_err("bob is denied");
        assert_eq!(denied.tenant, "acme");

        let err = ContactServiceError::from(denied);
        assert_eq!(err.status_code(), 403);
    }
}
