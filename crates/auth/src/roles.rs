use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use warden_core::TenantId;

use crate::error::AuthzError;
use crate::permissions::Permission;

/// Role name used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Default)]
struct Tables {
    grants: HashMap<(TenantId, Role), BTreeSet<Permission>>,
    parents: HashMap<(TenantId, Role), BTreeSet<Role>>,
}

/// Tenant-scoped role → permission table with role inheritance.
///
/// A role inherits every permission of its parents, transitively. Cycles in
/// the inheritance graph are tolerated and simply stop the walk.
#[derive(Debug, Default)]
pub struct RoleTable {
    inner: RwLock<Tables>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add permissions to a role within a tenant.
    pub fn grant<I, P>(&self, tenant_id: &TenantId, role: &Role, permissions: I) -> Result<(), AuthzError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        let mut tables = self.inner.write().map_err(|_| AuthzError::poisoned("role table"))?;
        tables
            .grants
            .entry((tenant_id.clone(), role.clone()))
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        Ok(())
    }

    /// Remove one permission from a role. Returns `true` when it was granted.
    pub fn revoke(&self, tenant_id: &TenantId, role: &Role, permission: &Permission) -> Result<bool, AuthzError> {
        let mut tables = self.inner.write().map_err(|_| AuthzError::poisoned("role table"))?;
        Ok(tables
            .grants
            .get_mut(&(tenant_id.clone(), role.clone()))
            .is_some_and(|set| set.remove(permission)))
    }

    /// Make `role` inherit from `parent` within a tenant.
    pub fn inherit(&self, tenant_id: &TenantId, role: &Role, parent: &Role) -> Result<(), AuthzError> {
        let mut tables = self.inner.write().map_err(|_| AuthzError::poisoned("role table"))?;
        tables
            .parents
            .entry((tenant_id.clone(), role.clone()))
            .or_default()
            .insert(parent.clone());
        Ok(())
    }

    /// The given roles plus every role they inherit from.
    pub fn expand<'a, I>(&self, tenant_id: &TenantId, roles: I) -> Result<BTreeSet<Role>, AuthzError>
    where
        I: IntoIterator<Item = &'a Role>,
    {
        let tables = self.inner.read().map_err(|_| AuthzError::poisoned("role table"))?;
        Ok(expand_roles(&tables, tenant_id, roles))
    }

    /// Effective permissions of a set of roles (inheritance included).
    pub fn permissions_for<'a, I>(&self, tenant_id: &TenantId, roles: I) -> Result<BTreeSet<Permission>, AuthzError>
    where
        I: IntoIterator<Item = &'a Role>,
    {
        let tables = self.inner.read().map_err(|_| AuthzError::poisoned("role table"))?;
        let mut out = BTreeSet::new();
        for role in expand_roles(&tables, tenant_id, roles) {
            if let Some(perms) = tables.grants.get(&(tenant_id.clone(), role)) {
                out.extend(perms.iter().cloned());
            }
        }
        Ok(out)
    }

    /// First `(role, permission)` pair that covers `required`, if any.
    pub fn find_grant<'a, I>(
        &self,
        tenant_id: &TenantId,
        roles: I,
        required: &Permission,
    ) -> Result<Option<(Role, Permission)>, AuthzError>
    where
        I: IntoIterator<Item = &'a Role>,
    {
        let tables = self.inner.read().map_err(|_| AuthzError::poisoned("role table"))?;
        for role in expand_roles(&tables, tenant_id, roles) {
            let Some(perms) = tables.grants.get(&(tenant_id.clone(), role.clone())) else {
                continue;
            };
            if let Some(p) = perms.iter().find(|p| p.matches(required)) {
                return Ok(Some((role, p.clone())));
            }
        }
        Ok(None)
    }
}

fn expand_roles<'a, I>(tables: &Tables, tenant_id: &TenantId, roles: I) -> BTreeSet<Role>
where
    I: IntoIterator<Item = &'a Role>,
{
    let mut seen = BTreeSet::new();
    let mut pending: Vec<Role> = roles.into_iter().cloned().collect();
    while let Some(role) = pending.pop() {
        if !seen.insert(role.clone()) {
            continue;
        }
        if let Some(parents) = tables.parents.get(&(tenant_id.clone(), role)) {
            pending.extend(parents.iter().filter(|p| !seen.contains(*p)).cloned());
        }
    }
    seen
}
