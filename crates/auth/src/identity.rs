use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::{AppId, TenantId};

use crate::permissions::Permission;
use crate::roles::Role;
use crate::subject::{Session, Subject};

/// Fully resolved view of a subject within one tenant and app.
///
/// Roles and permissions are scoped to `(tenant_id, app_id)`, groups and
/// profile to `tenant_id`. Never mutated after the builder produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub subject: Subject,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub roles: BTreeSet<Role>,
    pub permissions: BTreeSet<Permission>,
    pub groups: BTreeSet<String>,
    pub profile: BTreeMap<String, Value>,
    pub session: Option<Session>,
}

impl IdentityContext {
    /// Context with no roles, permissions, groups or profile.
    pub fn bare(subject: Subject, app_id: AppId) -> Self {
        Self {
            tenant_id: subject.tenant_id.clone(),
            subject,
            app_id,
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
            groups: BTreeSet::new(),
            profile: BTreeMap::new(),
            session: None,
        }
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Whether any held permission covers `required`.
    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions.iter().any(|p| p.matches(required))
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
