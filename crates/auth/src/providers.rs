//! Identity providers: where roles, permissions, groups and profiles come from.
//!
//! Each kind is a narrow async trait so database-backed implementations can
//! be swapped in for the static ones here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use warden_core::{AppId, RequestContext, SubjectId, TenantId};

use crate::error::ProviderError;
use crate::permissions::Permission;
use crate::roles::{Role, RoleTable};
use crate::subject::Subject;

#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn get_roles(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        app_id: &AppId,
        subject: &Subject,
    ) -> Result<Vec<Role>, ProviderError>;
}

#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn get_permissions(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        app_id: &AppId,
        subject: &Subject,
    ) -> Result<Vec<Permission>, ProviderError>;
}

/// Groups are organizational membership, so they are tenant-wide.
#[async_trait]
pub trait GroupProvider: Send + Sync {
    async fn get_groups(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject: &Subject,
    ) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn get_profile(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject: &Subject,
    ) -> Result<BTreeMap<String, Value>, ProviderError>;
}

fn poisoned() -> ProviderError {
    ProviderError::Unavailable("lock poisoned".to_string())
}

type AppKey = (TenantId, AppId, SubjectId);
type TenantKey = (TenantId, SubjectId);

/// Fixed role assignments per `(tenant, app, subject)`.
#[derive(Debug, Default)]
pub struct StaticRoleProvider {
    assignments: RwLock<HashMap<AppKey, Vec<Role>>>,
}

impl StaticRoleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign<I, R>(&self, tenant_id: &TenantId, app_id: &AppId, subject_id: &SubjectId, roles: I) -> Result<(), ProviderError>
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        let mut map = self.assignments.write().map_err(|_| poisoned())?;
        let entry = map
            .entry((tenant_id.clone(), app_id.clone(), subject_id.clone()))
            .or_default();
        for role in roles {
            let role = role.into();
            if !entry.contains(&role) {
                entry.push(role);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn get_roles(
        &self,
        _ctx: &RequestContext,
        tenant_id: &TenantId,
        app_id: &AppId,
        subject: &Subject,
    ) -> Result<Vec<Role>, ProviderError> {
        let map = self.assignments.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id.clone(), app_id.clone(), subject.id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Fixed direct permission grants per `(tenant, app, subject)`.
#[derive(Debug, Default)]
pub struct StaticPermissionProvider {
    grants: RwLock<HashMap<AppKey, Vec<Permission>>>,
}

impl StaticPermissionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I, P>(&self, tenant_id: &TenantId, app_id: &AppId, subject_id: &SubjectId, permissions: I) -> Result<(), ProviderError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        let mut map = self.grants.write().map_err(|_| poisoned())?;
        map.entry((tenant_id.clone(), app_id.clone(), subject_id.clone()))
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        Ok(())
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissionProvider {
    async fn get_permissions(
        &self,
        _ctx: &RequestContext,
        tenant_id: &TenantId,
        app_id: &AppId,
        subject: &Subject,
    ) -> Result<Vec<Permission>, ProviderError> {
        let map = self.grants.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id.clone(), app_id.clone(), subject.id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Permissions derived from the subject's roles through a [`RoleTable`].
pub struct RoleDerivedPermissionProvider {
    roles: Arc<dyn RoleProvider>,
    table: Arc<RoleTable>,
}

impl RoleDerivedPermissionProvider {
    pub fn new(roles: Arc<dyn RoleProvider>, table: Arc<RoleTable>) -> Self {
        Self { roles, table }
    }
}

#[async_trait]
impl PermissionProvider for RoleDerivedPermissionProvider {
    async fn get_permissions(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        app_id: &AppId,
        subject: &Subject,
    ) -> Result<Vec<Permission>, ProviderError> {
        let roles = self.roles.get_roles(ctx, tenant_id, app_id, subject).await?;
        let perms = self
            .table
            .permissions_for(tenant_id, roles.iter())
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(perms.into_iter().collect())
    }
}

/// Fixed group membership per `(tenant, subject)`.
#[derive(Debug, Default)]
pub struct StaticGroupProvider {
    members: RwLock<HashMap<TenantKey, Vec<String>>>,
}

impl StaticGroupProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, G>(&self, tenant_id: &TenantId, subject_id: &SubjectId, groups: I) -> Result<(), ProviderError>
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        let mut map = self.members.write().map_err(|_| poisoned())?;
        map.entry((tenant_id.clone(), subject_id.clone()))
            .or_default()
            .extend(groups.into_iter().map(Into::into));
        Ok(())
    }
}

#[async_trait]
impl GroupProvider for StaticGroupProvider {
    async fn get_groups(
        &self,
        _ctx: &RequestContext,
        tenant_id: &TenantId,
        subject: &Subject,
    ) -> Result<Vec<String>, ProviderError> {
        let map = self.members.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id.clone(), subject.id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Fixed profiles per `(tenant, subject)`.
#[derive(Debug, Default)]
pub struct StaticProfileProvider {
    profiles: RwLock<HashMap<TenantKey, BTreeMap<String, Value>>>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant_id: &TenantId, subject_id: &SubjectId, profile: BTreeMap<String, Value>) -> Result<(), ProviderError> {
        let mut map = self.profiles.write().map_err(|_| poisoned())?;
        map.insert((tenant_id.clone(), subject_id.clone()), profile);
        Ok(())
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn get_profile(
        &self,
        _ctx: &RequestContext,
        tenant_id: &TenantId,
        subject: &Subject,
    ) -> Result<BTreeMap<String, Value>, ProviderError> {
        let map = self.profiles.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id.clone(), subject.id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
