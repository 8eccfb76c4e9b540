use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use warden_core::{AppId, SubjectId, TenantId};

use crate::error::AuthzError;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind};

pub const MODEL: &str = "acl";

/// Explicit grant on one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub subject_id: SubjectId,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
}

impl AclEntry {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        app_id: impl Into<AppId>,
        subject_id: impl Into<SubjectId>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            app_id: app_id.into(),
            subject_id: subject_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            action: action.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AclStore {
    entries: RwLock<HashSet<AclEntry>>,
}

impl AclStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the grant is new.
    pub fn grant(&self, entry: AclEntry) -> Result<bool, AuthzError> {
        let mut entries = self.entries.write().map_err(|_| AuthzError::poisoned("acl"))?;
        Ok(entries.insert(entry))
    }

    /// Returns `true` when a grant was removed.
    pub fn revoke(&self, entry: &AclEntry) -> Result<bool, AuthzError> {
        let mut entries = self.entries.write().map_err(|_| AuthzError::poisoned("acl"))?;
        Ok(entries.remove(entry))
    }

    pub fn check(&self, entry: &AclEntry) -> Result<bool, AuthzError> {
        let entries = self.entries.read().map_err(|_| AuthzError::poisoned("acl"))?;
        Ok(entries.contains(entry))
    }

    pub fn for_subject(&self, tenant_id: &TenantId, app_id: &AppId, subject_id: &SubjectId) -> Result<Vec<AclEntry>, AuthzError> {
        let entries = self.entries.read().map_err(|_| AuthzError::poisoned("acl"))?;
        Ok(entries
            .iter()
            .filter(|e| &e.tenant_id == tenant_id && &e.app_id == app_id && &e.subject_id == subject_id)
            .cloned()
            .collect())
    }

    pub fn for_resource(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Vec<AclEntry>, AuthzError> {
        let entries = self.entries.read().map_err(|_| AuthzError::poisoned("acl"))?;
        Ok(entries
            .iter()
            .filter(|e| {
                &e.tenant_id == tenant_id
                    && &e.app_id == app_id
                    && e.resource_type == resource_type
                    && e.resource_id == resource_id
            })
            .cloned()
            .collect())
    }
}

/// Allows only on an exact `(tenant, app, subject, type, id, action)` grant.
#[derive(Debug, Clone)]
pub struct AclEvaluator {
    store: Arc<AclStore>,
}

impl AclEvaluator {
    pub fn new(store: Arc<AclStore>) -> Self {
        Self { store }
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let Some(resource_id) = &request.resource.id else {
            return Ok(AuthorizationDecision::deny(
                MODEL,
                DenialKind::NoGrant,
                "resource has no instance id",
            ));
        };

        let identity = request.identity;
        let wanted = AclEntry {
            tenant_id: identity.tenant_id.clone(),
            app_id: identity.app_id.clone(),
            subject_id: identity.subject.id.clone(),
            resource_type: request.resource.resource_type.clone(),
            resource_id: resource_id.clone(),
            action: request.action.clone(),
        };

        if self.store.check(&wanted)? {
            Ok(AuthorizationDecision::allow(
                MODEL,
                format!("explicit grant on {}:{}", wanted.resource_type, wanted.resource_id),
            ))
        } else {
            Ok(AuthorizationDecision::deny(
                MODEL,
                DenialKind::NoGrant,
                format!(
                    "no grant for '{}' on {}:{}",
                    wanted.action, wanted.resource_type, wanted.resource_id
                ),
            ))
        }
    }
}
