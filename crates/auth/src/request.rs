use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::{AppId, TenantId};

use crate::identity::IdentityContext;

/// Target of an authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: Option<String>,
    pub tenant_id: TenantId,
    pub app_id: Option<AppId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(tenant_id: impl Into<TenantId>, resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            tenant_id: tenant_id.into(),
            app_id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_app(mut self, app_id: impl Into<AppId>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// `(identity, resource, action)` plus request context attributes.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub identity: &'a IdentityContext,
    pub resource: Resource,
    pub action: String,
    pub context: BTreeMap<String, Value>,
}

impl<'a> AuthorizationRequest<'a> {
    pub fn new(identity: &'a IdentityContext, resource: Resource, action: impl Into<String>) -> Self {
        Self {
            identity,
            resource,
            action: action.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Internal classification of a deny. Never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    TenantMismatch,
    AppMismatch,
    MissingRole,
    MissingPermission,
    NoMatchingRule,
    ConditionFailed,
    NoGrant,
    PolicyDenied,
    NoMatchingPolicy,
    Indeterminate,
}

/// Message shown to callers for every deny.
pub const ACCESS_DENIED: &str = "access denied";

/// Allow/deny with an internal reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    /// Internal reason. Log it; do not return it to clients.
    pub reason: String,
    pub denial: Option<DenialKind>,
    /// Name of the model that decided.
    pub model: &'static str,
}

impl AuthorizationDecision {
    pub fn allow(model: &'static str, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            denial: None,
            model,
        }
    }

    pub fn deny(model: &'static str, kind: DenialKind, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            denial: Some(kind),
            model,
        }
    }

    /// Caller-safe summary that does not reveal which check fired.
    pub fn public_message(&self) -> &'static str {
        if self.allowed { "access granted" } else { ACCESS_DENIED }
    }
}

/// Deny when the resource lives outside the identity's tenant or app.
pub(crate) fn scope_violation(request: &AuthorizationRequest<'_>, model: &'static str) -> Option<AuthorizationDecision> {
    let identity = request.identity;
    if request.resource.tenant_id != identity.tenant_id {
        return Some(AuthorizationDecision::deny(
            model,
            DenialKind::TenantMismatch,
            format!(
                "resource tenant '{}' differs from identity tenant '{}'",
                request.resource.tenant_id, identity.tenant_id
            ),
        ));
    }
    if let Some(app) = &request.resource.app_id {
        if *app != identity.app_id {
            return Some(AuthorizationDecision::deny(
                model,
                DenialKind::AppMismatch,
                format!("resource app '{}' differs from identity app '{}'", app, identity.app_id),
            ));
        }
    }
    None
}
