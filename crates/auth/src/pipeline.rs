use std::sync::Arc;

use crate::engine::AuthorizationEngine;
use crate::error::AuthzError;
use crate::permissions::Permission;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind, scope_violation};
use crate::roles::Role;

/// One stage of an authorization pipeline.
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError>;
}

impl<C: Check + ?Sized> Check for Arc<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        (**self).check(request)
    }
}

/// Resource must live in the identity's tenant (and app, when set).
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantScope;

impl Check for TenantScope {
    fn name(&self) -> &'static str {
        "tenant_scope"
    }

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        Ok(scope_violation(request, self.name())
            .unwrap_or_else(|| AuthorizationDecision::allow(self.name(), "resource within identity scope")))
    }
}

/// Identity must hold at least one of the roles.
#[derive(Debug, Clone)]
pub struct RequireAnyRole {
    roles: Vec<Role>,
}

impl RequireAnyRole {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Check for RequireAnyRole {
    fn name(&self) -> &'static str {
        "require_any_role"
    }

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let identity = request.identity;
        Ok(match self.roles.iter().find(|r| identity.has_role(r)) {
            Some(role) => AuthorizationDecision::allow(self.name(), format!("holds role '{role}'")),
            None => AuthorizationDecision::deny(
                self.name(),
                DenialKind::MissingRole,
                format!("none of {} required roles held", self.roles.len()),
            ),
        })
    }
}

/// Identity must directly hold a permission covering the given one.
#[derive(Debug, Clone)]
pub struct RequirePermission {
    permission: Permission,
}

impl RequirePermission {
    pub fn new(permission: impl Into<Permission>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

impl Check for RequirePermission {
    fn name(&self) -> &'static str {
        "require_permission"
    }

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        Ok(if request.identity.has_permission(&self.permission) {
            AuthorizationDecision::allow(self.name(), format!("holds '{}'", self.permission))
        } else {
            AuthorizationDecision::deny(
                self.name(),
                DenialKind::MissingPermission,
                format!("missing '{}'", self.permission),
            )
        })
    }
}

impl Check for AuthorizationEngine {
    fn name(&self) -> &'static str {
        self.model()
    }

    fn check(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        self.evaluate(request)
    }
}

/// Ordered checks; the first deny (or error) stops the run.
///
/// An empty pipeline denies.
#[derive(Clone, Default)]
pub struct AuthorizationPipeline {
    stages: Vec<Arc<dyn Check>>,
}

impl core::fmt::Debug for AuthorizationPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|s| s.name())).finish()
    }
}

impl AuthorizationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, check: impl Check + 'static) -> Self {
        self.stages.push(Arc::new(check));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn run(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let mut last = None;
        for stage in &self.stages {
            let decision = stage.check(request)?;
            if !decision.allowed {
                tracing::debug!(stage = stage.name(), reason = %decision.reason, "pipeline stopped");
                return Ok(decision);
            }
            last = Some(decision);
        }
        Ok(last.unwrap_or_else(|| {
            AuthorizationDecision::deny("pipeline", DenialKind::NoMatchingRule, "pipeline has no stages")
        }))
    }
}
