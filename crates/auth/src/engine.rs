//! Authorization entry point.
//!
//! The engine enforces tenant/app scope before any model runs, then delegates
//! to the configured [`Evaluator`]. Every decision is logged with its internal
//! reason; callers only ever see [`AuthorizationDecision::public_message`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_core::{Clock, SystemClock};

use crate::abac::AbacRule;
use crate::error::AuthzError;
use crate::evaluator::Evaluator;
use crate::hybrid::{DEFAULT_OWNER_ATTRIBUTE, HybridEvaluator, OverrideRule};
use crate::identity::IdentityContext;
use crate::permissions::Permission;
use crate::policy::{CombiningAlgorithm, PolicyEvaluator, PolicyStore};
use crate::rbac::RbacEvaluator;
use crate::request::{AuthorizationDecision, AuthorizationRequest, scope_violation};
use crate::roles::{Role, RoleTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub combining_algorithm: CombiningAlgorithm,
    /// Resource attribute compared with the subject id by owner overrides.
    pub owner_attribute: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            combining_algorithm: CombiningAlgorithm::default(),
            owner_attribute: DEFAULT_OWNER_ATTRIBUTE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    evaluator: Evaluator,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("model", &self.evaluator.name())
            .finish_non_exhaustive()
    }
}

impl AuthorizationEngine {
    pub fn new(evaluator: impl Into<Evaluator>) -> Self {
        Self {
            evaluator: evaluator.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Time source for time-of-day conditions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// RBAC narrowed by `constraints`, with owners allowed to read their own
    /// resources.
    pub fn hybrid(table: Arc<RoleTable>, constraints: Vec<AbacRule>, config: &AuthorizationConfig) -> Self {
        let hybrid = constraints.into_iter().fold(
            HybridEvaluator::new(RbacEvaluator::new(table).into()),
            HybridEvaluator::with_constraint,
        );
        Self::new(hybrid.with_override(OverrideRule::owner(config.owner_attribute.clone(), ["read"])))
    }

    pub fn policies(store: Arc<PolicyStore>, config: &AuthorizationConfig) -> Self {
        Self::new(PolicyEvaluator::new(store, config.combining_algorithm))
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn model(&self) -> &'static str {
        self.evaluator.name()
    }

    /// Decide one request.
    ///
    /// Cross-tenant and cross-app requests are denied before the model runs.
    /// `Err` means the decision could not be made; callers must treat it as a
    /// deny.
    pub fn evaluate(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let decision = match scope_violation(request, self.model()) {
            Some(denied) => denied,
            None => self.evaluator.evaluate(request, self.clock.now())?,
        };

        tracing::debug!(
            tenant_id = %request.identity.tenant_id,
            subject = %request.identity.subject.qualified_id(),
            resource_type = %request.resource.resource_type,
            action = %request.action,
            model = decision.model,
            allowed = decision.allowed,
            denial = ?decision.denial,
            reason = %decision.reason,
            "authorization decision"
        );
        Ok(decision)
    }

    pub fn has_role(&self, identity: &IdentityContext, role: &Role) -> bool {
        identity.has_role(role)
    }

    pub fn has_any_role<'a, I>(&self, identity: &IdentityContext, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a Role>,
    {
        roles.into_iter().any(|r| identity.has_role(r))
    }

    pub fn has_all_roles<'a, I>(&self, identity: &IdentityContext, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a Role>,
    {
        roles.into_iter().all(|r| identity.has_role(r))
    }

    pub fn has_permission(&self, identity: &IdentityContext, permission: &Permission) -> bool {
        identity.has_permission(permission)
    }

    pub fn has_any_permission<'a, I>(&self, identity: &IdentityContext, permissions: I) -> bool
    where
        I: IntoIterator<Item = &'a Permission>,
    {
        permissions.into_iter().any(|p| identity.has_permission(p))
    }

    pub fn has_all_permissions<'a, I>(&self, identity: &IdentityContext, permissions: I) -> bool
    where
        I: IntoIterator<Item = &'a Permission>,
    {
        permissions.into_iter().all(|p| identity.has_permission(p))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use warden_core::{AppId, Claims, ManualClock, TenantId};

    use super::*;
    use crate::abac::AbacEvaluator;
    use crate::condition::Condition;
    use crate::request::{DenialKind, Resource};
    use crate::subject::Subject;

    fn identity(tenant: &str, roles: &[&str]) -> IdentityContext {
        let subject = Subject::from_claims(&Claims::for_subject("alice", tenant, "portal")).unwrap();
        IdentityContext::bare(subject, AppId::new("portal"))
            .with_roles(roles.iter().copied())
            .with_permissions(["documents:read"])
    }

    fn rbac_engine() -> AuthorizationEngine {
        let table = Arc::new(RoleTable::new());
        table.grant(&TenantId::new("acme"), &Role::new("editor"), ["documents:*"]).unwrap();
        AuthorizationEngine::new(RbacEvaluator::new(table))
    }

    #[test]
    fn scope_is_checked_before_the_model() {
        let engine = rbac_engine();
        let alice = identity("acme", &["editor"]);

        let foreign = AuthorizationRequest::new(&alice, Resource::new("globex", "documents"), "read");
        let decision = engine.evaluate(&foreign).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.denial, Some(DenialKind::TenantMismatch));
        assert_eq!(decision.public_message(), "access denied");

        let other_app = AuthorizationRequest::new(&alice, Resource::new("acme", "documents").with_app("billing"), "read");
        assert_eq!(engine.evaluate(&other_app).unwrap().denial, Some(DenialKind::AppMismatch));

        let own = AuthorizationRequest::new(&alice, Resource::new("acme", "documents"), "read");
        assert!(engine.evaluate(&own).unwrap().allowed);
    }

    #[test]
    fn time_conditions_use_the_engine_clock() {
        let rule = AbacRule::new("office-hours", Condition::HourBetween { start: 9, end: 17 });
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()));
        let engine = AuthorizationEngine::new(AbacEvaluator::new(vec![rule])).with_clock(clock.clone());
        let alice = identity("acme", &[]);
        let request = AuthorizationRequest::new(&alice, Resource::new("acme", "documents"), "read");

        assert!(engine.evaluate(&request).unwrap().allowed);
        clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 22, 0, 0).unwrap());
        assert!(!engine.evaluate(&request).unwrap().allowed);
    }

    #[test]
    fn role_and_permission_helpers() {
        let engine = rbac_engine();
        let alice = identity("acme", &["editor", "viewer"]);
        let editor = Role::new("editor");
        let admin = Role::new("admin");

        assert!(engine.has_role(&alice, &editor));
        assert!(engine.has_any_role(&alice, [&admin, &editor]));
        assert!(!engine.has_all_roles(&alice, [&admin, &editor]));
        assert!(engine.has_all_roles(&alice, [] as [&Role; 0]));

        let read = Permission::new("documents:read");
        let write = Permission::new("documents:write");
        assert!(engine.has_permission(&alice, &read));
        assert!(engine.has_any_permission(&alice, [&write, &read]));
        assert!(!engine.has_all_permissions(&alice, [&write, &read]));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: AuthorizationConfig = serde_json::from_str(r#"{"combining_algorithm":"permit-overrides"}"#).unwrap();
        assert_eq!(config.combining_algorithm, CombiningAlgorithm::PermitOverrides);
        assert_eq!(config.owner_attribute, "owner_id");
    }
}
