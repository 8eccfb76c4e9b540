//! Policy-based authorization with combining algorithms.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::{AppId, TenantId};

use crate::condition::{contains, resolve};
use crate::error::AuthzError;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind};

pub const MODEL: &str = "policy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// How several matching policies resolve into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningAlgorithm {
    /// Any matching deny wins.
    #[default]
    DenyOverrides,
    /// Any matching allow wins.
    PermitOverrides,
    /// Highest priority wins; ties go to the earliest created.
    FirstApplicable,
    /// More than one match is indeterminate (deny).
    OnlyOneApplicable,
}

impl CombiningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombiningAlgorithm::DenyOverrides => "deny-overrides",
            CombiningAlgorithm::PermitOverrides => "permit-overrides",
            CombiningAlgorithm::FirstApplicable => "first-applicable",
            CombiningAlgorithm::OnlyOneApplicable => "only-one-applicable",
        }
    }
}

impl core::str::FromStr for CombiningAlgorithm {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "deny-overrides" => Ok(Self::DenyOverrides),
            "permit-overrides" => Ok(Self::PermitOverrides),
            "first-applicable" => Ok(Self::FirstApplicable),
            "only-one-applicable" => Ok(Self::OnlyOneApplicable),
            other => Err(AuthzError::InvalidPolicy(format!(
                "unknown combining algorithm '{other}'"
            ))),
        }
    }
}

/// Administrator-defined rule.
///
/// `subjects` patterns match the subject id, `user:<id>`/`service:<id>`,
/// `role:<role>` and `group:<group>`; `resources` patterns match `<type>`
/// and `<type>:<id>`; `actions` patterns match the action. Patterns are
/// globs. Each condition maps an attribute path to an expected value: a
/// string starting with `$` names another path, an array means membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub app_id: Option<AppId>,
    pub effect: Effect,
    pub subjects: Vec<String>,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
    #[serde(default)]
    pub conditions: BTreeMap<String, Value>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Policy {
    pub fn new(id: impl Into<String>, tenant_id: impl Into<TenantId>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            app_id: None,
            effect,
            subjects: Vec::new(),
            resources: Vec::new(),
            actions: Vec::new(),
            conditions: BTreeMap::new(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn allow(id: impl Into<String>, tenant_id: impl Into<TenantId>) -> Self {
        Self::new(id, tenant_id, Effect::Allow)
    }

    pub fn deny(id: impl Into<String>, tenant_id: impl Into<TenantId>) -> Self {
        Self::new(id, tenant_id, Effect::Deny)
    }

    pub fn for_app(mut self, app_id: impl Into<AppId>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn subjects<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
        self.subjects.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn resources<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
        self.resources.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn actions<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
        self.actions.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn when(mut self, path: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.conditions.insert(path.into(), expected.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

#[derive(Debug)]
struct Compiled {
    policy: Policy,
    subjects: GlobSet,
    resources: GlobSet,
    actions: GlobSet,
    seq: u64,
}

fn compile(policy_id: &str, field: &str, patterns: &[String]) -> Result<GlobSet, AuthzError> {
    if patterns.is_empty() {
        return Err(AuthzError::InvalidPolicy(format!(
            "policy '{policy_id}' has no {field} patterns"
        )));
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            AuthzError::InvalidPolicy(format!("policy '{policy_id}' {field} pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AuthzError::InvalidPolicy(format!("policy '{policy_id}': {e}")))
}

#[derive(Debug, Default)]
struct Inner {
    by_tenant: HashMap<TenantId, Vec<Compiled>>,
    next_seq: u64,
}

/// Tenant-scoped policy store. Patterns are validated and compiled on insert.
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<Inner>,
}

/// A matching policy with its insertion order.
#[derive(Debug, Clone)]
struct Matched {
    policy: Policy,
    seq: u64,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace (by id within the tenant) a policy.
    pub fn insert(&self, policy: Policy) -> Result<(), AuthzError> {
        if policy.id.trim().is_empty() {
            return Err(AuthzError::InvalidPolicy("policy id is empty".to_string()));
        }
        let subjects = compile(&policy.id, "subject", &policy.subjects)?;
        let resources = compile(&policy.id, "resource", &policy.resources)?;
        let actions = compile(&policy.id, "action", &policy.actions)?;

        let mut inner = self.inner.write().map_err(|_| AuthzError::poisoned("policy store"))?;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let policies = inner.by_tenant.entry(policy.tenant_id.clone()).or_default();
        policies.retain(|c| c.policy.id != policy.id);
        tracing::debug!(policy_id = %policy.id, tenant_id = %policy.tenant_id, effect = ?policy.effect, "policy stored");
        policies.push(Compiled {
            policy,
            subjects,
            resources,
            actions,
            seq,
        });
        Ok(())
    }

    pub fn remove(&self, tenant_id: &TenantId, id: &str) -> Result<bool, AuthzError> {
        let mut inner = self.inner.write().map_err(|_| AuthzError::poisoned("policy store"))?;
        let Some(policies) = inner.by_tenant.get_mut(tenant_id) else {
            return Ok(false);
        };
        let before = policies.len();
        policies.retain(|c| c.policy.id != id);
        Ok(policies.len() != before)
    }

    pub fn get(&self, tenant_id: &TenantId, id: &str) -> Result<Option<Policy>, AuthzError> {
        let inner = self.inner.read().map_err(|_| AuthzError::poisoned("policy store"))?;
        Ok(inner
            .by_tenant
            .get(tenant_id)
            .and_then(|ps| ps.iter().find(|c| c.policy.id == id))
            .map(|c| c.policy.clone()))
    }

    pub fn list(&self, tenant_id: &TenantId) -> Result<Vec<Policy>, AuthzError> {
        let inner = self.inner.read().map_err(|_| AuthzError::poisoned("policy store"))?;
        Ok(inner
            .by_tenant
            .get(tenant_id)
            .map(|ps| ps.iter().map(|c| c.policy.clone()).collect())
            .unwrap_or_default())
    }

    fn matching(&self, request: &AuthorizationRequest<'_>) -> Result<Vec<Matched>, AuthzError> {
        let inner = self.inner.read().map_err(|_| AuthzError::poisoned("policy store"))?;
        let identity = request.identity;
        let Some(policies) = inner.by_tenant.get(&identity.tenant_id) else {
            return Ok(Vec::new());
        };

        let subject_keys = subject_keys(request);
        let resource_keys = resource_keys(request);

        Ok(policies
            .iter()
            .filter(|c| c.policy.app_id.as_ref().is_none_or(|app| *app == identity.app_id))
            .filter(|c| subject_keys.iter().any(|k| c.subjects.is_match(k)))
            .filter(|c| resource_keys.iter().any(|k| c.resources.is_match(k)))
            .filter(|c| c.actions.is_match(&request.action))
            .filter(|c| conditions_hold(&c.policy.conditions, request))
            .map(|c| Matched {
                policy: c.policy.clone(),
                seq: c.seq,
            })
            .collect())
    }
}

fn subject_keys(request: &AuthorizationRequest<'_>) -> Vec<String> {
    let identity = request.identity;
    let mut keys = vec![identity.subject.id.to_string(), identity.subject.qualified_id()];
    keys.extend(identity.roles.iter().map(|r| format!("role:{r}")));
    keys.extend(identity.groups.iter().map(|g| format!("group:{g}")));
    keys
}

fn resource_keys(request: &AuthorizationRequest<'_>) -> Vec<String> {
    let resource = &request.resource;
    let mut keys = vec![resource.resource_type.clone()];
    if let Some(id) = &resource.id {
        keys.push(format!("{}:{}", resource.resource_type, id));
    }
    keys
}

fn conditions_hold(conditions: &BTreeMap<String, Value>, request: &AuthorizationRequest<'_>) -> bool {
    conditions.iter().all(|(path, expected)| {
        let Some(actual) = resolve(request, path) else {
            return false;
        };
        match expected {
            Value::String(s) if s.starts_with('$') => {
                resolve(request, &s[1..]).is_some_and(|other| *actual == *other)
            }
            Value::Array(_) => contains(&actual, expected),
            literal => *actual == *literal,
        }
    })
}

/// Evaluates the tenant's policies and combines the matches.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    store: Arc<PolicyStore>,
    algorithm: CombiningAlgorithm,
}

impl PolicyEvaluator {
    pub fn new(store: Arc<PolicyStore>, algorithm: CombiningAlgorithm) -> Self {
        Self { store, algorithm }
    }

    pub fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let matched = self.store.matching(request)?;
        Ok(combine(self.algorithm, matched))
    }
}

fn decide(policy: &Policy, algorithm: CombiningAlgorithm) -> AuthorizationDecision {
    match policy.effect {
        Effect::Allow => AuthorizationDecision::allow(
            MODEL,
            format!("policy '{}' allows ({})", policy.id, algorithm.as_str()),
        ),
        Effect::Deny => AuthorizationDecision::deny(
            MODEL,
            DenialKind::PolicyDenied,
            format!("policy '{}' denies ({})", policy.id, algorithm.as_str()),
        ),
    }
}

fn combine(algorithm: CombiningAlgorithm, mut matched: Vec<Matched>) -> AuthorizationDecision {
    if matched.is_empty() {
        return AuthorizationDecision::deny(MODEL, DenialKind::NoMatchingPolicy, "no policy matches");
    }

    let decision = match algorithm {
        CombiningAlgorithm::DenyOverrides => first_with(&matched, Effect::Deny)
            .or_else(|| first_with(&matched, Effect::Allow))
            .map(|m| decide(&m.policy, algorithm)),
        CombiningAlgorithm::PermitOverrides => first_with(&matched, Effect::Allow)
            .or_else(|| first_with(&matched, Effect::Deny))
            .map(|m| decide(&m.policy, algorithm)),
        CombiningAlgorithm::FirstApplicable => {
            matched.sort_by(|a, b| {
                b.policy
                    .priority
                    .cmp(&a.policy.priority)
                    .then(a.policy.created_at.cmp(&b.policy.created_at))
                    .then(a.seq.cmp(&b.seq))
            });
            matched.first().map(|m| decide(&m.policy, algorithm))
        }
        CombiningAlgorithm::OnlyOneApplicable => match matched.as_slice() {
            [only] => Some(decide(&only.policy, algorithm)),
            many => Some(AuthorizationDecision::deny(
                MODEL,
                DenialKind::Indeterminate,
                format!(
                    "{} policies apply: {}",
                    many.len(),
                    many.iter()
                        .map(|m| m.policy.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        },
    };

    decision.unwrap_or_else(|| {
        AuthorizationDecision::deny(MODEL, DenialKind::NoMatchingPolicy, "no policy matches")
    })
}

fn first_with(matched: &[Matched], effect: Effect) -> Option<&Matched> {
    matched.iter().find(|m| m.policy.effect == effect)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;
    use warden_core::Claims;

    use super::*;
    use crate::identity::IdentityContext;
    use crate::request::Resource;
    use crate::subject::Subject;

    fn alice() -> IdentityContext {
        let subject = Subject::from_claims(&Claims::for_subject("alice", "acme", "portal").with("department", "legal")).unwrap();
        IdentityContext::bare(subject, AppId::new("portal"))
            .with_roles(["editor"])
            .with_groups(["legal-team"])
    }

    fn evaluate(store: &Arc<PolicyStore>, algorithm: CombiningAlgorithm, request: &AuthorizationRequest<'_>) -> AuthorizationDecision {
        PolicyEvaluator::new(Arc::clone(store), algorithm).evaluate(request).unwrap()
    }

    fn allow_and_deny() -> Arc<PolicyStore> {
        let store = Arc::new(PolicyStore::new());
        store
            .insert(Policy::allow("editors-read", "acme").subjects(["role:editor"]).resources(["documents"]).actions(["read"]))
            .unwrap();
        store
            .insert(Policy::deny("no-legal", "acme").subjects(["group:legal-*"]).resources(["documents:*"]).actions(["*"]))
            .unwrap();
        store
    }

    #[test]
    fn deny_overrides_prefers_deny() {
        let identity = alice();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents").with_id("d1"), "read");
        let decision = evaluate(&allow_and_deny(), CombiningAlgorithm::DenyOverrides, &request);
        assert!(!decision.allowed);
        assert_eq!(decision.denial, Some(DenialKind::PolicyDenied));
    }

    #[test]
    fn permit_overrides_prefers_allow() {
        let identity = alice();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents").with_id("d1"), "read");
        let decision = evaluate(&allow_and_deny(), CombiningAlgorithm::PermitOverrides, &request);
        assert!(decision.allowed);
    }

    #[test]
    fn only_one_applicable_is_indeterminate_on_overlap() {
        let identity = alice();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents").with_id("d1"), "read");
        let decision = evaluate(&allow_and_deny(), CombiningAlgorithm::OnlyOneApplicable, &request);
        assert_eq!(decision.denial, Some(DenialKind::Indeterminate));

        // Without an instance id only the allow policy applies.
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        assert!(evaluate(&allow_and_deny(), CombiningAlgorithm::OnlyOneApplicable, &request).allowed);
    }

    #[test]
    fn first_applicable_uses_priority_then_age() {
        let store = Arc::new(PolicyStore::new());
        let t0 = Utc::now();
        store
            .insert(Policy::deny("old-deny", "acme").subjects(["*"]).resources(["*"]).actions(["*"]).priority(5).created_at(t0))
            .unwrap();
        store
            .insert(Policy::allow("new-allow", "acme").subjects(["*"]).resources(["*"]).actions(["*"]).priority(5).created_at(t0 + Duration::seconds(1)))
            .unwrap();
        store
            .insert(Policy::allow("low", "acme").subjects(["*"]).resources(["*"]).actions(["*"]).priority(1))
            .unwrap();

        let identity = alice();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        let decision = evaluate(&store, CombiningAlgorithm::FirstApplicable, &request);
        assert!(!decision.allowed);
        assert!(decision.reason.contains("old-deny"));
    }

    #[test]
    fn no_match_fails_closed_and_tenants_are_isolated() {
        let store = Arc::new(PolicyStore::new());
        store
            .insert(Policy::allow("globex-all", "globex").subjects(["*"]).resources(["*"]).actions(["*"]))
            .unwrap();

        let identity = alice();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        let decision = evaluate(&store, CombiningAlgorithm::PermitOverrides, &request);
        assert_eq!(decision.denial, Some(DenialKind::NoMatchingPolicy));
    }

    #[test]
    fn conditions_support_references_and_membership() {
        let store = Arc::new(PolicyStore::new());
        store
            .insert(
                Policy::allow("owner-edit", "acme")
                    .subjects(["user:*"])
                    .resources(["documents:*"])
                    .actions(["write"])
                    .when("resource.owner_id", "$subject.id")
                    .when("subject.department", json!(["legal", "finance"])),
            )
            .unwrap();

        let identity = alice();
        let owned = Resource::new("acme", "documents").with_id("d1").with_attribute("owner_id", "alice");
        let foreign = Resource::new("acme", "documents").with_id("d2").with_attribute("owner_id", "bob");

        let request = AuthorizationRequest::new(&identity, owned, "write");
        assert!(evaluate(&store, CombiningAlgorithm::DenyOverrides, &request).allowed);
        let request = AuthorizationRequest::new(&identity, foreign, "write");
        assert!(!evaluate(&store, CombiningAlgorithm::DenyOverrides, &request).allowed);
    }

    #[test]
    fn insert_validates_patterns() {
        let store = PolicyStore::new();
        let bad_glob = Policy::allow("broken", "acme").subjects(["[unclosed"]).resources(["*"]).actions(["*"]);
        assert!(matches!(store.insert(bad_glob), Err(AuthzError::InvalidPolicy(_))));

        let empty = Policy::allow("empty", "acme").resources(["*"]).actions(["*"]);
        assert!(matches!(store.insert(empty), Err(AuthzError::InvalidPolicy(_))));
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("deny-overrides".parse::<CombiningAlgorithm>().unwrap(), CombiningAlgorithm::DenyOverrides);
        assert_eq!("first_applicable".parse::<CombiningAlgorithm>().unwrap(), CombiningAlgorithm::FirstApplicable);
        assert!("coin-flip".parse::<CombiningAlgorithm>().is_err());
    }
}
