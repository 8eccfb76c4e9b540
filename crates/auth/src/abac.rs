use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind};

pub const MODEL: &str = "abac";

/// Named condition scoped to some actions and resource types.
///
/// Empty `actions`/`resource_types` (or a `*` entry) apply to everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbacRule {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resource_types: Vec<String>,
    pub condition: Condition,
}

impl AbacRule {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            resource_types: Vec::new(),
            condition,
        }
    }

    pub fn for_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn applies_to(&self, request: &AuthorizationRequest<'_>) -> bool {
        scoped(&self.actions, &request.action)
            && scoped(&self.resource_types, &request.resource.resource_type)
    }

    pub fn holds(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> bool {
        self.condition.evaluate(request, now)
    }
}

fn scoped(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|v| v == "*" || v == value)
}

/// Allows when any applicable rule holds. No such rule means no opinion,
/// reported as a deny.
#[derive(Debug, Clone, Default)]
pub struct AbacEvaluator {
    rules: Vec<AbacRule>,
}

impl AbacEvaluator {
    pub fn new(rules: Vec<AbacRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[AbacRule] {
        &self.rules
    }

    /// The first applicable rule that holds, if any.
    pub fn opinion(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> Option<&AbacRule> {
        self.rules
            .iter()
            .find(|r| r.applies_to(request) && r.holds(request, now))
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> AuthorizationDecision {
        match self.opinion(request, now) {
            Some(rule) => AuthorizationDecision::allow(MODEL, format!("rule '{}' holds", rule.name)),
            None => AuthorizationDecision::deny(
                MODEL,
                DenialKind::NoMatchingRule,
                format!(
                    "no rule permits '{}' on '{}'",
                    request.action, request.resource.resource_type
                ),
            ),
        }
    }
}
