use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::abac::AbacRule;
use crate::condition::Condition;
use crate::error::AuthzError;
use crate::evaluator::Evaluator;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind};

pub const MODEL: &str = "hybrid";

/// Default resource attribute naming the owner.
pub const DEFAULT_OWNER_ATTRIBUTE: &str = "owner_id";

fn default_owner_attribute() -> String {
    DEFAULT_OWNER_ATTRIBUTE.to_string()
}

fn default_owner_actions() -> Vec<String> {
    vec!["read".to_string()]
}

/// Fixed exceptions that may turn an inner deny into an allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideRule {
    /// The subject owns the resource (`resource.<owner_attribute>` equals the
    /// subject id) and the action is one of `actions`.
    ResourceOwner {
        #[serde(default = "default_owner_actions")]
        actions: Vec<String>,
        #[serde(default = "default_owner_attribute")]
        owner_attribute: String,
    },
    /// The action is one of `actions` and the current UTC hour lies in
    /// `[start, end)`.
    TimeWindow {
        #[serde(default = "default_owner_actions")]
        actions: Vec<String>,
        start: u32,
        end: u32,
    },
}

impl OverrideRule {
    /// Owners may read their own resources.
    pub fn owner_read() -> Self {
        Self::owner(DEFAULT_OWNER_ATTRIBUTE, ["read"])
    }

    pub fn owner<I, S>(owner_attribute: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OverrideRule::ResourceOwner {
            actions: actions.into_iter().map(Into::into).collect(),
            owner_attribute: owner_attribute.into(),
        }
    }

    fn permits(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> Option<String> {
        match self {
            OverrideRule::ResourceOwner {
                actions,
                owner_attribute,
            } => {
                if !actions.iter().any(|a| a == &request.action) {
                    return None;
                }
                let owner = request.resource.attributes.get(owner_attribute)?.as_str()?;
                (owner == request.identity.subject.id.as_str()).then(|| {
                    format!("subject owns the resource ({owner_attribute}), '{}' permitted", request.action)
                })
            }
            OverrideRule::TimeWindow { actions, start, end } => {
                if !actions.iter().any(|a| a == &request.action) {
                    return None;
                }
                let window = Condition::HourBetween { start: *start, end: *end };
                window
                    .evaluate(request, now)
                    .then(|| format!("'{}' permitted between {start}:00 and {end}:00 UTC", request.action))
            }
        }
    }
}

/// Inner model narrowed by ABAC constraints, with ownership overrides.
///
/// Inner allow: every applicable constraint must hold. Inner deny: stays a
/// deny unless an override rule permits the request.
#[derive(Debug, Clone)]
pub struct HybridEvaluator {
    inner: Box<Evaluator>,
    constraints: Vec<AbacRule>,
    overrides: Vec<OverrideRule>,
}

impl HybridEvaluator {
    pub fn new(inner: Evaluator) -> Self {
        Self {
            inner: Box::new(inner),
            constraints: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, rule: AbacRule) -> Self {
        self.constraints.push(rule);
        self
    }

    pub fn with_override(mut self, rule: OverrideRule) -> Self {
        self.overrides.push(rule);
        self
    }

    pub fn inner(&self) -> &Evaluator {
        &self.inner
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> Result<AuthorizationDecision, AuthzError> {
        let base = self.inner.evaluate(request, now)?;

        if base.allowed {
            let failed = self
                .constraints
                .iter()
                .find(|rule| rule.applies_to(request) && !rule.holds(request, now));
            return Ok(match failed {
                Some(rule) => AuthorizationDecision::deny(
                    MODEL,
                    DenialKind::ConditionFailed,
                    format!("{} allowed but constraint '{}' does not hold", base.model, rule.name),
                ),
                None => AuthorizationDecision::allow(MODEL, base.reason),
            });
        }

        for rule in &self.overrides {
            if let Some(reason) = rule.permits(request, now) {
                return Ok(AuthorizationDecision::allow(MODEL, format!("{} denied; override: {reason}", base.model)));
            }
        }
        Ok(base)
    }
}
