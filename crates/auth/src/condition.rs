//! Attribute paths and declarative conditions over an authorization request.
//!
//! Paths:
//! - `action`
//! - `subject.id`, `subject.tenant_id`, `subject.app_id`, `subject.type`,
//!   `subject.principal`, `subject.roles`, `subject.permissions`,
//!   `subject.groups`, otherwise a claim attribute, then a profile field
//! - `resource.type`, `resource.id`, `resource.tenant_id`, `resource.app_id`,
//!   otherwise a resource attribute
//! - `context.<key>`
//!
//! Further dotted segments descend into JSON objects.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::AuthorizationRequest;

/// Look up an attribute path. `None` when the path does not resolve.
pub fn resolve<'r>(request: &'r AuthorizationRequest<'_>, path: &str) -> Option<Cow<'r, Value>> {
    let (root, rest) = match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    };

    match (root, rest) {
        ("action", None) => Some(Cow::Owned(Value::from(request.action.as_str()))),
        ("subject", Some(rest)) => resolve_subject(request, rest),
        ("resource", Some(rest)) => resolve_resource(request, rest),
        ("context", Some(rest)) => {
            let (key, tail) = split(rest);
            descend(request.context.get(key)?, tail)
        }
        _ => None,
    }
}

fn split(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    }
}

fn descend<'r>(value: &'r Value, tail: Option<&str>) -> Option<Cow<'r, Value>> {
    let Some(tail) = tail else {
        return Some(Cow::Borrowed(value));
    };
    let mut current = value;
    for segment in tail.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(Cow::Borrowed(current))
}

fn owned<'r>(value: impl Into<Value>) -> Option<Cow<'r, Value>> {
    Some(Cow::Owned(value.into()))
}

fn resolve_subject<'r>(request: &'r AuthorizationRequest<'_>, path: &str) -> Option<Cow<'r, Value>> {
    let identity = request.identity;
    let (key, tail) = split(path);
    match (key, tail) {
        ("id", None) => owned(identity.subject.id.as_str()),
        ("tenant_id", None) => owned(identity.tenant_id.as_str()),
        ("app_id", None) => owned(identity.app_id.as_str()),
        ("type", None) => owned(identity.subject.subject_type.as_str()),
        ("principal", None) => owned(identity.subject.principal.as_str()),
        ("roles", None) => owned(identity.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
        ("permissions", None) => owned(
            identity
                .permissions
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>(),
        ),
        ("groups", None) => owned(identity.groups.iter().cloned().collect::<Vec<_>>()),
        _ => {
            let value = identity
                .subject
                .attributes
                .get(key)
                .or_else(|| identity.profile.get(key))?;
            descend(value, tail)
        }
    }
}

fn resolve_resource<'r>(request: &'r AuthorizationRequest<'_>, path: &str) -> Option<Cow<'r, Value>> {
    let resource = &request.resource;
    let (key, tail) = split(path);
    match (key, tail) {
        ("type", None) => owned(resource.resource_type.as_str()),
        ("id", None) => resource.id.as_deref().and_then(|id| owned(id)),
        ("tenant_id", None) => owned(resource.tenant_id.as_str()),
        ("app_id", None) => resource.app_id.as_ref().and_then(|a| owned(a.as_str())),
        _ => descend(resource.attributes.get(key)?, tail),
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Attribute { attribute: String },
    Literal(Value),
}

impl Operand {
    pub fn attribute(path: impl Into<String>) -> Self {
        Operand::Attribute {
            attribute: path.into(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    fn resolve<'r>(&'r self, request: &'r AuthorizationRequest<'_>) -> Option<Cow<'r, Value>> {
        match self {
            Operand::Attribute { attribute } => resolve(request, attribute),
            Operand::Literal(value) => Some(Cow::Borrowed(value)),
        }
    }
}

/// Declarative predicate over request attributes.
///
/// Missing attributes make comparisons false, including `not_equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals { left: Operand, right: Operand },
    NotEquals { left: Operand, right: Operand },
    /// `value` (or any element of it, if an array) is contained in `set`.
    In { value: Operand, set: Operand },
    Exists { attribute: String },
    GreaterThan { left: Operand, right: Operand },
    LessThan { left: Operand, right: Operand },
    /// Current UTC hour in `[start, end)`; wraps past midnight when `start > end`.
    HourBetween { start: u32, end: u32 },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn equals(left: Operand, right: Operand) -> Self {
        Condition::Equals { left, right }
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>, now: DateTime<Utc>) -> bool {
        match self {
            Condition::Equals { left, right } => both(request, left, right, |a, b| a == b),
            Condition::NotEquals { left, right } => both(request, left, right, |a, b| a != b),
            Condition::In { value, set } => both(request, value, set, contains),
            Condition::Exists { attribute } => {
                resolve(request, attribute).is_some_and(|v| !v.is_null())
            }
            Condition::GreaterThan { left, right } => {
                both(request, left, right, |a, b| compare(a, b) == Some(Ordering::Greater))
            }
            Condition::LessThan { left, right } => {
                both(request, left, right, |a, b| compare(a, b) == Some(Ordering::Less))
            }
            Condition::HourBetween { start, end } => {
                let hour = now.hour();
                if start <= end {
                    *start <= hour && hour < *end
                } else {
                    hour >= *start || hour < *end
                }
            }
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(request, now)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(request, now)),
            Condition::Not { condition } => !condition.evaluate(request, now),
        }
    }
}

fn both<F>(request: &AuthorizationRequest<'_>, left: &Operand, right: &Operand, f: F) -> bool
where
    F: Fn(&Value, &Value) -> bool,
{
    match (left.resolve(request), right.resolve(request)) {
        (Some(a), Some(b)) => f(&*a, &*b),
        _ => false,
    }
}

/// Membership test used by `In` and policy conditions.
pub(crate) fn contains(value: &Value, set: &Value) -> bool {
    let Some(items) = set.as_array() else {
        return false;
    };
    match value {
        Value::Array(values) => values.iter().any(|v| items.contains(v)),
        single => items.contains(single),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use warden_core::{AppId, Claims};

    use super::*;
    use crate::identity::IdentityContext;
    use crate::request::Resource;
    use crate::subject::Subject;

    fn identity() -> IdentityContext {
        let claims = Claims::for_subject("alice", "acme", "portal")
            .with("department", "legal")
            .with("clearance", 3);
        let mut identity = IdentityContext::bare(Subject::from_claims(&claims).unwrap(), AppId::new("portal"))
            .with_roles(["editor"])
            .with_groups(["legal-team"]);
        identity.profile.insert("manager".into(), json!({"id": "carol"}));
        identity
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap()
    }

    #[test]
    fn resolves_every_root() {
        let identity = identity();
        let resource = Resource::new("acme", "documents")
            .with_id("d1")
            .with_attribute("owner_id", "alice")
            .with_attribute("meta", json!({"level": 2}));
        let request = AuthorizationRequest::new(&identity, resource, "read").with_context("ip", "10.0.0.1");

        assert_eq!(resolve(&request, "action").unwrap().as_ref(), &json!("read"));
        assert_eq!(resolve(&request, "subject.id").unwrap().as_ref(), &json!("alice"));
        assert_eq!(resolve(&request, "subject.department").unwrap().as_ref(), &json!("legal"));
        assert_eq!(resolve(&request, "subject.manager.id").unwrap().as_ref(), &json!("carol"));
        assert_eq!(resolve(&request, "subject.roles").unwrap().as_ref(), &json!(["editor"]));
        assert_eq!(resolve(&request, "resource.owner_id").unwrap().as_ref(), &json!("alice"));
        assert_eq!(resolve(&request, "resource.meta.level").unwrap().as_ref(), &json!(2));
        assert_eq!(resolve(&request, "context.ip").unwrap().as_ref(), &json!("10.0.0.1"));
        assert!(resolve(&request, "resource.missing").is_none());
        assert!(resolve(&request, "elsewhere.x").is_none());
    }

    #[test]
    fn comparisons_fail_closed_on_missing_attributes() {
        let identity = identity();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        let now = at_hour(12);

        let ne = Condition::NotEquals {
            left: Operand::attribute("resource.owner_id"),
            right: Operand::literal("bob"),
        };
        assert!(!ne.evaluate(&request, now));

        let gt = Condition::GreaterThan {
            left: Operand::attribute("subject.clearance"),
            right: Operand::literal(2),
        };
        assert!(gt.evaluate(&request, now));
    }

    #[test]
    fn hour_window_wraps_midnight() {
        let identity = identity();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        let night = Condition::HourBetween { start: 22, end: 6 };

        assert!(night.evaluate(&request, at_hour(23)));
        assert!(night.evaluate(&request, at_hour(3)));
        assert!(!night.evaluate(&request, at_hour(12)));
    }

    #[test]
    fn deserializes_from_json() {
        let condition: Condition = serde_json::from_value(json!({
            "op": "all",
            "conditions": [
                {"op": "in", "value": {"attribute": "subject.groups"}, "set": ["legal-team", "exec"]},
                {"op": "not", "condition": {"op": "exists", "attribute": "context.impersonating"}},
                {"op": "equals", "left": {"attribute": "action"}, "right": "read"}
            ]
        }))
        .unwrap();

        let identity = identity();
        let request = AuthorizationRequest::new(&identity, Resource::new("acme", "documents"), "read");
        assert!(condition.evaluate(&request, at_hour(9)));
    }
}
