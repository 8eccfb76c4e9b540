//! Claims: the key/value payload identifying who a token represents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{AppId, SubjectId, TenantId};

/// Claim key carrying the subject identifier.
pub const SUBJECT_ID: &str = "subject_id";
/// Claim key carrying the tenant identifier.
pub const TENANT_ID: &str = "tenant_id";
/// Claim key carrying the application identifier.
pub const APP_ID: &str = "app_id";

/// Keys owned by the token encoding. Callers cannot set them.
pub const RESERVED_CLAIMS: &[&str] = &["jti", "iat", "exp", "iss", "aud", "token_kind"];

/// Unordered bag of claims.
///
/// Values are JSON scalars or arrays of scalars. A `Claims` value is a plain
/// value object: token issuance copies it, so later edits never reach a token
/// that was already produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims with the three mandatory keys populated.
    pub fn for_subject(
        subject_id: impl Into<String>,
        tenant_id: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self::new()
            .with(SUBJECT_ID, subject_id.into())
            .with(TENANT_ID, tenant_id.into())
            .with(APP_ID, app_id.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a claim; `None` for missing, non-string or blank values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        self.get_str(SUBJECT_ID).map(SubjectId::from)
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.get_str(TENANT_ID).map(TenantId::from)
    }

    pub fn app_id(&self) -> Option<AppId> {
        self.get_str(APP_ID).map(AppId::from)
    }

    /// Both scope claims are present and non-blank.
    pub fn has_scope(&self) -> bool {
        self.tenant_id().is_some() && self.app_id().is_some()
    }

    /// Keys that collide with the token encoding's own fields.
    pub fn reserved_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| RESERVED_CLAIMS.contains(k))
            .collect()
    }

    /// Keys whose value is neither a scalar nor an array of scalars.
    pub fn non_scalar_keys(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, v)| !is_scalar_or_scalar_array(v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Claims {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, Value)> for Claims {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn is_scalar_or_scalar_array(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_scalar),
        other => is_scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mandatory_accessors() {
        let claims = Claims::for_subject("alice", "acme", "portal").with("email", "a@acme.test");

        assert_eq!(claims.subject_id(), Some(SubjectId::new("alice")));
        assert_eq!(claims.tenant_id(), Some(TenantId::new("acme")));
        assert_eq!(claims.app_id(), Some(AppId::new("portal")));
        assert!(claims.has_scope());
        assert_eq!(claims.get_str("email"), Some("a@acme.test"));
    }

    #[test]
    fn blank_scope_is_not_scope() {
        let claims = Claims::for_subject("alice", "acme", "  ");
        assert!(claims.app_id().is_none());
        assert!(!claims.has_scope());
    }

    #[test]
    fn detects_reserved_and_nested_values() {
        let claims = Claims::for_subject("alice", "acme", "portal")
            .with("exp", 12)
            .with("scopes", json!(["read", "write"]))
            .with("profile", json!({"nested": true}))
            .with("matrix", json!([[1, 2]]));

        assert_eq!(claims.reserved_keys(), vec!["exp"]);
        assert_eq!(claims.non_scalar_keys(), vec!["matrix", "profile"]);
    }
}
