use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Separator between permission segments (`resource:action`).
pub const SEGMENT_SEPARATOR: char = ':';

/// Permission identifier, e.g. `documents:read`.
///
/// A permission doubles as a pattern: `*` alone matches everything, a `*`
/// segment matches any value in that position, and a trailing `*` segment
/// matches the rest (`documents:*` covers `documents:read` and
/// `documents:comments:write`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The permission needed to perform `action` on `resource_type`.
    pub fn for_action(resource_type: &str, action: &str) -> Self {
        Self::new(format!("{resource_type}{SEGMENT_SEPARATOR}{action}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether this permission, read as a pattern, covers `required`.
    pub fn matches(&self, required: &Permission) -> bool {
        if self.is_wildcard() {
            return true;
        }

        let pattern: Vec<&str> = self.as_str().split(SEGMENT_SEPARATOR).collect();
        let target: Vec<&str> = required.as_str().split(SEGMENT_SEPARATOR).collect();
        let last = pattern.len() - 1;

        for (i, segment) in pattern.iter().enumerate() {
            if i == last && *segment == "*" {
                return target.len() > i;
            }
            match target.get(i) {
                Some(t) if *segment == "*" || segment == t => {}
                _ => return false,
            }
        }
        pattern.len() == target.len()
    }

    /// Shorthand for `matches(&Permission::for_action(resource_type, action))`.
    pub fn grants(&self, resource_type: &str, action: &str) -> bool {
        self.matches(&Permission::for_action(resource_type, action))
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
