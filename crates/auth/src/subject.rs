//! The authenticated party behind a request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::claims::{APP_ID, SUBJECT_ID, TENANT_ID};
use warden_core::{AppId, Claims, SubjectId, TenantId, TokenId};

use crate::error::IdentityError;

/// Claim naming the subject type (`user` or `service`).
pub const SUBJECT_TYPE: &str = "subject_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    #[default]
    User,
    Service,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Service => "service",
        }
    }
}

impl core::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SubjectType {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(SubjectType::User),
            "service" => Ok(SubjectType::Service),
            other => Err(IdentityError::InvalidSubjectType(other.to_string())),
        }
    }
}

/// Who a verified token represents. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub tenant_id: TenantId,
    pub subject_type: SubjectType,
    /// Human-facing name (email, service name); defaults to the id.
    pub principal: String,
    /// Remaining claims, `app_id` included.
    pub attributes: BTreeMap<String, Value>,
}

impl Subject {
    pub fn from_claims(claims: &Claims) -> Result<Self, IdentityError> {
        let id = claims.subject_id().ok_or(IdentityError::MissingSubject)?;
        let tenant_id = claims.tenant_id().ok_or(IdentityError::MissingTenant)?;
        let subject_type = match claims.get_str(SUBJECT_TYPE) {
            Some(raw) => raw.parse()?,
            None => SubjectType::default(),
        };
        let principal = claims
            .get_str("principal")
            .or_else(|| claims.get_str("email"))
            .unwrap_or(id.as_str())
            .to_string();

        let attributes = claims
            .iter()
            .filter(|(k, _)| k.as_str() != SUBJECT_ID && k.as_str() != TENANT_ID)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            id,
            tenant_id,
            subject_type,
            principal,
            attributes,
        })
    }

    /// App scope carried through from the claims.
    pub fn app_id(&self) -> Option<AppId> {
        self.attributes
            .get(APP_ID)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(AppId::from)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// `user:<id>` or `service:<id>`.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.subject_type, self.id)
    }
}

/// The verified token a context was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_claims_with_defaults() {
        let claims = Claims::for_subject("alice", "acme", "portal").with("department", "legal");
        let subject = Subject::from_claims(&claims).unwrap();

        assert_eq!(subject.id, SubjectId::new("alice"));
        assert_eq!(subject.subject_type, SubjectType::User);
        assert_eq!(subject.principal, "alice");
        assert_eq!(subject.app_id(), Some(AppId::new("portal")));
        assert_eq!(subject.attribute("department"), Some(&Value::from("legal")));
        assert!(subject.attribute(SUBJECT_ID).is_none());
        assert_eq!(subject.qualified_id(), "user:alice");
    }

    #[test]
    fn service_principal_from_claims() {
        let claims = Claims::for_subject("svc-billing", "acme", "portal")
            .with(SUBJECT_TYPE, "service")
            .with("email", "billing@acme.test");
        let subject = Subject::from_claims(&claims).unwrap();
        assert_eq!(subject.subject_type, SubjectType::Service);
        assert_eq!(subject.principal, "billing@acme.test");
    }

    #[test]
    fn rejects_missing_subject_and_unknown_type() {
        let no_subject = Claims::new().with(TENANT_ID, "acme");
        assert_eq!(Subject::from_claims(&no_subject), Err(IdentityError::MissingSubject));

        let robot = Claims::for_subject("r2", "acme", "portal").with(SUBJECT_TYPE, "robot");
        assert!(matches!(
            Subject::from_claims(&robot),
            Err(IdentityError::InvalidSubjectType(_))
        ));
    }
}
