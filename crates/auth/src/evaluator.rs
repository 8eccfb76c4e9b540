use chrono::{DateTime, Utc};

use crate::abac::AbacEvaluator;
use crate::acl::AclEvaluator;
use crate::error::AuthzError;
use crate::hybrid::HybridEvaluator;
use crate::policy::PolicyEvaluator;
use crate::rbac::RbacEvaluator;
use crate::request::{AuthorizationDecision, AuthorizationRequest};

/// Every authorization model behind one contract.
#[derive(Debug, Clone)]
pub enum Evaluator {
    Rbac(RbacEvaluator),
    Abac(AbacEvaluator),
    Acl(AclEvaluator),
    Policy(PolicyEvaluator),
    Hybrid(HybridEvaluator),
}

impl Evaluator {
    pub fn name(&self) -> &'static str {
        match self {
            Evaluator::Rbac(_) => crate::rbac::MODEL,
            Evaluator::Abac(_) => crate::abac::MODEL,
            Evaluator::Acl(_) => crate::acl::MODEL,
            Evaluator::Policy(_) => crate::policy::MODEL,
            Evaluator::Hybrid(_) => crate::hybrid::MODEL,
        }
    }

    pub fn evaluate(
        &self,
        request: &AuthorizationRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationDecision, AuthzError> {
        match self {
            Evaluator::Rbac(e) => e.evaluate(request),
            Evaluator::Abac(e) => Ok(e.evaluate(request, now)),
            Evaluator::Acl(e) => e.evaluate(request),
            Evaluator::Policy(e) => e.evaluate(request),
            Evaluator::Hybrid(e) => e.evaluate(request, now),
        }
    }
}

impl From<RbacEvaluator> for Evaluator {
    fn from(value: RbacEvaluator) -> Self {
        Evaluator::Rbac(value)
    }
}

impl From<AbacEvaluator> for Evaluator {
    fn from(value: AbacEvaluator) -> Self {
        Evaluator::Abac(value)
    }
}

impl From<AclEvaluator> for Evaluator {
    fn from(value: AclEvaluator) -> Self {
        Evaluator::Acl(value)
    }
}

impl From<PolicyEvaluator> for Evaluator {
    fn from(value: PolicyEvaluator) -> Self {
        Evaluator::Policy(value)
    }
}

impl From<HybridEvaluator> for Evaluator {
    fn from(value: HybridEvaluator) -> Self {
        Evaluator::Hybrid(value)
    }
}
