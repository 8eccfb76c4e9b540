use std::sync::Arc;

use crate::error::AuthzError;
use crate::permissions::Permission;
use crate::request::{AuthorizationDecision, AuthorizationRequest, DenialKind};
use crate::roles::RoleTable;

pub const MODEL: &str = "rbac";

/// Allows when one of the identity's roles maps to a permission covering
/// `resource_type:action`. Only roles count; directly held permissions do
/// not.
#[derive(Debug, Clone)]
pub struct RbacEvaluator {
    table: Arc<RoleTable>,
}

impl RbacEvaluator {
    pub fn new(table: Arc<RoleTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<RoleTable> {
        &self.table
    }

    pub fn evaluate(&self, request: &AuthorizationRequest<'_>) -> Result<AuthorizationDecision, AuthzError> {
        let identity = request.identity;
        let required = Permission::for_action(&request.resource.resource_type, &request.action);

        match self
            .table
            .find_grant(&identity.tenant_id, identity.roles.iter(), &required)?
        {
            Some((role, granted)) => Ok(AuthorizationDecision::allow(
                MODEL,
                format!("role '{role}' grants '{granted}'"),
            )),
            None => Ok(AuthorizationDecision::deny(
                MODEL,
                DenialKind::MissingPermission,
                format!("no role grants '{required}'"),
            )),
        }
    }
}
