//! `warden-auth`: identity resolution and authorization decisions.
//!
//! Builds an [`IdentityContext`] from verified claims through pluggable
//! providers, then decides requests with one of the authorization models
//! (RBAC, ABAC, ACL, policy or hybrid). Storage and transport stay outside
//! this crate.

pub mod abac;
pub mod acl;
pub mod builder;
pub mod cache;
pub mod condition;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod hybrid;
pub mod identity;
pub mod permissions;
pub mod pipeline;
pub mod policy;
pub mod providers;
pub mod rbac;
pub mod request;
pub mod roles;
pub mod subject;

pub use abac::{AbacEvaluator, AbacRule};
pub use acl::{AclEntry, AclEvaluator, AclStore};
pub use builder::IdentityContextBuilder;
pub use cache::IdentityCache;
pub use condition::{Condition, Operand};
pub use engine::{AuthorizationConfig, AuthorizationEngine};
pub use error::{AuthzError, IdentityError, ProviderError};
pub use evaluator::Evaluator;
pub use hybrid::{HybridEvaluator, OverrideRule};
pub use identity::IdentityContext;
pub use permissions::Permission;
pub use pipeline::{AuthorizationPipeline, Check, RequireAnyRole, RequirePermission, TenantScope};
pub use policy::{CombiningAlgorithm, Effect, Policy, PolicyEvaluator, PolicyStore};
pub use providers::{
    GroupProvider, PermissionProvider, ProfileProvider, RoleDerivedPermissionProvider, RoleProvider,
    StaticGroupProvider, StaticPermissionProvider, StaticProfileProvider, StaticRoleProvider,
};
pub use rbac::RbacEvaluator;
pub use request::{ACCESS_DENIED, AuthorizationDecision, AuthorizationRequest, DenialKind, Resource};
pub use roles::{Role, RoleTable};
pub use subject::{Session, Subject, SubjectType};
