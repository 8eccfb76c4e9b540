use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use warden_auth::{
    ACCESS_DENIED, AuthorizationDecision, AuthorizationEngine, AuthorizationPipeline, AuthorizationRequest,
    IdentityContext, IdentityContextBuilder, IdentityError, Resource, Session, Subject, TenantScope,
};
use warden_core::RequestContext;
use warden_tokens::{TokenKind, TokenManager, VerificationFailure};

use crate::bearer::extract_bearer;
use crate::error::GuardError;

/// Message returned for every authentication denial.
pub const UNAUTHENTICATED: &str = "authentication required";

/// What the caller wants to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub resource: Resource,
    pub action: String,
    pub context: BTreeMap<String, Value>,
}

impl Target {
    pub fn new(resource: Resource, action: impl Into<String>) -> Self {
        Self {
            resource,
            action: action.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialStage {
    Authentication,
    Authorization,
}

/// A refused request. `reason` is internal; show `public_message()` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub stage: DenialStage,
    pub reason: String,
    /// Set when the token itself failed verification.
    pub token_failure: Option<VerificationFailure>,
}

impl Denial {
    fn authentication(reason: impl Into<String>, token_failure: Option<VerificationFailure>) -> Self {
        Self {
            stage: DenialStage::Authentication,
            reason: reason.into(),
            token_failure,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self.stage {
            DenialStage::Authentication => UNAUTHENTICATED,
            DenialStage::Authorization => ACCESS_DENIED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Authorized {
    pub identity: IdentityContext,
    pub decision: AuthorizationDecision,
}

#[derive(Debug, Clone)]
pub enum GuardOutcome {
    Allowed(Box<Authorized>),
    Denied(Denial),
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allowed(_))
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            GuardOutcome::Denied(denial) => Some(denial),
            GuardOutcome::Allowed(_) => None,
        }
    }
}

/// Verify token, build identity, authorize. In that order, stopping at the
/// first denial.
#[derive(Clone)]
pub struct Guard {
    tokens: Arc<TokenManager>,
    identities: IdentityContextBuilder,
    pipeline: AuthorizationPipeline,
}

impl core::fmt::Debug for Guard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Guard")
            .field("token_type", &self.tokens.token_type())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Guard {
    pub fn new(tokens: Arc<TokenManager>, identities: IdentityContextBuilder, pipeline: AuthorizationPipeline) -> Self {
        Self {
            tokens,
            identities,
            pipeline,
        }
    }

    /// Tenant scoping followed by `engine`.
    pub fn with_engine(tokens: Arc<TokenManager>, identities: IdentityContextBuilder, engine: AuthorizationEngine) -> Self {
        Self::new(tokens, identities, AuthorizationPipeline::new().stage(TenantScope).stage(engine))
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Same as [`Guard::authorize`], starting from a raw `Authorization`
    /// header value.
    pub async fn authorize_header(
        &self,
        ctx: &RequestContext,
        header: Option<&str>,
        target: Target,
    ) -> Result<GuardOutcome, GuardError> {
        match header.and_then(extract_bearer) {
            Some(token) => self.authorize(ctx, token, target).await,
            None => Ok(self.deny(Denial::authentication("missing or malformed bearer credentials", None))),
        }
    }

    pub async fn authorize(&self, ctx: &RequestContext, bearer_token: &str, target: Target) -> Result<GuardOutcome, GuardError> {
        let verified = self.tokens.verify(ctx, bearer_token).await?;
        let (claims, details) = match verified.into_result() {
            Ok(parts) => parts,
            Err(failure) => {
                if failure.is_suspicious() {
                    tracing::warn!(reason = %failure, "rejected bearer token");
                }
                return Ok(self.deny(Denial::authentication(failure.to_string(), Some(failure))));
            }
        };

        if details.kind != TokenKind::Access {
            return Ok(self.deny(Denial::authentication(
                format!("{} token {} presented for access", details.kind, details.token_id),
                Some(VerificationFailure::WrongKind),
            )));
        }

        let subject = match Subject::from_claims(&claims) {
            Ok(subject) => subject,
            Err(err) => return Ok(self.deny(Denial::authentication(err.to_string(), None))),
        };

        let identity = match self.identities.build(ctx, subject).await {
            Ok(identity) => identity,
            Err(err @ (IdentityError::MissingSubject
            | IdentityError::MissingTenant
            | IdentityError::InvalidSubjectType(_)
            | IdentityError::MissingAppScope)) => {
                return Ok(self.deny(Denial::authentication(err.to_string(), None)));
            }
            Err(err) => return Err(err.into()),
        };
        let identity = identity.with_session(Session {
            token_id: details.token_id,
            issued_at: details.issued_at,
            expires_at: details.expires_at,
        });

        let Target {
            resource,
            action,
            context,
        } = target;
        let decision = {
            let mut request = AuthorizationRequest::new(&identity, resource, action);
            request.context = context;
            self.pipeline.run(&request)?
        };
        if !decision.allowed {
            return Ok(self.deny(Denial {
                stage: DenialStage::Authorization,
                reason: format!("{}: {}", decision.model, decision.reason),
                token_failure: None,
            }));
        }

        tracing::debug!(
            tenant_id = %identity.tenant_id,
            subject = %identity.subject.qualified_id(),
            model = decision.model,
            "request authorized"
        );
        Ok(GuardOutcome::Allowed(Box::new(Authorized { identity, decision })))
    }

    fn deny(&self, denial: Denial) -> GuardOutcome {
        tracing::info!(stage = ?denial.stage, reason = %denial.reason, "request denied");
        GuardOutcome::Denied(denial)
    }
}
