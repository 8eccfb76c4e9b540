use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use warden_auth::{
    AuthorizationConfig, AuthorizationEngine, AuthorizationPipeline, IdentityContextBuilder, ProviderError,
    RbacEvaluator, RequireAnyRole, Resource, Role, RoleProvider, RoleTable, StaticRoleProvider, Subject,
};
use warden_core::{AppId, Claims, ManualClock, RequestContext, SubjectId, TenantId};
use warden_guard::{DenialStage, Guard, GuardError, GuardOutcome, Target};
use warden_tokens::{InMemoryRevocationList, TokenConfig, TokenManager, VerificationFailure};

const SECRET: &str = "guard-tests-secret-guard-tests-secret";

struct Fixture {
    guard: Guard,
    tokens: Arc<TokenManager>,
    clock: Arc<ManualClock>,
}

fn role_table() -> Arc<RoleTable> {
    let table = Arc::new(RoleTable::new());
    table
        .grant(&TenantId::new("acme"), &Role::new("editor"), ["documents:read", "documents:write"])
        .unwrap();
    table
}

fn identities() -> IdentityContextBuilder {
    let roles = Arc::new(StaticRoleProvider::new());
    roles
        .assign(&TenantId::new("acme"), &AppId::new("portal"), &SubjectId::new("alice"), ["editor"])
        .unwrap();
    IdentityContextBuilder::new().with_role_provider(roles)
}

fn fixture_with(identities: IdentityContextBuilder) -> Fixture {
    let clock = Arc::new(ManualClock::starting_now());
    let tokens = Arc::new(
        TokenManager::new(TokenConfig::signed(SECRET), Arc::new(InMemoryRevocationList::new()))
            .unwrap()
            .with_clock(clock.clone()),
    );
    let engine = AuthorizationEngine::hybrid(role_table(), Vec::new(), &AuthorizationConfig::default());
    Fixture {
        guard: Guard::with_engine(tokens.clone(), identities, engine),
        tokens,
        clock,
    }
}

fn fixture() -> Fixture {
    fixture_with(identities())
}

fn alice() -> Claims {
    Claims::for_subject("alice", "acme", "portal")
}

fn denial(outcome: &GuardOutcome) -> (DenialStage, &'static str, Option<VerificationFailure>) {
    let denial = outcome.denial().expect("expected a denial");
    (denial.stage, denial.public_message(), denial.token_failure)
}

#[tokio::test]
async fn allows_and_attaches_session() {
    let fx = fixture();
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();

    let target = Target::new(Resource::new("acme", "documents").with_id("d1"), "write");
    let outcome = fx.guard.authorize(&ctx, &token.value, target).await.unwrap();

    let GuardOutcome::Allowed(authorized) = outcome else {
        panic!("expected allow, got {outcome:?}");
    };
    let session = authorized.identity.session.as_ref().unwrap();
    assert_eq!(session.token_id, token.id);
    assert_eq!(session.expires_at, token.expires_at);
    assert!(authorized.identity.has_role(&Role::new("editor")));
}

#[tokio::test]
async fn authorization_denials_stay_generic() {
    let fx = fixture();
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();

    let delete = Target::new(Resource::new("acme", "documents").with_id("d1"), "delete");
    let outcome = fx.guard.authorize(&ctx, &token.value, delete).await.unwrap();
    assert_eq!(denial(&outcome), (DenialStage::Authorization, "access denied", None));
    assert!(!outcome.denial().unwrap().public_message().contains("delete"));

    let foreign = Target::new(Resource::new("globex", "documents"), "read");
    let outcome = fx.guard.authorize(&ctx, &token.value, foreign).await.unwrap();
    assert_eq!(outcome.denial().unwrap().stage, DenialStage::Authorization);
    assert!(outcome.denial().unwrap().reason.contains("tenant"));
}

#[tokio::test]
async fn owner_reads_own_document_without_role() {
    let fx = fixture_with(IdentityContextBuilder::new());
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();

    let own = Resource::new("acme", "notes").with_id("n1").with_attribute("owner_id", "alice");
    let outcome = fx.guard.authorize(&ctx, &token.value, Target::new(own, "read")).await.unwrap();
    assert!(outcome.is_allowed());
}

#[tokio::test]
async fn token_problems_are_authentication_denials() {
    let fx = fixture();
    let ctx = RequestContext::background();
    let target = || Target::new(Resource::new("acme", "documents"), "read");

    let outcome = fx.guard.authorize(&ctx, "not-a-token", target()).await.unwrap();
    assert_eq!(
        denial(&outcome),
        (DenialStage::Authentication, "authentication required", Some(VerificationFailure::Malformed))
    );

    let refresh = fx.tokens.generate_refresh_token(&ctx, &alice()).await.unwrap();
    let outcome = fx.guard.authorize(&ctx, &refresh.value, target()).await.unwrap();
    assert_eq!(denial(&outcome).2, Some(VerificationFailure::WrongKind));

    let access = fx.tokens.generate(&ctx, &alice()).await.unwrap();
    fx.tokens.revoke(&ctx, &access.value).await.unwrap();
    let outcome = fx.guard.authorize(&ctx, &access.value, target()).await.unwrap();
    assert_eq!(denial(&outcome).2, Some(VerificationFailure::Revoked));

    let access = fx.tokens.generate(&ctx, &alice()).await.unwrap();
    fx.clock.advance(Duration::minutes(16));
    let outcome = fx.guard.authorize(&ctx, &access.value, target()).await.unwrap();
    assert_eq!(denial(&outcome).2, Some(VerificationFailure::Expired));

    let outcome = fx.guard.authorize_header(&ctx, None, target()).await.unwrap();
    assert_eq!(denial(&outcome).0, DenialStage::Authentication);
}

#[tokio::test]
async fn header_flow_matches_direct_flow() {
    let fx = fixture();
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();
    let header = format!("Bearer {}", token.value);

    let target = Target::new(Resource::new("acme", "documents"), "read").with_context("ip", "10.0.0.1");
    let outcome = fx.guard.authorize_header(&ctx, Some(&header), target).await.unwrap();
    assert!(outcome.is_allowed());
}

struct BrokenRoles;

#[async_trait]
impl RoleProvider for BrokenRoles {
    async fn get_roles(
        &self,
        _ctx: &RequestContext,
        _tenant_id: &TenantId,
        _app_id: &AppId,
        _subject: &Subject,
    ) -> Result<Vec<Role>, ProviderError> {
        Err(ProviderError::Unavailable("directory offline".to_string()))
    }
}

#[tokio::test]
async fn provider_faults_are_errors_not_denials() {
    let fx = fixture_with(IdentityContextBuilder::new().with_role_provider(Arc::new(BrokenRoles)));
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();

    let err = fx
        .guard
        .authorize(&ctx, &token.value, Target::new(Resource::new("acme", "documents"), "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::Identity(_)));
}

#[tokio::test]
async fn custom_pipeline_runs_in_order() {
    let fx = fixture();
    let guard = Guard::new(
        fx.tokens.clone(),
        identities(),
        AuthorizationPipeline::new().stage(RequireAnyRole::new(["admin"])),
    );
    let ctx = RequestContext::background();
    let token = fx.tokens.generate(&ctx, &alice()).await.unwrap();

    let outcome = guard
        .authorize(&ctx, &token.value, Target::new(Resource::new("acme", "documents"), "read"))
        .await
        .unwrap();
    let denial = outcome.denial().unwrap();
    assert!(denial.reason.starts_with("require_any_role"));
}
