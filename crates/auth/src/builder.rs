use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use warden_core::RequestContext;

use crate::cache::IdentityCache;
use crate::error::{IdentityError, ProviderError};
use crate::identity::IdentityContext;
use crate::providers::{GroupProvider, PermissionProvider, ProfileProvider, RoleProvider};
use crate::subject::Subject;

/// Turns a [`Subject`] into an [`IdentityContext`] through the configured
/// providers.
///
/// A provider that is not configured leaves its field empty. Any provider
/// failure aborts the build.
#[derive(Clone, Default)]
pub struct IdentityContextBuilder {
    roles: Option<Arc<dyn RoleProvider>>,
    permissions: Option<Arc<dyn PermissionProvider>>,
    groups: Option<Arc<dyn GroupProvider>>,
    profiles: Option<Arc<dyn ProfileProvider>>,
    cache: Option<Arc<IdentityCache>>,
}

impl IdentityContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role_provider(mut self, provider: Arc<dyn RoleProvider>) -> Self {
        self.roles = Some(provider);
        self
    }

    pub fn with_permission_provider(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(provider);
        self
    }

    pub fn with_group_provider(mut self, provider: Arc<dyn GroupProvider>) -> Self {
        self.groups = Some(provider);
        self
    }

    pub fn with_profile_provider(mut self, provider: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: Arc<IdentityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<IdentityCache>> {
        self.cache.as_ref()
    }

    pub async fn build(
        &self,
        ctx: &RequestContext,
        subject: Subject,
    ) -> Result<IdentityContext, IdentityError> {
        let app_id = subject.app_id().ok_or(IdentityError::MissingAppScope)?;
        let tenant_id = subject.tenant_id.clone();

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&app_id, &subject) {
                tracing::debug!(tenant_id = %tenant_id, app_id = %app_id, subject_id = %subject.id, "identity cache hit");
                return Ok(hit);
            }
        }

        let (roles, permissions, groups, profile) = tokio::try_join!(
            resolve(ctx, "role", self.roles.as_ref().map(|p| p.get_roles(ctx, &tenant_id, &app_id, &subject))),
            resolve(
                ctx,
                "permission",
                self.permissions
                    .as_ref()
                    .map(|p| p.get_permissions(ctx, &tenant_id, &app_id, &subject)),
            ),
            resolve(ctx, "group", self.groups.as_ref().map(|p| p.get_groups(ctx, &tenant_id, &subject))),
            resolve(ctx, "profile", self.profiles.as_ref().map(|p| p.get_profile(ctx, &tenant_id, &subject))),
        )?;

        let context = IdentityContext {
            tenant_id,
            app_id,
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
            groups: groups.into_iter().collect::<BTreeSet<_>>(),
            profile,
            session: None,
            subject,
        };

        tracing::debug!(
            tenant_id = %context.tenant_id,
            app_id = %context.app_id,
            subject_id = %context.subject.id,
            roles = context.roles.len(),
            permissions = context.permissions.len(),
            groups = context.groups.len(),
            "identity context built"
        );

        if let Some(cache) = &self.cache {
            cache.insert(&context);
        }
        Ok(context)
    }
}

/// Run one provider call under `ctx`; an unconfigured provider yields an
/// empty value.
async fn resolve<F, T>(ctx: &RequestContext, provider: &'static str, call: Option<F>) -> Result<T, IdentityError>
where
    F: Future<Output = Result<T, ProviderError>>,
    T: Default,
{
    let Some(call) = call else {
        return Ok(T::default());
    };
    ctx.guard(call)
        .await?
        .map_err(|e| IdentityError::from_provider(provider, e))
}

impl core::fmt::Debug for IdentityContextBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityContextBuilder")
            .field("roles", &self.roles.is_some())
            .field("permissions", &self.permissions.is_some())
            .field("groups", &self.groups.is_some())
            .field("profiles", &self.profiles.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}
