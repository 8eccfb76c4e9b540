use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;

use warden_core::{AppId, Clock, SubjectId, SystemClock, TenantId};

use crate::identity::IdentityContext;
use crate::permissions::Permission;
use crate::roles::Role;
use crate::subject::Subject;

type Key = (TenantId, AppId, SubjectId);

/// Provider-derived part of an identity context.
#[derive(Debug, Clone)]
struct Entitlements {
    roles: BTreeSet<Role>,
    permissions: BTreeSet<Permission>,
    groups: BTreeSet<String>,
    profile: BTreeMap<String, Value>,
    expires_at: DateTime<Utc>,
}

/// TTL cache of provider results keyed by `(tenant, app, subject)`.
///
/// Only roles, permissions, groups and profile are kept. A hit is combined
/// with the subject of the current request, so claim attributes are always
/// the verified token's own. No session is stored.
pub struct IdentityCache {
    entries: DashMap<Key, Entitlements>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cached entitlements of `subject` in `app_id`, attached to `subject`.
    pub fn get(&self, app_id: &AppId, subject: &Subject) -> Option<IdentityContext> {
        let key = (subject.tenant_id.clone(), app_id.clone(), subject.id.clone());
        let now = self.clock.now();
        let hit = self.entries.get(&key).and_then(|entry| {
            let cached = entry.value();
            (now < cached.expires_at).then(|| IdentityContext {
                tenant_id: subject.tenant_id.clone(),
                app_id: app_id.clone(),
                roles: cached.roles.clone(),
                permissions: cached.permissions.clone(),
                groups: cached.groups.clone(),
                profile: cached.profile.clone(),
                session: None,
                subject: subject.clone(),
            })
        });
        if hit.is_none() {
            self.entries.remove_if(&key, |_, cached| now >= cached.expires_at);
        }
        hit
    }

    pub fn insert(&self, context: &IdentityContext) {
        let key = (
            context.tenant_id.clone(),
            context.app_id.clone(),
            context.subject.id.clone(),
        );
        let entitlements = Entitlements {
            roles: context.roles.clone(),
            permissions: context.permissions.clone(),
            groups: context.groups.clone(),
            profile: context.profile.clone(),
            expires_at: self.clock.now() + self.ttl,
        };
        self.entries.insert(key, entitlements);
    }

    /// Drop every cached context of a subject in a tenant, across apps.
    pub fn invalidate_subject(&self, tenant_id: &TenantId, subject_id: &SubjectId) -> usize {
        let mut removed = 0;
        self.entries.retain(|(t, _, s), _| {
            let keep = !(t == tenant_id && s == subject_id);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, cached| {
            let keep = now < cached.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warden_core::{Claims, ManualClock};

    use super::*;

    fn subject(id: &str, app: &str) -> Subject {
        Subject::from_claims(&Claims::for_subject(id, "acme", app)).unwrap()
    }

    fn context(id: &str, app: &str) -> IdentityContext {
        IdentityContext::bare(subject(id, app), AppId::new(app)).with_roles(["editor"])
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = IdentityCache::new(Duration::seconds(30)).with_clock(clock.clone());
        let portal = AppId::new("portal");

        cache.insert(&context("alice", "portal"));
        assert!(cache.get(&portal, &subject("alice", "portal")).is_some());

        clock.advance(Duration::seconds(31));
        assert!(cache.get(&portal, &subject("alice", "portal")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn hit_carries_the_current_subject() {
        let cache = IdentityCache::new(Duration::minutes(5));
        let portal = AppId::new("portal");
        let legal = Subject::from_claims(&Claims::for_subject("alice", "acme", "portal").with("department", "legal")).unwrap();
        let finance =
            Subject::from_claims(&Claims::for_subject("alice", "acme", "portal").with("department", "finance")).unwrap();

        cache.insert(&IdentityContext::bare(legal, portal.clone()).with_roles(["editor"]));

        let hit = cache.get(&portal, &finance).unwrap();
        assert_eq!(hit.subject.attribute("department"), Some(&json!("finance")));
        assert!(hit.roles.contains(&Role::new("editor")));
        assert!(hit.session.is_none());
    }

    #[test]
    fn invalidation_covers_every_app() {
        let cache = IdentityCache::new(Duration::minutes(5));
        cache.insert(&context("alice", "portal"));
        cache.insert(&context("alice", "billing"));
        cache.insert(&context("bob", "portal"));

        assert_eq!(cache.invalidate_subject(&TenantId::new("acme"), &SubjectId::new("alice")), 2);
        assert_eq!(cache.len(), 1);
    }
}
