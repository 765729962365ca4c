//! Identity resolver
//!
//! Reconnecting clients often come back under a new ephemeral identity. If
//! the alias remembered for a session matches an existing slot, that slot
//! (and facilitator rights, when the old identity held them) is handed to
//! the new identity through the store's atomic migration operations.
//!
//! Alias matching is by exact text. Two participants sharing an alias can
//! cause the wrong slot to be claimed.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::alias_hints::AliasHints;
use crate::domain::session::repository_trait::SessionStore;
use crate::domain::session::session::Session;
use crate::error::Result;

/// A migration the resolver intends to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub old_id: Uuid,
    pub new_id: Uuid,
    pub alias: String,
    /// The old identity is also the facilitator
    pub facilitator: bool,
}

/// What happened when resolving an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No hint, already a participant, or no slot with that alias
    NotNeeded,
    /// The slot of `old_id` now belongs to the current identity
    Migrated { old_id: Uuid, facilitator: bool },
    /// The slot moved but facilitator rights stayed with `old_id`
    SlotOnly { old_id: Uuid, error: String },
    /// The store refused or failed; the viewer simply joins fresh
    Failed(String),
}

/// Decide whether `user_id` should claim an existing slot in `session`
pub fn plan_migration(
    session: &Session,
    user_id: Uuid,
    hint: Option<&str>,
) -> Option<PlannedMigration> {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty())?;
    if session.is_participant(user_id) {
        return None;
    }
    let old_id = session.find_by_alias(hint)?;
    if old_id == user_id {
        return None;
    }

    Some(PlannedMigration {
        old_id,
        new_id: user_id,
        alias: hint.to_string(),
        facilitator: session.is_facilitator(old_id),
    })
}

/// Best-effort identity migration on session entry
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn SessionStore>,
    hints: Arc<dyn AliasHints>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn SessionStore>, hints: Arc<dyn AliasHints>) -> Self {
        Self { store, hints }
    }

    /// Reconcile `user_id` with `snapshot`, fetched once on entry
    ///
    /// Never fails: problems are logged and reported as
    /// [`MigrationOutcome::Failed`], or [`MigrationOutcome::SlotOnly`] when
    /// only the facilitator hand-over went wrong.
    pub async fn resolve(&self, snapshot: &Session, user_id: Uuid) -> MigrationOutcome {
        let hint = self.hints.get(snapshot.id);
        let Some(plan) = plan_migration(snapshot, user_id, hint.as_deref()) else {
            debug!(session_id = %snapshot.id, user_id = %user_id, "No identity migration needed");
            return MigrationOutcome::NotNeeded;
        };

        if let Err(e) = self
            .store
            .migrate_participant(snapshot.id, plan.old_id, plan.new_id, &plan.alias)
            .await
        {
            warn!(
                session_id = %snapshot.id,
                old_id = %plan.old_id,
                error = %e,
                "Participant migration failed"
            );
            return MigrationOutcome::Failed(e.to_string());
        }

        if plan.facilitator {
            if let Err(e) = self.migrate_facilitator(snapshot.id, &plan).await {
                warn!(
                    session_id = %snapshot.id,
                    old_id = %plan.old_id,
                    error = %e,
                    "Facilitator migration failed, slot already moved"
                );
                return MigrationOutcome::SlotOnly {
                    old_id: plan.old_id,
                    error: e.to_string(),
                };
            }
        }

        info!(
            session_id = %snapshot.id,
            old_id = %plan.old_id,
            new_id = %plan.new_id,
            facilitator = plan.facilitator,
            "Identity migrated"
        );
        MigrationOutcome::Migrated {
            old_id: plan.old_id,
            facilitator: plan.facilitator,
        }
    }

    /// Hand over facilitator rights, trying a second time on failure
    async fn migrate_facilitator(&self, session_id: Uuid, plan: &PlannedMigration) -> Result<()> {
        match self
            .store
            .migrate_facilitator(session_id, plan.old_id, plan.new_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Retrying facilitator migration");
                self.store
                    .migrate_facilitator(session_id, plan.old_id, plan.new_id)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::alias_hints::MemoryAliasHints;
    use crate::domain::session::card::VotingCard;
    use crate::domain::session::memory::InMemorySessionStore;
    use crate::domain::session::repository_trait::SessionFeed;
    use crate::domain::session::session::{Participant, SessionUpdate};
    use crate::error::Error;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store whose facilitator hand-over fails a set number of times
    struct FlakyFacilitatorStore {
        inner: InMemorySessionStore,
        failures: AtomicUsize,
        facilitator_calls: AtomicUsize,
    }

    impl FlakyFacilitatorStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemorySessionStore::new(),
                failures: AtomicUsize::new(failures),
                facilitator_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionStore for FlakyFacilitatorStore {
        async fn create_session(&self, title: &str, created_by: Uuid) -> Result<Session> {
            self.inner.create_session(title, created_by).await
        }

        async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
            self.inner.get_session(session_id).await
        }

        async fn update_session(
            &self,
            session_id: Uuid,
            update: &SessionUpdate,
        ) -> Result<Session> {
            self.inner.update_session(session_id, update).await
        }

        async fn subscribe(&self, session_id: Uuid) -> Result<SessionFeed> {
            self.inner.subscribe(session_id).await
        }

        async fn migrate_participant(
            &self,
            session_id: Uuid,
            old_id: Uuid,
            new_id: Uuid,
            alias: &str,
        ) -> Result<()> {
            self.inner.migrate_participant(session_id, old_id, new_id, alias).await
        }

        async fn migrate_facilitator(
            &self,
            session_id: Uuid,
            old_id: Uuid,
            new_id: Uuid,
        ) -> Result<()> {
            self.facilitator_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(Error::Transient("facilitator hand-over unavailable".to_string()));
            }
            self.inner.migrate_facilitator(session_id, old_id, new_id).await
        }
    }

    async fn facilitator_sam_session(store: &dyn SessionStore, sam: Uuid) -> Session {
        let session = store.create_session("Resolve", sam).await.unwrap();
        store
            .update_session(
                session.id,
                &SessionUpdate::participants(BTreeMap::from([(sam, Participant::new("Sam"))])),
            )
            .await
            .unwrap()
    }

    fn session_with_sam(facilitator: Uuid, sam: Uuid) -> Session {
        let mut session = Session::new("Resolve", facilitator);
        session.participants.insert(
            sam,
            Participant {
                alias: "Sam".to_string(),
                vote: Some(VotingCard::Five),
            },
        );
        session
    }

    #[test]
    fn test_plan_requires_hint() {
        let session = session_with_sam(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(plan_migration(&session, Uuid::new_v4(), None), None);
        assert_eq!(plan_migration(&session, Uuid::new_v4(), Some("  ")), None);
    }

    #[test]
    fn test_plan_skips_existing_participant() {
        let sam = Uuid::new_v4();
        let session = session_with_sam(Uuid::new_v4(), sam);
        assert_eq!(plan_migration(&session, sam, Some("Sam")), None);
    }

    #[test]
    fn test_plan_unknown_alias() {
        let session = session_with_sam(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(plan_migration(&session, Uuid::new_v4(), Some("Jo")), None);
    }

    #[test]
    fn test_plan_marks_facilitator() {
        let sam = Uuid::new_v4();
        let new_id = Uuid::new_v4();

        let plan = plan_migration(&session_with_sam(sam, sam), new_id, Some("Sam")).unwrap();
        assert_eq!(plan.old_id, sam);
        assert_eq!(plan.new_id, new_id);
        assert!(plan.facilitator);

        let session = session_with_sam(Uuid::new_v4(), sam);
        let plan = plan_migration(&session, new_id, Some("Sam")).unwrap();
        assert!(!plan.facilitator);
    }

    #[tokio::test]
    async fn test_resolve_migrates_slot_and_facilitator() {
        let store = Arc::new(InMemorySessionStore::new());
        let hints = Arc::new(MemoryAliasHints::new());
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let session = store.create_session("Resolve", u1).await.unwrap();
        let session = store
            .update_session(
                session.id,
                &SessionUpdate::participants(BTreeMap::from([(
                    u1,
                    Participant {
                        alias: "Sam".to_string(),
                        vote: Some(VotingCard::Eight),
                    },
                )])),
            )
            .await
            .unwrap();
        hints.set(session.id, "Sam");

        let resolver = IdentityResolver::new(store.clone(), hints);
        let outcome = resolver.resolve(&session, u2).await;
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                old_id: u1,
                facilitator: true
            }
        );

        let after = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(after.created_by, u2);
        assert_eq!(after.participants[&u2].vote, Some(VotingCard::Eight));
        assert!(!after.is_participant(u1));
    }

    #[tokio::test]
    async fn test_resolve_failure_is_swallowed() {
        let store = Arc::new(InMemorySessionStore::new());
        let hints = Arc::new(MemoryAliasHints::new());
        let sam = Uuid::new_v4();

        // Snapshot claims Sam exists, the store disagrees
        let stored = store.create_session("Resolve", Uuid::new_v4()).await.unwrap();
        let mut stale = stored.clone();
        stale.participants.insert(sam, Participant::new("Sam"));
        hints.set(stored.id, "Sam");

        let resolver = IdentityResolver::new(store.clone(), hints);
        let outcome = resolver.resolve(&stale, Uuid::new_v4()).await;
        assert!(matches!(outcome, MigrationOutcome::Failed(_)));
        assert_eq!(store.get_session(stored.id).await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn test_facilitator_handover_retried_once() {
        let store = Arc::new(FlakyFacilitatorStore::new(1));
        let hints = Arc::new(MemoryAliasHints::new());
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        let session = facilitator_sam_session(store.as_ref(), u1).await;
        hints.set(session.id, "Sam");

        let outcome = IdentityResolver::new(store.clone(), hints).resolve(&session, u2).await;
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                old_id: u1,
                facilitator: true
            }
        );
        assert_eq!(store.facilitator_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_session(session.id).await.unwrap().unwrap().created_by, u2);
    }

    #[tokio::test]
    async fn test_slot_moved_but_facilitator_kept_is_reported() {
        let store = Arc::new(FlakyFacilitatorStore::new(2));
        let hints = Arc::new(MemoryAliasHints::new());
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        let session = facilitator_sam_session(store.as_ref(), u1).await;
        hints.set(session.id, "Sam");

        let outcome = IdentityResolver::new(store.clone(), hints).resolve(&session, u2).await;
        assert!(matches!(
            outcome,
            MigrationOutcome::SlotOnly { old_id, .. } if old_id == u1
        ));

        let after = store.get_session(session.id).await.unwrap().unwrap();
        assert!(after.is_participant(u2));
        assert!(!after.is_participant(u1));
        assert_eq!(after.created_by, u1);
    }
}
