//! In-memory session store
//!
//! Every operation runs under a single write-lock acquisition, which makes
//! the compare-and-set update and both migrations indivisible. Used by tests
//! and by the in-process simulation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::feed::ChangeFeed;
use super::migration;
use super::repository_trait::{SessionFeed, SessionStore};
use super::session::{Session, SessionUpdate};
use crate::error::{Error, Result};

/// Session store backed by a shared map
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    feed: ChangeFeed,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The change feed used for notifications
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn mutate<F>(&self, session_id: Uuid, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session) -> Result<()>,
    {
        let updated = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&session_id)
                .ok_or(Error::SessionNotFound(session_id))?;
            let mut draft = session.clone();
            f(&mut draft)?;
            *session = draft.clone();
            draft
        };
        self.feed.publish(&updated);
        Ok(updated)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, title: &str, created_by: Uuid) -> Result<Session> {
        let session = Session::new(title, created_by);
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());

        info!(session_id = %session.id, created_by = %created_by, "Created session");
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn update_session(&self, session_id: Uuid, update: &SessionUpdate) -> Result<Session> {
        let updated = self
            .mutate(session_id, |session| {
                update.check_revision(session)?;
                update.apply_to(session);
                Ok(())
            })
            .await?;

        debug!(session_id = %session_id, revision = updated.revision, "Session updated");
        Ok(updated)
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<SessionFeed> {
        Ok(self.feed.subscribe(session_id))
    }

    async fn migrate_participant(
        &self,
        session_id: Uuid,
        old_id: Uuid,
        new_id: Uuid,
        alias: &str,
    ) -> Result<()> {
        self.mutate(session_id, |session| {
            migration::migrate_participant(session, old_id, new_id, alias)
        })
        .await?;

        info!(session_id = %session_id, old_id = %old_id, new_id = %new_id, "Participant migrated");
        Ok(())
    }

    async fn migrate_facilitator(
        &self,
        session_id: Uuid,
        old_id: Uuid,
        new_id: Uuid,
    ) -> Result<()> {
        self.mutate(session_id, |session| {
            migration::migrate_facilitator(session, old_id, new_id)
        })
        .await?;

        info!(session_id = %session_id, old_id = %old_id, new_id = %new_id, "Facilitator migrated");
        Ok(())
    }
}
