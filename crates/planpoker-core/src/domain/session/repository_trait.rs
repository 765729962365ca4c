//! Store trait for shared session records
//!
//! This module defines the collaborator every client talks to. The trait
//! abstracts over storage backends (in-memory, SQLite, ...). Implementations
//! must make `update_session` a compare-and-set when the update carries an
//! expected revision, and must apply each migration as one indivisible write.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

use super::session::{Session, SessionUpdate};

/// Live change notifications for one session; each message is the full record
pub type SessionFeed = broadcast::Receiver<Session>;

/// Shared session store
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session, assigning its id and creation time
    async fn create_session(&self, title: &str, created_by: Uuid) -> Result<Session>;

    /// Get a session by ID
    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Apply a partial update and return the stored record
    ///
    /// Fails with `Error::Conflict` when `update.expected_revision` does not
    /// match, and `Error::SessionNotFound` when the session is gone.
    async fn update_session(&self, session_id: Uuid, update: &SessionUpdate) -> Result<Session>;

    /// Subscribe to change notifications for one session
    async fn subscribe(&self, session_id: Uuid) -> Result<SessionFeed>;

    /// Atomically move the participant slot of `old_id` to `new_id`
    async fn migrate_participant(
        &self,
        session_id: Uuid,
        old_id: Uuid,
        new_id: Uuid,
        alias: &str,
    ) -> Result<()>;

    /// Atomically hand facilitator rights from `old_id` to `new_id`
    async fn migrate_facilitator(&self, session_id: Uuid, old_id: Uuid, new_id: Uuid) -> Result<()>;
}
