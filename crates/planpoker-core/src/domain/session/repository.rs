//! SQLite session store
//!
//! Handles all database interactions for shared session records. Updates
//! are a single conditional `UPDATE`, so a stale base revision affects zero
//! rows and surfaces as a conflict. Migrations read and rewrite the row
//! inside one transaction, guarded by the same revision check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::feed::ChangeFeed;
use super::migration;
use super::repository_trait::{SessionFeed, SessionStore};
use super::session::{Participant, Session, SessionUpdate};
use crate::error::{Error, Result};

const SELECT_SESSION: &str = r#"
    SELECT id, title, created_by, votes_revealed, current_ticket,
           participants, revision, created_at
    FROM sessions
    WHERE id = ?
"#;

/// Session store backed by the `sessions` table
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteSessionStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_feed(pool, ChangeFeed::default())
    }

    /// Create a store publishing through an existing feed
    pub fn with_feed(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change feed used for notifications
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    async fn fetch(&self, session_id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Read-modify-write one row inside a transaction
    async fn rewrite<F>(&self, session_id: Uuid, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session) -> Result<()>,
    {
        let id = session_id.to_string();
        let mut tx = self.pool.begin().await.map_err(Error::DatabaseError)?;

        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::DatabaseError)?;
        let mut session = row
            .ok_or(Error::SessionNotFound(session_id))?
            .into_session()?;
        let base_revision = session.revision;

        f(&mut session)?;

        let participants = serde_json::to_string(&session.participants)?;
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                created_by = ?,
                participants = ?,
                revision = ?,
                updated_at = ?
            WHERE id = ? AND revision = ?
            "#,
        )
        .bind(session.created_by.to_string())
        .bind(&participants)
        .bind(session.revision as i64)
        .bind(Utc::now())
        .bind(&id)
        .bind(base_revision as i64)
        .execute(&mut *tx)
        .await
        .map_err(Error::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "session {} changed during migration",
                session_id
            )));
        }

        tx.commit().await.map_err(Error::DatabaseError)?;
        self.feed.publish(&session);
        Ok(session)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, title: &str, created_by: Uuid) -> Result<Session> {
        let session = Session::new(title, created_by);
        let participants = serde_json::to_string(&session.participants)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, title, created_by, votes_revealed, current_ticket,
                participants, revision, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.title)
        .bind(session.created_by.to_string())
        .bind(session.votes_revealed)
        .bind(&session.current_ticket)
        .bind(&participants)
        .bind(session.revision as i64)
        .bind(session.created_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        info!(session_id = %session.id, created_by = %created_by, "Created session");
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.fetch(session_id).await
    }

    async fn update_session(&self, session_id: Uuid, update: &SessionUpdate) -> Result<Session> {
        let participants = update
            .participants
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let expected = update.expected_revision.map(|r| r as i64);

        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                participants = COALESCE(?, participants),
                votes_revealed = COALESCE(?, votes_revealed),
                current_ticket = COALESCE(?, current_ticket),
                revision = revision + 1,
                updated_at = ?
            WHERE id = ? AND (? IS NULL OR revision = ?)
            "#,
        )
        .bind(&participants)
        .bind(update.votes_revealed)
        .bind(&update.current_ticket)
        .bind(Utc::now())
        .bind(session_id.to_string())
        .bind(expected)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        if result.rows_affected() == 0 {
            return match self.fetch(session_id).await? {
                None => Err(Error::SessionNotFound(session_id)),
                Some(current) => Err(Error::Conflict(format!(
                    "session {} is at revision {}, write was based on {}",
                    session_id,
                    current.revision,
                    update.expected_revision.unwrap_or_default()
                ))),
            };
        }

        let stored = self
            .fetch(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        debug!(session_id = %session_id, revision = stored.revision, "Session updated");
        self.feed.publish(&stored);
        Ok(stored)
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
        self.rewrite(session_id, |session| {
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
        self.rewrite(session_id, |session| {
            migration::migrate_facilitator(session, old_id, new_id)
        })
        .await?;

        info!(session_id = %session_id, old_id = %old_id, new_id = %new_id, "Facilitator migrated");
        Ok(())
    }
}

/// Database row for a session
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    title: String,
    created_by: String,
    votes_revealed: bool,
    current_ticket: String,
    participants: String,
    revision: i64,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::Parse(format!("Invalid session ID: {}", e)))?;
        let created_by = Uuid::parse_str(&self.created_by)
            .map_err(|e| Error::Parse(format!("Invalid facilitator ID: {}", e)))?;
        let participants: BTreeMap<Uuid, Participant> = serde_json::from_str(&self.participants)
            .map_err(|e| Error::Parse(format!("Invalid participants JSON: {}", e)))?;

        Ok(Session {
            id,
            title: self.title,
            created_by,
            votes_revealed: self.votes_revealed,
            current_ticket: self.current_ticket,
            participants,
            created_at: self.created_at,
            revision: u64::try_from(self.revision).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::card::VotingCard;
    use crate::domain::session::session::DEFAULT_SESSION_TITLE;
    use crate::storage::{Database, DatabaseConfig};

    async fn create_test_store() -> SqliteSessionStore {
        let db = Database::in_memory()
            .await
            .expect("Failed to create test database");
        SqliteSessionStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = create_test_store().await;
        let creator = Uuid::new_v4();

        let created = store.create_session("", creator).await.expect("Failed to create");
        let fetched = store
            .get_session(created.id)
            .await
            .expect("Failed to get")
            .expect("Session not found");

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, DEFAULT_SESSION_TITLE);
        assert_eq!(fetched.created_by, creator);
        assert!(fetched.participants.is_empty());
        assert!(!fetched.votes_revealed);
        assert_eq!(fetched.revision, 0);
    }

    #[tokio::test]
    async fn test_get_missing_session() {
        let store = create_test_store().await;
        assert!(store.get_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let store = create_test_store().await;
        let session = store.create_session("Partial", Uuid::new_v4()).await.unwrap();
        let voter = Uuid::new_v4();

        let participants = BTreeMap::from([(
            voter,
            Participant {
                alias: "Sam".to_string(),
                vote: Some(VotingCard::Five),
            },
        )]);
        store
            .update_session(session.id, &SessionUpdate::participants(participants))
            .await
            .unwrap();

        let ticket = SessionUpdate {
            current_ticket: Some("PAY-9".to_string()),
            ..Default::default()
        };
        let stored = store.update_session(session.id, &ticket).await.unwrap();

        assert_eq!(stored.current_ticket, "PAY-9");
        assert_eq!(stored.participants[&voter].vote, Some(VotingCard::Five));
        assert!(!stored.votes_revealed);
        assert_eq!(stored.revision, 2);
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = create_test_store().await;
        let session = store.create_session("CAS", Uuid::new_v4()).await.unwrap();

        let reveal = SessionUpdate {
            votes_revealed: Some(true),
            ..Default::default()
        }
        .expecting(0);
        store.update_session(session.id, &reveal).await.unwrap();

        let err = store.update_session(session.id, &reveal).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let store = create_test_store().await;
        let err = store
            .update_session(Uuid::new_v4(), &SessionUpdate::default().expecting(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_migrations_in_transaction() {
        let store = create_test_store().await;
        let old_id = Uuid::new_v4();
        let new_id = Uuid::new_v4();
        let session = store.create_session("Migrate", old_id).await.unwrap();
        store
            .update_session(
                session.id,
                &SessionUpdate::participants(BTreeMap::from([(
                    old_id,
                    Participant {
                        alias: "Sam".to_string(),
                        vote: Some(VotingCard::Thirteen),
                    },
                )])),
            )
            .await
            .unwrap();

        store
            .migrate_participant(session.id, old_id, new_id, "Sam")
            .await
            .unwrap();
        store
            .migrate_facilitator(session.id, old_id, new_id)
            .await
            .unwrap();

        let after = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(after.created_by, new_id);
        assert_eq!(after.participants.len(), 1);
        assert_eq!(after.participants[&new_id].vote, Some(VotingCard::Thirteen));
        assert_eq!(after.revision, 3);
    }

    #[tokio::test]
    async fn test_rejected_migration_rolls_back() {
        let store = create_test_store().await;
        let session = store.create_session("Migrate", Uuid::new_v4()).await.unwrap();

        let err = store
            .migrate_facilitator(session.id, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MigrationRejected(_)));

        let after = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(after.created_by, session.created_by);
        assert_eq!(after.revision, 0);
    }

    #[tokio::test]
    async fn test_two_clients_share_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let db_a = Database::new(DatabaseConfig::with_path(&path)).await.unwrap();
        let db_b = Database::new(DatabaseConfig::with_path(&path)).await.unwrap();
        let client_a = SqliteSessionStore::new(db_a.pool().clone());
        let client_b = SqliteSessionStore::new(db_b.pool().clone());

        let session = client_a.create_session("Shared", Uuid::new_v4()).await.unwrap();
        let seen_by_b = client_b.get_session(session.id).await.unwrap().unwrap();

        // A writes first; B's write is based on the revision it read
        let a_update = SessionUpdate {
            current_ticket: Some("A".to_string()),
            ..Default::default()
        }
        .expecting(seen_by_b.revision);
        client_a.update_session(session.id, &a_update).await.unwrap();

        let b_update = SessionUpdate {
            current_ticket: Some("B".to_string()),
            ..Default::default()
        }
        .expecting(seen_by_b.revision);
        let err = client_b.update_session(session.id, &b_update).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = client_b.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.current_ticket, "A");
    }

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let store = create_test_store().await;
        let session = store.create_session("Feed", Uuid::new_v4()).await.unwrap();
        let mut feed = store.subscribe(session.id).await.unwrap();

        let update = SessionUpdate {
            votes_revealed: Some(true),
            ..Default::default()
        };
        store.update_session(session.id, &update).await.unwrap();

        let change = feed.recv().await.unwrap();
        assert!(change.votes_revealed);
    }
}
