//! Conflict-resolving mutator
//!
//! Every ordinary session write goes through [`ConflictResolvingMutator::apply`]:
//!
//! 1. re-fetch the authoritative snapshot
//! 2. compute the update on top of it
//! 3. submit it as a compare-and-set against the fetched revision
//! 4. on success hand back the stored record for the caller to adopt
//! 5. on conflict or transient failure retry from 1 per [`RetryPolicy`]
//! 6. otherwise, or once attempts run out, give up without side effects

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::retry::{FailureKind, RetryDecision, RetryPolicy};
use crate::domain::session::repository_trait::SessionStore;
use crate::domain::session::session::{Session, SessionUpdate};
use crate::error::{Error, Result};

/// Result of a completed mutation
#[derive(Debug, Clone)]
pub struct Mutation {
    /// Record to adopt as the local view
    pub snapshot: Session,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// False when the transition was a no-op and nothing was written
    pub written: bool,
}

/// Read-modify-write driver with bounded retry
#[derive(Clone)]
pub struct ConflictResolvingMutator {
    store: Arc<dyn SessionStore>,
    policy: RetryPolicy,
}

impl ConflictResolvingMutator {
    pub fn new(store: Arc<dyn SessionStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `compute` against fresh snapshots until a write sticks
    ///
    /// `compute` is called once per attempt and must derive the update only
    /// from the snapshot it is given. Returning an empty update ends the
    /// operation successfully without writing.
    pub async fn apply<F>(
        &self,
        session_id: Uuid,
        operation: &str,
        mut compute: F,
    ) -> Result<Mutation>
    where
        F: FnMut(&Session) -> Result<SessionUpdate> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(session_id, &mut compute).await {
                Ok((snapshot, written)) => {
                    debug!(
                        session_id = %session_id,
                        operation,
                        attempt,
                        written,
                        revision = snapshot.revision,
                        "Mutation applied"
                    );
                    return Ok(Mutation {
                        snapshot,
                        attempts: attempt,
                        written,
                    });
                }
                Err(err) => err,
            };

            match self.policy.decide(attempt, &err) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        session_id = %session_id,
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Session write failed, retrying"
                    );
                    sleep(delay).await;
                }
                RetryDecision::Abandon if self.policy.classify(&err) == FailureKind::Rejected => {
                    warn!(session_id = %session_id, operation, error = %err, "Mutation rejected");
                    return Err(err);
                }
                RetryDecision::Abandon => {
                    error!(
                        session_id = %session_id,
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Mutation abandoned"
                    );
                    return Err(Error::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
            }
        }
    }

    async fn attempt<F>(&self, session_id: Uuid, compute: &mut F) -> Result<(Session, bool)>
    where
        F: FnMut(&Session) -> Result<SessionUpdate> + Send,
    {
        let current = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;

        let update = compute(&current)?;
        if update.is_empty() {
            return Ok((current, false));
        }

        let base = current.revision;
        let stored = self
            .store
            .update_session(session_id, &update.expecting(base))
            .await?;
        Ok((stored, true))
    }
}
