//! Change subscriber
//!
//! Consumes one session's change feed and replaces the view's snapshot
//! wholesale on every message. Runs until its guard is released or the feed
//! closes.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::guard::SubscriptionGuard;
use crate::domain::session::repository_trait::SessionFeed;
use crate::domain::session::view::SessionView;

pub struct ChangeSubscriber;

impl ChangeSubscriber {
    /// Start consuming `feed` into `view`
    pub fn spawn(
        session_id: Uuid,
        mut feed: SessionFeed,
        view: Arc<RwLock<SessionView>>,
    ) -> SubscriptionGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            debug!(session_id = %session_id, "Subscribed to session changes");
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    message = feed.recv() => match message {
                        Ok(session) => {
                            view.write().await.apply_snapshot(session);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                session_id = %session_id,
                                skipped,
                                "Change feed lagged, skipping to latest"
                            );
                        }
                        Err(RecvError::Closed) => {
                            debug!(session_id = %session_id, "Change feed closed");
                            break;
                        }
                    },
                }
            }
            debug!(session_id = %session_id, "Unsubscribed from session changes");
        });

        SubscriptionGuard::new(session_id, token, handle)
    }
}
