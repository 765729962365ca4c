//! Change feed fan-out
//!
//! One broadcast channel per session id. Publishing sends the whole record;
//! receivers that fall behind skip straight to newer records, so only the
//! latest state is guaranteed to arrive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::repository_trait::SessionFeed;
use super::session::Session;

/// Default per-session channel capacity
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Per-session broadcast channels
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<Session>>>>,
    capacity: usize,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Open a receiver for `session_id`
    ///
    /// Channels whose receivers have all gone are dropped first.
    pub fn subscribe(&self, session_id: Uuid) -> SessionFeed {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Notify subscribers of `session`; returns how many receivers got it
    ///
    /// Channels without receivers are dropped.
    pub fn publish(&self, session: &Session) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(&session.id) else {
            return 0;
        };
        match sender.send(session.clone()) {
            Ok(receivers) => {
                debug!(
                    session_id = %session.id,
                    revision = session.revision,
                    receivers,
                    "Published session change"
                );
                receivers
            }
            Err(_) => {
                channels.remove(&session.id);
                0
            }
        }
    }

    /// Number of sessions with an open channel
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of live receivers for `session_id`
    pub fn subscriber_count(&self, session_id: Uuid) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(&session_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
