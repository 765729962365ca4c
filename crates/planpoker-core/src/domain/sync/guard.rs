//! Subscription guard for RAII-style release of a live session feed
//!
//! The guard cancels the consumer task when dropped, so leaving a session
//! releases its subscription on every exit path, including early returns
//! and panics.

use std::fmt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Handle to one running change subscriber
#[derive(Debug)]
pub struct SubscriptionGuard {
    session_id: Uuid,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SubscriptionGuard {
    pub(crate) fn new(session_id: Uuid, token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            session_id,
            token,
            handle: Some(handle),
        }
    }

    /// Session this subscription follows
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the consumer task is still running
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the subscription and wait for the consumer task to stop
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(session_id = %self.session_id, "Subscription shut down");
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            debug!(session_id = %self.session_id, "Subscription released");
        }
    }
}

impl fmt::Display for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription[{}]", self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn spawn_waiter(stopped: Arc<AtomicBool>) -> SubscriptionGuard {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            child.cancelled().await;
            stopped.store(true, Ordering::SeqCst);
        });
        SubscriptionGuard::new(Uuid::new_v4(), token, handle)
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let stopped = Arc::new(AtomicBool::new(false));
        let guard = spawn_waiter(stopped.clone());
        assert!(guard.is_active());

        guard.shutdown().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_cancels_task() {
        let stopped = Arc::new(AtomicBool::new(false));
        let token = {
            let guard = spawn_waiter(stopped.clone());
            guard.token.clone()
        };

        assert!(token.is_cancelled());
        // Give the task a chance to observe the cancellation
        for _ in 0..10 {
            if stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_display() {
        let guard = spawn_waiter(Arc::new(AtomicBool::new(false)));
        assert!(guard.to_string().starts_with("Subscription["));
    }
}
