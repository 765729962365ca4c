//! Lobby: creating sessions and validating session links

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::repository_trait::SessionStore;
use super::session::{DEFAULT_SESSION_TITLE, Session, parse_session_id};
use crate::domain::identity::auth::{AuthProvider, ensure_identity};
use crate::error::Result;

/// Entry point before a session is opened
#[derive(Clone)]
pub struct Lobby {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthProvider>,
    default_title: String,
}

impl Lobby {
    pub fn new(store: Arc<dyn SessionStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            store,
            auth,
            default_title: DEFAULT_SESSION_TITLE.to_string(),
        }
    }

    /// Use `title` for sessions created without one
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Create a session facilitated by the current identity
    pub async fn create_session(&self, title: &str) -> Result<Session> {
        let user_id = ensure_identity(self.auth.as_ref()).await?;
        let title = match title.trim() {
            "" => self.default_title.as_str(),
            trimmed => trimmed,
        };

        let session = self.store.create_session(title, user_id).await?;
        info!(session_id = %session.id, title = %session.title, "Session ready to share");
        Ok(session)
    }

    /// Validate a pasted session id before navigating to it
    pub fn parse_session_id(&self, raw: &str) -> Result<Uuid> {
        parse_session_id(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::auth::AnonymousAuth;
    use crate::domain::session::memory::InMemorySessionStore;
    use crate::error::Error;

    #[tokio::test]
    async fn test_create_uses_default_title() {
        let store = Arc::new(InMemorySessionStore::new());
        let lobby = Lobby::new(store.clone(), Arc::new(AnonymousAuth::new()));

        let session = lobby.create_session("   ").await.unwrap();
        assert_eq!(session.title, DEFAULT_SESSION_TITLE);
        assert!(session.participants.is_empty());
        assert!(!session.votes_revealed);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_configured_default_title() {
        let lobby = Lobby::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(AnonymousAuth::new()),
        )
        .with_default_title("Sprint Planning");

        assert_eq!(lobby.create_session("").await.unwrap().title, "Sprint Planning");
        assert_eq!(lobby.create_session(" Retro ").await.unwrap().title, "Retro");
    }

    #[tokio::test]
    async fn test_facilitator_is_current_identity() {
        let user = Uuid::new_v4();
        let lobby = Lobby::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(AnonymousAuth::with_user(user)),
        );
        assert_eq!(lobby.create_session("Mine").await.unwrap().created_by, user);
    }

    #[tokio::test]
    async fn test_create_requires_identity() {
        let store = Arc::new(InMemorySessionStore::new());
        let lobby = Lobby::new(store.clone(), Arc::new(AnonymousAuth::disabled()));

        let err = lobby.create_session("Nope").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(_)));
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_parse_session_id() {
        let lobby = Lobby::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(AnonymousAuth::new()),
        );
        let id = Uuid::new_v4();
        assert_eq!(lobby.parse_session_id(&format!(" {} ", id)).unwrap(), id);
        assert!(lobby.parse_session_id("sprint-42").is_err());
    }
}
