//! Authentication provider abstraction
//!
//! Token issuance lives outside this crate. The core only needs "who am I"
//! and a way to obtain an anonymous identity when nobody is signed in.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Source of the current ephemeral identity
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Identity of the signed-in user, if any
    async fn current_user(&self) -> Result<Option<Uuid>>;

    /// Obtain a fresh anonymous identity
    async fn sign_in_anonymously(&self) -> Result<Uuid>;
}

/// Resolve the current identity, signing in anonymously if needed
///
/// Any failure maps to [`Error::AuthenticationFailed`]; callers must not
/// touch the store without an identity.
pub async fn ensure_identity(auth: &dyn AuthProvider) -> Result<Uuid> {
    match auth.current_user().await {
        Ok(Some(user_id)) => return Ok(user_id),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read current user, signing in anonymously"),
    }

    auth.sign_in_anonymously().await.map_err(|e| match e {
        Error::AuthenticationFailed(_) => e,
        other => Error::AuthenticationFailed(other.to_string()),
    })
}

/// Local anonymous authentication
///
/// Hands out random identities. `reauthenticate` models a dropped connection
/// that comes back under a new identity.
#[derive(Debug)]
pub struct AnonymousAuth {
    user: RwLock<Option<Uuid>>,
    sign_in_enabled: bool,
}

impl Default for AnonymousAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonymousAuth {
    pub fn new() -> Self {
        Self {
            user: RwLock::new(None),
            sign_in_enabled: true,
        }
    }

    /// Start already signed in as `user_id`
    pub fn with_user(user_id: Uuid) -> Self {
        Self {
            user: RwLock::new(Some(user_id)),
            sign_in_enabled: true,
        }
    }

    /// A provider that refuses anonymous sign-in
    pub fn disabled() -> Self {
        Self {
            user: RwLock::new(None),
            sign_in_enabled: false,
        }
    }

    pub async fn sign_out(&self) {
        *self.user.write().await = None;
    }

    /// Drop the current identity and sign in under a new one
    pub async fn reauthenticate(&self) -> Result<Uuid> {
        self.sign_out().await;
        self.sign_in_anonymously().await
    }
}

#[async_trait]
impl AuthProvider for AnonymousAuth {
    async fn current_user(&self) -> Result<Option<Uuid>> {
        Ok(*self.user.read().await)
    }

    async fn sign_in_anonymously(&self) -> Result<Uuid> {
        if !self.sign_in_enabled {
            return Err(Error::AuthenticationFailed(
                "anonymous sign-in is disabled".to_string(),
            ));
        }
        let user_id = Uuid::new_v4();
        *self.user.write().await = Some(user_id);
        info!(user_id = %user_id, "Signed in anonymously");
        Ok(user_id)
    }
}
