//! Session controller
//!
//! Owns the view of one entered session and wires the pieces together:
//! identity resolution on entry, the live subscription while inside, and
//! every user action through the conflict-resolving mutator.
//!
//! Entry sequence:
//!
//! ```text
//! unresolved -> validate id -> loading -> fetch snapshot
//!   -> resolve identity (best effort) -> subscribe -> fetch final snapshot
//!   -> awaiting-alias | active
//! ```
//!
//! An invalid id, a missing session, or a failed initial fetch ends in
//! not-found without touching anything else.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::card::VotingCard;
use super::repository_trait::SessionStore;
use super::session::{Session, parse_session_id};
use super::transition;
use super::view::{SessionView, ViewState};
use crate::domain::identity::alias_hints::AliasHints;
use crate::domain::identity::auth::{AuthProvider, ensure_identity};
use crate::domain::identity::resolver::{IdentityResolver, MigrationOutcome};
use crate::domain::sync::guard::SubscriptionGuard;
use crate::domain::sync::mutator::{ConflictResolvingMutator, Mutation};
use crate::domain::sync::retry::RetryPolicy;
use crate::domain::sync::subscriber::ChangeSubscriber;
use crate::error::{Error, Result};

/// Controller for one viewer of one session
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthProvider>,
    hints: Arc<dyn AliasHints>,
    resolver: IdentityResolver,
    mutator: ConflictResolvingMutator,
    view: Arc<RwLock<SessionView>>,
    subscription: Option<SubscriptionGuard>,
    last_migration: Option<MigrationOutcome>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        auth: Arc<dyn AuthProvider>,
        hints: Arc<dyn AliasHints>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(store.clone(), hints.clone()),
            mutator: ConflictResolvingMutator::new(store.clone(), policy),
            store,
            auth,
            hints,
            view: Arc::new(RwLock::new(SessionView::new(Uuid::nil()))),
            subscription: None,
            last_migration: None,
        }
    }

    /// Enter the session named by `raw_id`
    ///
    /// Fails only when no identity can be established; every other problem
    /// is reported through the returned state.
    pub async fn enter(&mut self, raw_id: &str) -> Result<ViewState> {
        self.leave().await;

        let user_id = ensure_identity(self.auth.as_ref()).await?;
        *self.view.write().await = SessionView::new(user_id);

        let session_id = match parse_session_id(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Rejected session id");
                self.view.write().await.mark_not_found();
                return Ok(ViewState::NotFound);
            }
        };
        self.view
            .write()
            .await
            .begin(session_id, self.hints.get(session_id));

        let snapshot = match self.store.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(self.not_found(session_id).await),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Initial snapshot fetch failed");
                return Ok(self.not_found(session_id).await);
            }
        };

        self.last_migration = Some(self.resolver.resolve(&snapshot, user_id).await);

        match self.store.subscribe(session_id).await {
            Ok(feed) => {
                let guard = ChangeSubscriber::spawn(session_id, feed, self.view.clone());
                self.subscription = Some(guard);
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "Live updates unavailable"),
        }

        let latest = match self.store.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.leave().await;
                return Ok(self.not_found(session_id).await);
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Final snapshot fetch failed, using initial one"
                );
                snapshot
            }
        };

        let mut view = self.view.write().await;
        view.apply_snapshot(latest);
        info!(session_id = %session_id, user_id = %user_id, state = %view.state, "Entered session");
        Ok(view.state)
    }

    /// Join with `alias`; the alias is remembered for this session
    ///
    /// Only possible while awaiting an alias. A joined identity keeps its
    /// alias and vote.
    pub async fn join(&self, alias: &str) -> Result<Session> {
        let (session_id, user_id) = self.loaded_ids().await?;
        if self.state().await == ViewState::Active {
            return Err(Error::InvalidInput("already joined this session".to_string()));
        }
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(Error::InvalidInput("alias must not be empty".to_string()));
        }

        let mutation = self
            .mutator
            .apply(session_id, "join", |s| transition::join(s, user_id, alias))
            .await?;
        // A slot created elsewhere keeps its own alias
        let joined_as = mutation
            .snapshot
            .participant(user_id)
            .map_or(alias, |p| p.alias.as_str());
        self.hints.set(session_id, joined_as);
        Ok(self.adopt(mutation).await)
    }

    /// Press `card`: plays it, or withdraws it if it is already played
    pub async fn vote(&self, card: VotingCard) -> Result<Session> {
        let (session_id, user_id, current) = {
            let view = self.view.read().await;
            if !view.is_active() {
                return Err(Error::NotParticipant);
            }
            let session_id = view.session_id.ok_or(Error::NotParticipant)?;
            (session_id, view.user_id, view.current_vote())
        };

        // Decided once from the local view so retries do not flip it back
        let intended = transition::toggle_vote(current, card);
        let mutation = self
            .mutator
            .apply(session_id, "vote", |s| transition::set_vote(s, user_id, intended))
            .await?;
        Ok(self.adopt(mutation).await)
    }

    pub async fn reveal(&self) -> Result<Session> {
        let (session_id, user_id) = self.facilitator_ids().await?;
        let mutation = self
            .mutator
            .apply(session_id, "reveal", |s| transition::reveal(s, user_id))
            .await?;
        Ok(self.adopt(mutation).await)
    }

    pub async fn reset(&self) -> Result<Session> {
        let (session_id, user_id) = self.facilitator_ids().await?;
        let mutation = self
            .mutator
            .apply(session_id, "reset", |s| transition::reset(s, user_id))
            .await?;
        Ok(self.adopt(mutation).await)
    }

    pub async fn set_ticket(&self, ticket: &str) -> Result<Session> {
        let (session_id, user_id) = self.facilitator_ids().await?;
        let mutation = self
            .mutator
            .apply(session_id, "set_ticket", |s| transition::set_ticket(s, user_id, ticket))
            .await?;
        Ok(self.adopt(mutation).await)
    }

    /// Type into the alias field; live updates leave the text alone
    pub async fn edit_alias(&self, alias: &str) {
        self.view.write().await.set_alias_input(alias);
    }

    /// Join with whatever the alias field holds, hint prefill included
    pub async fn submit_alias(&self) -> Result<Session> {
        let alias = self.view.read().await.alias_input.clone();
        self.join(&alias).await
    }

    /// Type into the facilitator's ticket field
    pub async fn edit_ticket(&self, ticket: &str) {
        self.view.write().await.set_ticket_draft(ticket);
    }

    /// Write the facilitator's ticket field to the session
    pub async fn submit_ticket(&self) -> Result<Session> {
        let draft = self.view.read().await.ticket_draft.clone();
        self.set_ticket(&draft).await
    }

    /// Copy of the current view
    pub async fn view(&self) -> SessionView {
        self.view.read().await.clone()
    }

    pub async fn state(&self) -> ViewState {
        self.view.read().await.state
    }

    /// Outcome of identity resolution on the last entry
    pub fn last_migration(&self) -> Option<&MigrationOutcome> {
        self.last_migration.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.is_active())
    }

    /// Release the subscription and forget the session
    pub async fn leave(&mut self) {
        if let Some(guard) = self.subscription.take() {
            let session_id = guard.session_id();
            guard.shutdown().await;
            info!(session_id = %session_id, "Left session");
        }
        let user_id = self.view.read().await.user_id;
        *self.view.write().await = SessionView::new(user_id);
        self.last_migration = None;
    }

    async fn not_found(&self, session_id: Uuid) -> ViewState {
        info!(session_id = %session_id, "Session not found");
        self.view.write().await.mark_not_found();
        ViewState::NotFound
    }

    async fn adopt(&self, mutation: Mutation) -> Session {
        self.view.write().await.apply_snapshot(mutation.snapshot.clone());
        mutation.snapshot
    }

    async fn loaded_ids(&self) -> Result<(Uuid, Uuid)> {
        let view = self.view.read().await;
        match (view.state, view.session_id) {
            (ViewState::AwaitingAlias | ViewState::Active, Some(id)) => Ok((id, view.user_id)),
            (_, Some(id)) => Err(Error::SessionNotFound(id)),
            (_, None) => Err(Error::InvalidInput("no session entered".to_string())),
        }
    }

    async fn facilitator_ids(&self) -> Result<(Uuid, Uuid)> {
        let ids = self.loaded_ids().await?;
        if !self.view.read().await.is_facilitator() {
            return Err(Error::NotFacilitator);
        }
        Ok(ids)
    }
}
