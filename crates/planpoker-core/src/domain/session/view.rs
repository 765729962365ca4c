//! Per-view session state
//!
//! One [`SessionView`] exists per entered session and is owned by the
//! controller; the change subscriber and the mutator both feed snapshots into
//! it through [`SessionView::apply_snapshot`].

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::card::VotingCard;
use super::session::{RoundPhase, Session};
use super::tally::VoteSummary;
use super::ticket::TicketDisplay;

/// Where a viewer is in the session entry flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    /// Identifier not yet validated
    Unresolved,
    /// Fetching the initial snapshot
    Loading,
    /// Identifier invalid or session absent; terminal
    NotFound,
    /// Snapshot present, viewer has no participant slot
    AwaitingAlias,
    /// Viewer holds a participant slot
    Active,
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Loading => "loading",
            Self::NotFound => "not-found",
            Self::AwaitingAlias => "awaiting-alias",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local view of one session for one identity
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Option<Uuid>,
    pub user_id: Uuid,
    pub state: ViewState,
    pub snapshot: Option<Session>,
    /// Alias text being entered before joining
    pub alias_input: String,
    /// Alias remembered locally for this session
    pub alias_hint: Option<String>,
    /// Ticket text being edited by the facilitator
    pub ticket_draft: String,
}

impl SessionView {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            session_id: None,
            user_id,
            state: ViewState::Unresolved,
            snapshot: None,
            alias_input: String::new(),
            alias_hint: None,
            ticket_draft: String::new(),
        }
    }

    /// Identifier validated; start loading
    pub fn begin(&mut self, session_id: Uuid, alias_hint: Option<String>) {
        self.session_id = Some(session_id);
        self.alias_hint = alias_hint;
        self.state = ViewState::Loading;
        self.snapshot = None;
    }

    /// Enter the terminal not-found state
    pub fn mark_not_found(&mut self) {
        self.state = ViewState::NotFound;
        self.snapshot = None;
    }

    /// Replace the local snapshot wholesale
    ///
    /// Snapshots for another session, older than the one held, or arriving
    /// after not-found are ignored. Returns whether the view changed.
    pub fn apply_snapshot(&mut self, session: Session) -> bool {
        if self.state == ViewState::NotFound || self.session_id != Some(session.id) {
            return false;
        }
        if let Some(current) = &self.snapshot {
            if session.revision < current.revision {
                return false;
            }
        }

        match session.participant(self.user_id) {
            Some(slot) => {
                self.state = ViewState::Active;
                self.alias_input = slot.alias.clone();
            }
            None => {
                self.state = ViewState::AwaitingAlias;
                if self.alias_input.is_empty() {
                    if let Some(hint) = &self.alias_hint {
                        self.alias_input = hint.clone();
                    }
                }
            }
        }

        // Only the facilitator's draft follows the store
        if session.is_facilitator(self.user_id) {
            self.ticket_draft = session.current_ticket.clone();
        }

        self.snapshot = Some(session);
        true
    }

    /// Edit the alias field locally
    pub fn set_alias_input(&mut self, alias: &str) {
        self.alias_input = alias.to_string();
    }

    /// Edit the ticket field locally
    pub fn set_ticket_draft(&mut self, ticket: &str) {
        self.ticket_draft = ticket.to_string();
    }

    pub fn is_facilitator(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.is_facilitator(self.user_id))
    }

    pub fn is_active(&self) -> bool {
        self.state == ViewState::Active
    }

    /// Vote currently held by this viewer
    pub fn current_vote(&self) -> Option<VotingCard> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.participant(self.user_id))
            .and_then(|p| p.vote)
    }

    /// Round phase, only observable while active
    pub fn phase(&self) -> Option<RoundPhase> {
        if !self.is_active() {
            return None;
        }
        self.snapshot.as_ref().map(Session::phase)
    }

    pub fn summary(&self) -> Option<VoteSummary> {
        self.snapshot.as_ref().map(VoteSummary::from_session)
    }

    pub fn ticket(&self) -> Option<TicketDisplay> {
        self.snapshot
            .as_ref()
            .filter(|s| !s.current_ticket.is_empty())
            .map(|s| TicketDisplay::parse(&s.current_ticket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::session::Participant;

    fn loaded_view(session: &Session, user: Uuid, hint: Option<&str>) -> SessionView {
        let mut view = SessionView::new(user);
        view.begin(session.id, hint.map(str::to_string));
        view
    }

    #[test]
    fn test_awaiting_alias_then_active() {
        let user = Uuid::new_v4();
        let mut session = Session::new("View", Uuid::new_v4());
        let mut view = loaded_view(&session, user, None);
        assert_eq!(view.state, ViewState::Loading);

        assert!(view.apply_snapshot(session.clone()));
        assert_eq!(view.state, ViewState::AwaitingAlias);
        assert_eq!(view.phase(), None);

        session.participants.insert(user, Participant::new("Sam"));
        session.revision = 1;
        view.apply_snapshot(session);
        assert_eq!(view.state, ViewState::Active);
        assert_eq!(view.alias_input, "Sam");
        assert_eq!(view.phase(), Some(RoundPhase::Voting));
    }

    #[test]
    fn test_alias_prefilled_only_when_empty() {
        let user = Uuid::new_v4();
        let session = Session::new("View", Uuid::new_v4());

        let mut view = loaded_view(&session, user, Some("Sam"));
        view.apply_snapshot(session.clone());
        assert_eq!(view.alias_input, "Sam");

        let mut typing = loaded_view(&session, user, Some("Sam"));
        typing.set_alias_input("Alex");
        typing.apply_snapshot(session);
        assert_eq!(typing.alias_input, "Alex");
    }

    #[test]
    fn test_ticket_draft_synced_for_facilitator_only() {
        let facilitator = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let mut session = Session::new("View", facilitator);
        session.current_ticket = "PAY-1".to_string();

        let mut own = loaded_view(&session, facilitator, None);
        own.set_ticket_draft("half typed");
        own.apply_snapshot(session.clone());
        assert_eq!(own.ticket_draft, "PAY-1");
        assert!(own.is_facilitator());

        let mut other = loaded_view(&session, viewer, None);
        other.set_ticket_draft("half typed");
        other.apply_snapshot(session);
        assert_eq!(other.ticket_draft, "half typed");
        assert!(!other.is_facilitator());
    }

    #[test]
    fn test_stale_and_foreign_snapshots_ignored() {
        let user = Uuid::new_v4();
        let mut session = Session::new("View", Uuid::new_v4());
        session.revision = 4;
        let mut view = loaded_view(&session, user, None);
        view.apply_snapshot(session.clone());

        let mut older = session.clone();
        older.revision = 3;
        older.votes_revealed = true;
        assert!(!view.apply_snapshot(older));
        assert!(!view.snapshot.as_ref().unwrap().votes_revealed);

        assert!(!view.apply_snapshot(Session::new("Other", user)));
    }

    #[test]
    fn test_not_found_is_terminal() {
        let session = Session::new("View", Uuid::new_v4());
        let mut view = loaded_view(&session, Uuid::new_v4(), None);
        view.mark_not_found();
        assert!(!view.apply_snapshot(session));
        assert_eq!(view.state, ViewState::NotFound);
    }

    #[test]
    fn test_current_vote_and_ticket() {
        let user = Uuid::new_v4();
        let mut session = Session::new("View", Uuid::new_v4());
        session.participants.insert(
            user,
            Participant {
                alias: "Sam".to_string(),
                vote: Some(VotingCard::Thirteen),
            },
        );
        session.current_ticket = "https://jira.example.com/browse/PAY-77".to_string();
        let mut view = loaded_view(&session, user, None);
        view.apply_snapshot(session);

        assert_eq!(view.current_vote(), Some(VotingCard::Thirteen));
        let ticket = view.ticket().unwrap();
        assert_eq!(ticket.ticket_name, "PAY-77");
        assert!(ticket.is_url);
    }
}
