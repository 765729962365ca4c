//! Session entity and related types
//!
//! Defines the shared session record every client reads and writes, the
//! embedded participant slots, and the partial-field update clients submit.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use super::card::VotingCard;
use crate::error::{Error, Result};

/// Title given to sessions created without one
pub const DEFAULT_SESSION_TITLE: &str = "New Planning Session";

static CANONICAL_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static UUID pattern")
});

/// Validate a session identifier before any store access
///
/// Only the canonical hyphenated form is accepted; braced, URN, and simple
/// forms are rejected like any other malformed input.
pub fn parse_session_id(raw: &str) -> Result<Uuid> {
    let trimmed = raw.trim();
    if !CANONICAL_UUID.is_match(trimmed) {
        return Err(Error::InvalidIdentifier(trimmed.to_string()));
    }
    Uuid::parse_str(trimmed).map_err(|_| Error::InvalidIdentifier(trimmed.to_string()))
}

/// Observable round phase while a viewer is active in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Votes are hidden
    Voting,
    /// Votes are visible to everyone
    Revealed,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voting => "voting",
            Self::Revealed => "revealed",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One identity's slot in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name chosen on join
    pub alias: String,

    /// Current vote, `None` when no card is played
    pub vote: Option<VotingCard>,
}

impl Participant {
    /// A freshly joined participant without a vote
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            vote: None,
        }
    }
}

/// The shared record of one voting room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: Uuid,

    /// Display title
    pub title: String,

    /// Identity of the facilitator
    pub created_by: Uuid,

    /// Whether the current round's votes are visible
    pub votes_revealed: bool,

    /// Work item being estimated
    pub current_ticket: String,

    /// Participant slots keyed by identity
    pub participants: BTreeMap<Uuid, Participant>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Store-assigned write counter used for conflict detection
    #[serde(default)]
    pub revision: u64,
}

impl Session {
    /// Create a new session owned by `created_by`
    ///
    /// A blank title falls back to [`DEFAULT_SESSION_TITLE`].
    pub fn new(title: &str, created_by: Uuid) -> Self {
        let title = title.trim();
        Self {
            id: Uuid::new_v4(),
            title: if title.is_empty() {
                DEFAULT_SESSION_TITLE.to_string()
            } else {
                title.to_string()
            },
            created_by,
            votes_revealed: false,
            current_ticket: String::new(),
            participants: BTreeMap::new(),
            created_at: Utc::now(),
            revision: 0,
        }
    }

    /// Check whether `user_id` is the facilitator
    pub fn is_facilitator(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    /// Get the participant slot for `user_id`
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.get(&user_id)
    }

    /// Check whether `user_id` has joined
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains_key(&user_id)
    }

    /// Find the identity holding `alias`
    ///
    /// Aliases are not unique; the first match in key order wins.
    pub fn find_by_alias(&self, alias: &str) -> Option<Uuid> {
        self.participants
            .iter()
            .find(|(_, p)| p.alias == alias)
            .map(|(id, _)| *id)
    }

    /// Current round phase
    pub fn phase(&self) -> RoundPhase {
        if self.votes_revealed {
            RoundPhase::Revealed
        } else {
            RoundPhase::Voting
        }
    }
}

/// A partial-field write against one session
///
/// `None` fields are left untouched. `expected_revision` turns the write
/// into a compare-and-set: the store rejects it with [`Error::Conflict`]
/// when the stored revision has moved on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub participants: Option<BTreeMap<Uuid, Participant>>,
    pub votes_revealed: Option<bool>,
    pub current_ticket: Option<String>,
    pub expected_revision: Option<u64>,
}

impl SessionUpdate {
    /// An update that replaces the participant map
    pub fn participants(participants: BTreeMap<Uuid, Participant>) -> Self {
        Self {
            participants: Some(participants),
            ..Default::default()
        }
    }

    /// Require the stored revision to equal `revision`
    pub fn expecting(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    /// True when the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.participants.is_none()
            && self.votes_revealed.is_none()
            && self.current_ticket.is_none()
    }

    /// Check the compare-and-set precondition against `session`
    pub fn check_revision(&self, session: &Session) -> Result<()> {
        match self.expected_revision {
            Some(expected) if expected != session.revision => Err(Error::Conflict(format!(
                "session {} is at revision {}, write was based on {}",
                session.id, session.revision, expected
            ))),
            _ => Ok(()),
        }
    }

    /// Apply the update to `session` and advance its revision
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(participants) = &self.participants {
            session.participants = participants.clone();
        }
        if let Some(revealed) = self.votes_revealed {
            session.votes_revealed = revealed;
        }
        if let Some(ticket) = &self.current_ticket {
            session.current_ticket = ticket.clone();
        }
        session.revision += 1;
    }
}
