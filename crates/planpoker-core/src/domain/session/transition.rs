//! Session transitions
//!
//! Each function inspects a snapshot and returns the [`SessionUpdate`] that
//! performs the transition on top of it. They never touch the store; the
//! mutator calls them against a freshly fetched snapshot on every attempt.
//! An empty update means the transition is a no-op for that snapshot.

use uuid::Uuid;

use super::card::VotingCard;
use super::session::{Participant, Session, SessionUpdate};
use crate::error::{Error, Result};

/// Vote a viewer intends to submit after pressing `card`
///
/// Pressing the card already played withdraws the vote.
pub fn toggle_vote(current: Option<VotingCard>, card: VotingCard) -> Option<VotingCard> {
    if current == Some(card) { None } else { Some(card) }
}

/// Join with `alias`
///
/// The alias is set once per identity: an identity that already holds a
/// slot gets an empty update, so its alias and vote survive.
pub fn join(session: &Session, user_id: Uuid, alias: &str) -> Result<SessionUpdate> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(Error::InvalidInput("alias must not be empty".to_string()));
    }
    if session.is_participant(user_id) {
        return Ok(SessionUpdate::default());
    }

    let mut participants = session.participants.clone();
    participants.insert(user_id, Participant::new(alias));
    Ok(SessionUpdate::participants(participants))
}

/// Replace the vote held by `user_id`
pub fn set_vote(
    session: &Session,
    user_id: Uuid,
    vote: Option<VotingCard>,
) -> Result<SessionUpdate> {
    let Some(current) = session.participant(user_id) else {
        return Err(Error::NotParticipant);
    };
    if current.vote == vote {
        return Ok(SessionUpdate::default());
    }

    let mut participants = session.participants.clone();
    if let Some(slot) = participants.get_mut(&user_id) {
        slot.vote = vote;
    }
    Ok(SessionUpdate::participants(participants))
}

/// Expose all votes
pub fn reveal(session: &Session, user_id: Uuid) -> Result<SessionUpdate> {
    ensure_facilitator(session, user_id)?;
    if session.votes_revealed {
        return Ok(SessionUpdate::default());
    }
    Ok(SessionUpdate {
        votes_revealed: Some(true),
        ..Default::default()
    })
}

/// Start a fresh round: clear every vote, hide votes, clear the ticket
pub fn reset(session: &Session, user_id: Uuid) -> Result<SessionUpdate> {
    ensure_facilitator(session, user_id)?;

    let participants = session
        .participants
        .iter()
        .map(|(id, p)| {
            (
                *id,
                Participant {
                    alias: p.alias.clone(),
                    vote: None,
                },
            )
        })
        .collect();

    Ok(SessionUpdate {
        participants: Some(participants),
        votes_revealed: Some(false),
        current_ticket: Some(String::new()),
        expected_revision: None,
    })
}

/// Set the work item label
pub fn set_ticket(session: &Session, user_id: Uuid, ticket: &str) -> Result<SessionUpdate> {
    ensure_facilitator(session, user_id)?;
    let ticket = ticket.trim();
    if session.current_ticket == ticket {
        return Ok(SessionUpdate::default());
    }
    Ok(SessionUpdate {
        current_ticket: Some(ticket.to_string()),
        ..Default::default()
    })
}

fn ensure_facilitator(session: &Session, user_id: Uuid) -> Result<()> {
    if session.is_facilitator(user_id) {
        Ok(())
    } else {
        Err(Error::NotFacilitator)
    }
}
