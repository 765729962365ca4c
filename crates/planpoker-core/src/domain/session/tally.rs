//! Derived read-only values computed from a session snapshot

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::card::VotingCard;
use super::session::{Participant, Session};

/// Vote statistics for the current round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteSummary {
    /// Number of participants per played card
    pub counts: BTreeMap<VotingCard, usize>,

    /// Mean of numeric votes, `None` when nobody played a numeric card
    pub average: Option<f64>,

    /// Every voting member has a vote
    pub all_voted: bool,
}

impl VoteSummary {
    pub fn from_session(session: &Session) -> Self {
        Self {
            counts: vote_counts(session),
            average: average_vote(session),
            all_voted: all_voted(session),
        }
    }

    /// Average with two decimals, or "-" when undefined
    pub fn format_average(&self) -> String {
        match self.average {
            Some(avg) => format!("{:.2}", avg),
            None => "-".to_string(),
        }
    }
}

/// Participants expected to vote: everyone except the facilitator
pub fn voting_members(session: &Session) -> Vec<(Uuid, &Participant)> {
    session
        .participants
        .iter()
        .filter(|(id, _)| **id != session.created_by)
        .map(|(id, p)| (*id, p))
        .collect()
}

/// True iff at least one voting member exists and all of them voted
pub fn all_voted(session: &Session) -> bool {
    let members = voting_members(session);
    !members.is_empty() && members.iter().all(|(_, p)| p.vote.is_some())
}

/// Group played cards
pub fn vote_counts(session: &Session) -> BTreeMap<VotingCard, usize> {
    let mut counts = BTreeMap::new();
    for vote in session.participants.values().filter_map(|p| p.vote) {
        *counts.entry(vote).or_insert(0) += 1;
    }
    counts
}

/// Mean over numeric cards; "?" and "☕" are ignored
pub fn average_vote(session: &Session) -> Option<f64> {
    let points: Vec<u32> = session
        .participants
        .values()
        .filter_map(|p| p.vote.and_then(|v| v.points()))
        .collect();

    if points.is_empty() {
        return None;
    }
    let sum: u32 = points.iter().sum();
    Some(f64::from(sum) / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_votes(votes: &[Option<VotingCard>]) -> Session {
        let mut session = Session::new("Tally", Uuid::new_v4());
        for (i, vote) in votes.iter().enumerate() {
            session.participants.insert(
                Uuid::new_v4(),
                Participant {
                    alias: format!("p{}", i),
                    vote: *vote,
                },
            );
        }
        session
    }

    #[test]
    fn test_average_ignores_non_numeric() {
        let session = session_with_votes(&[
            Some(VotingCard::Three),
            Some(VotingCard::Five),
            Some(VotingCard::Unsure),
        ]);
        let summary = VoteSummary::from_session(&session);
        assert_eq!(summary.average, Some(4.0));
        assert_eq!(summary.format_average(), "4.00");
    }

    #[test]
    fn test_average_undefined_without_numeric_votes() {
        let session = session_with_votes(&[Some(VotingCard::Unsure), Some(VotingCard::Coffee)]);
        assert_eq!(average_vote(&session), None);
        assert_eq!(VoteSummary::from_session(&session).format_average(), "-");

        let empty = session_with_votes(&[None, None]);
        assert_eq!(average_vote(&empty), None);
    }

    #[test]
    fn test_vote_counts() {
        let session = session_with_votes(&[
            Some(VotingCard::Five),
            Some(VotingCard::Eight),
            Some(VotingCard::Five),
            None,
        ]);
        let counts = vote_counts(&session);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&VotingCard::Five], 2);
        assert_eq!(counts[&VotingCard::Eight], 1);
    }

    #[test]
    fn test_all_voted_excludes_facilitator() {
        let mut session = session_with_votes(&[Some(VotingCard::Two), Some(VotingCard::Three)]);
        session
            .participants
            .insert(session.created_by, Participant::new("Facilitator"));

        assert_eq!(voting_members(&session).len(), 2);
        assert!(all_voted(&session));
    }

    #[test]
    fn test_all_voted_false_when_missing_vote_or_empty() {
        let session = session_with_votes(&[Some(VotingCard::Two), None]);
        assert!(!all_voted(&session));

        let mut only_facilitator = Session::new("Solo", Uuid::new_v4());
        only_facilitator.participants.insert(
            only_facilitator.created_by,
            Participant {
                alias: "Host".to_string(),
                vote: Some(VotingCard::One),
            },
        );
        assert!(!all_voted(&only_facilitator));
    }
}
