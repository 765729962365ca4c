//! Identity migration rules shared by store implementations
//!
//! Stores call these while holding whatever makes the write indivisible
//! (a write lock, a transaction); the rules themselves are pure.

use uuid::Uuid;

use super::session::{Participant, Session};
use crate::error::{Error, Result};

/// Re-key the slot owned by `old_id` to `new_id`, keeping its vote
pub fn migrate_participant(
    session: &mut Session,
    old_id: Uuid,
    new_id: Uuid,
    alias: &str,
) -> Result<()> {
    if old_id == new_id {
        return Err(Error::MigrationRejected(
            "old and new identity are the same".to_string(),
        ));
    }
    if session.participants.contains_key(&new_id) {
        return Err(Error::MigrationRejected(format!(
            "identity {} already has a slot in session {}",
            new_id, session.id
        )));
    }
    let Some(slot) = session.participants.remove(&old_id) else {
        return Err(Error::MigrationRejected(format!(
            "identity {} has no slot in session {}",
            old_id, session.id
        )));
    };

    session.participants.insert(
        new_id,
        Participant {
            alias: alias.to_string(),
            vote: slot.vote,
        },
    );
    session.revision += 1;
    Ok(())
}

/// Move facilitator rights from `old_id` to `new_id`
pub fn migrate_facilitator(session: &mut Session, old_id: Uuid, new_id: Uuid) -> Result<()> {
    if session.created_by != old_id {
        return Err(Error::MigrationRejected(format!(
            "identity {} is not the facilitator of session {}",
            old_id, session.id
        )));
    }
    session.created_by = new_id;
    session.revision += 1;
    Ok(())
}
