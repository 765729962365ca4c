//! Session domain module
//!
//! The shared session record and everything that reads or writes it.
//!
//! # Architecture
//!
//! - **Entities**: `Session`, `Participant`, `SessionUpdate`, `VotingCard`
//! - **Rules**: pure transitions (`transition`) and migrations (`migration`)
//! - **Derived values**: `VoteSummary`, `TicketDisplay`
//! - **Store**: the `SessionStore` trait, with in-memory and SQLite backends
//!   sharing a `ChangeFeed` for notifications
//! - **Client side**: `Lobby`, `SessionView` and `SessionController`
//!
//! # Example
//!
//! ```ignore
//! use planpoker_core::domain::session::{Lobby, SessionController, VotingCard};
//!
//! let session = lobby.create_session("Sprint 42").await?;
//!
//! let mut controller = SessionController::new(store, auth, hints, policy);
//! controller.enter(&session.id.to_string()).await?;
//! controller.join("Sam").await?;
//! controller.vote(VotingCard::Five).await?;
//!
//! // Facilitator only
//! controller.reveal().await?;
//! controller.reset().await?;
//!
//! controller.leave().await;
//! ```

pub mod card;
pub mod controller;
pub mod feed;
pub mod lobby;
pub mod memory;
pub mod migration;
pub mod repository;
pub mod repository_trait;
pub mod session;
pub mod tally;
pub mod ticket;
pub mod transition;
pub mod view;

// Re-export main types
pub use card::VotingCard;
pub use controller::SessionController;
pub use feed::{ChangeFeed, DEFAULT_FEED_CAPACITY};
pub use lobby::Lobby;
pub use memory::InMemorySessionStore;
pub use repository::SqliteSessionStore;
pub use repository_trait::{SessionFeed, SessionStore};
pub use session::{
    DEFAULT_SESSION_TITLE, Participant, RoundPhase, Session, SessionUpdate, parse_session_id,
};
pub use tally::VoteSummary;
pub use ticket::TicketDisplay;
pub use view::{SessionView, ViewState};
