//! Planpoker Core Library
//!
//! This crate provides the core functionality for planpoker, including:
//! - Session model, card set and round transitions
//! - Shared session stores (in-memory and SQLite) with change notifications
//! - Identity resolution across re-authentication
//! - Optimistic writes with conflict detection and bounded retry
//! - Live session views fed by change subscriptions

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::identity::{AliasHints, AnonymousAuth, AuthProvider, MemoryAliasHints};
    pub use crate::domain::session::{
        InMemorySessionStore, Lobby, Session, SessionController, SessionStore, SessionView,
        SqliteSessionStore, ViewState, VoteSummary, VotingCard,
    };
    pub use crate::domain::sync::RetryPolicy;
    pub use crate::error::{Error, Result};
}
