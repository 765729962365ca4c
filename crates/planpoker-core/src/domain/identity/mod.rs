//! Identity management
//!
//! - `auth`: who the current viewer is
//! - `alias_hints`: alias remembered locally per session
//! - `resolver`: carries a participant slot across re-authentication

pub mod alias_hints;
pub mod auth;
pub mod resolver;

pub use alias_hints::{AliasHints, MemoryAliasHints, hint_key};
pub use auth::{AnonymousAuth, AuthProvider, ensure_identity};
pub use resolver::{IdentityResolver, MigrationOutcome, PlannedMigration, plan_migration};
