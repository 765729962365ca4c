//! State synchronization with the shared store
//!
//! - `retry`: attempt ceiling, backoff and failure classification
//! - `mutator`: optimistic read-modify-write with bounded retry
//! - `guard`: RAII release of a live subscription
//! - `subscriber`: feeds change notifications into a session view

pub mod guard;
pub mod mutator;
pub mod retry;
pub mod subscriber;

pub use guard::SubscriptionGuard;
pub use mutator::{ConflictResolvingMutator, Mutation};
pub use retry::{FailureKind, RetryDecision, RetryPolicy};
pub use subscriber::ChangeSubscriber;
