//! Domain layer
//!
//! Contains the session model, identity handling and store synchronization.

pub mod identity;
pub mod session;
pub mod sync;
