//! Error types for planpoker

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using planpoker's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Planpoker error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Session errors (E001-E099)
    #[error("Session '{0}' not found. Check the session link or create a new session.")]
    SessionNotFound(Uuid),

    #[error("Invalid session ID '{0}'. Session IDs are UUIDs like 123e4567-e89b-12d3-a456-426614174000.")]
    InvalidIdentifier(String),

    // Concurrency errors (E100-E199)
    #[error("Concurrent update detected: {0}")]
    Conflict(String),

    #[error("Store temporarily unavailable: {0}")]
    Transient(String),

    #[error("{operation} abandoned after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    // Identity errors (E200-E299)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Identity migration rejected: {0}")]
    MigrationRejected(String),

    // Permission errors (E300-E399)
    #[error("Only the facilitator can do that")]
    NotFacilitator,

    #[error("Join the session with an alias before voting")]
    NotParticipant,

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "E001",
            Self::InvalidIdentifier(_) => "E002",
            Self::Conflict(_) => "E100",
            Self::Transient(_) => "E101",
            Self::RetriesExhausted { .. } => "E102",
            Self::AuthenticationFailed(_) => "E200",
            Self::MigrationRejected(_) => "E201",
            Self::NotFacilitator => "E300",
            Self::NotParticipant => "E301",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Parse(_) => "E801",
            Self::Serialization(_) => "E802",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::SessionNotFound(_) | Self::InvalidIdentifier(_) => {
                Some("planpoker create --title <title>".to_string())
            }
            Self::NotParticipant => Some("planpoker join <session-id> --alias <name>".to_string()),
            Self::RetriesExhausted { .. } => Some("Try the action again".to_string()),
            Self::ConfigError(_) => Some("planpoker config show".to_string()),
            _ => None,
        }
    }

    /// The store detected a concurrent modification between read and write
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// A read or write failed for reasons unrelated to the request itself
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::DatabaseError(_) | Self::Io(_)
        )
    }

    /// Both "not found" flavours end the session view the same way
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::InvalidIdentifier(_))
    }
}
