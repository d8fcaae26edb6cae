//! Error types for vaultsync-core.

use thiserror::Error;

/// Startup configuration is missing or malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("missing required configuration: {name}")]
    Missing { name: &'static str },

    /// A variable is present but its value is unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// `SYNC_CRON` could not be parsed as a cron expression.
    #[error("invalid cron expression '{expression}': {reason}")]
    Schedule { expression: String, reason: String },
}

/// The desired-state payload is not valid dotenv text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unterminated {quote} quoted value for '{key}'")]
    UnterminatedQuote { line: usize, key: String, quote: char },

    #[error("line {line}: expected KEY=VALUE assignment")]
    NotAnAssignment { line: usize },
}
