//! Error types for vaultsync-sync.

use thiserror::Error;

use vaultsync_core::{ConfigError, ParseError};

/// All errors a sync cycle or one of its collaborators can raise.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credentials or identifiers are missing or malformed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The vault payload is not valid dotenv text.
    #[error("failed to parse vault payload: {0}")]
    Parse(#[from] ParseError),

    /// The request never produced a usable response.
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The service answered, but with an error or an unexpected body.
    #[error("{service} rejected the request: {message}")]
    Api {
        service: &'static str,
        message: String,
    },
}
