//! Error types for vaultsync-clients.

use thiserror::Error;

use vaultsync_sync::SyncError;

/// Longest response body kept in an error message.
const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// DNS, connect, TLS or timeout failure.
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// A 2xx response whose body was not what the client expected.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// The GraphQL layer reported errors alongside a 2xx status.
    #[error("{service} GraphQL error: {message}")]
    GraphQl {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    pub(crate) fn status(service: &'static str, status: u16, body: &str) -> Self {
        let body = if body.chars().count() > MAX_BODY_CHARS {
            let cut: String = body.chars().take(MAX_BODY_CHARS).collect();
            format!("{cut}…")
        } else {
            body.to_string()
        };
        Self::Status {
            service,
            status,
            body,
        }
    }

    pub(crate) fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport { service, message } => SyncError::Transport { service, message },
            ClientError::Status { service, .. }
            | ClientError::Decode { service, .. }
            | ClientError::GraphQl { service, .. } => SyncError::Api {
                service,
                message: err.to_string(),
            },
        }
    }
}
