//! Shared `ureq` plumbing.

use std::time::Duration;

use crate::error::ClientError;

const USER_AGENT: &str = concat!("vaultsync/", env!("CARGO_PKG_VERSION"));

pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Map a `ureq` call result onto [`ClientError`], keeping the response body
/// of non-2xx answers for the error message.
pub(crate) fn check(
    service: &'static str,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<ureq::Response, ClientError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(ClientError::status(service, status, body.trim()))
        }
        Err(ureq::Error::Transport(transport)) => Err(ClientError::Transport {
            service,
            message: transport.to_string(),
        }),
    }
}

pub(crate) fn read_body(service: &'static str, response: ureq::Response) -> Result<String, ClientError> {
    response
        .into_string()
        .map_err(|err| ClientError::decode(service, err))
}
