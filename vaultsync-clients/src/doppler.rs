//! Doppler vault client.
//!
//! Downloads the config's secrets in dotenv format:
//!
//! ```text
//! GET /v3/configs/config/secrets/download?format=env[&project=..&config=..]
//! Authorization: Bearer dp.st.…
//! ```

use std::time::Duration;

use vaultsync_core::config::{DopplerConfig, Secret, DOPPLER_TOKEN_PREFIX};
use vaultsync_core::ConfigError;
use vaultsync_sync::{SyncError, VaultSource};

use crate::http;

pub const DOPPLER_API_BASE: &str = "https://api.doppler.com";
const SERVICE: &str = "doppler";
const DOWNLOAD_PATH: &str = "/v3/configs/config/secrets/download";

pub struct DopplerClient {
    agent: ureq::Agent,
    base_url: String,
    token: Secret,
    project: Option<String>,
    config: Option<String>,
}

impl DopplerClient {
    /// Fails without touching the network when the token is blank or lacks
    /// the `dp.` prefix.
    pub fn new(config: &DopplerConfig, timeout: Duration) -> Result<Self, SyncError> {
        Self::with_base_url(config, timeout, DOPPLER_API_BASE)
    }

    pub fn with_base_url(
        config: &DopplerConfig,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, SyncError> {
        let token = config.token.expose().trim();
        if token.is_empty() {
            return Err(ConfigError::Missing {
                name: "DOPPLER_TOKEN",
            }
            .into());
        }
        if !token.starts_with(DOPPLER_TOKEN_PREFIX) {
            return Err(ConfigError::Invalid {
                name: "DOPPLER_TOKEN",
                reason: format!("expected a token starting with '{DOPPLER_TOKEN_PREFIX}'"),
            }
            .into());
        }

        Ok(Self {
            agent: http::agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Secret::new(token),
            project: config.project.clone(),
            config: config.config.clone(),
        })
    }

    fn download_url(&self) -> String {
        format!("{}{DOWNLOAD_PATH}", self.base_url)
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("format", "env")];
        if let Some(project) = &self.project {
            pairs.push(("project", project.as_str()));
        }
        if let Some(config) = &self.config {
            pairs.push(("config", config.as_str()));
        }
        pairs
    }
}

impl VaultSource for DopplerClient {
    fn fetch_payload(&self) -> Result<String, SyncError> {
        let mut request = self
            .agent
            .get(&self.download_url())
            .set("Authorization", &http::bearer(self.token.expose()))
            .set("Accept", "text/plain");
        for (name, value) in self.query_pairs() {
            request = request.query(name, value);
        }

        tracing::debug!("downloading secrets from {}", self.download_url());
        let response = http::check(SERVICE, request.call())?;
        Ok(http::read_body(SERVICE, response)?)
    }
}
