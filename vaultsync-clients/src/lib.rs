//! HTTP collaborators for the sync pipeline.
//!
//! - [`doppler`]: vault: downloads the desired dotenv payload
//! - [`railway`]: platform: reads, upserts and redeploys via GraphQL
//! - [`pushover`], [`ntfy`]: notification providers
//!
//! All clients are blocking (`ureq`) and share one timeout policy.

pub mod doppler;
pub mod error;
mod http;
pub mod ntfy;
pub mod pushover;
pub mod railway;

use std::sync::Arc;

use vaultsync_core::Config;
use vaultsync_sync::{NotificationDispatcher, NotificationProvider, SyncError, SyncOptions, SyncPipeline};

pub use doppler::DopplerClient;
pub use error::ClientError;
pub use ntfy::NtfyClient;
pub use pushover::PushoverClient;
pub use railway::RailwayClient;

/// Providers enabled by configuration presence, in a fixed order.
pub fn notifiers_from_config(config: &Config) -> NotificationDispatcher {
    let mut providers: Vec<Box<dyn NotificationProvider>> = Vec::new();
    if let Some(pushover) = &config.pushover {
        providers.push(Box::new(PushoverClient::new(pushover, config.http_timeout)));
    }
    if let Some(ntfy) = &config.ntfy {
        providers.push(Box::new(NtfyClient::new(ntfy, config.http_timeout)));
    }
    NotificationDispatcher::new(providers)
}

/// Wire the Doppler, Railway and notification clients into a pipeline.
pub fn pipeline_from_config(config: &Config) -> Result<SyncPipeline, SyncError> {
    let vault = DopplerClient::new(&config.doppler, config.http_timeout)?;
    let platform = RailwayClient::new(&config.railway, config.http_timeout);
    Ok(SyncPipeline::new(
        Arc::new(vault),
        Arc::new(platform),
        notifiers_from_config(config),
        SyncOptions::from(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &[(&'static str, &'static str)]) -> Config {
        let mut vars = vec![
            ("DOPPLER_TOKEN", "dp.st.prd.token"),
            ("RAILWAY_API_TOKEN", "rw"),
            ("RAILWAY_PROJECT_ID", "p"),
            ("RAILWAY_ENVIRONMENT_ID", "e"),
            ("RAILWAY_SERVICE_ID", "s"),
        ];
        vars.extend_from_slice(extra);
        Config::from_vars(vars).expect("config")
    }

    #[test]
    fn no_provider_configured_yields_empty_dispatcher() {
        assert!(notifiers_from_config(&config(&[])).is_empty());
    }

    #[test]
    fn providers_follow_configuration_presence() {
        let dispatcher = notifiers_from_config(&config(&[
            ("PUSHOVER_APP_TOKEN", "a"),
            ("PUSHOVER_USER_KEY", "u"),
            ("NTFY_TOPIC", "deploys"),
        ]));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn pipeline_builds_from_valid_config() {
        let pipeline = pipeline_from_config(&config(&[("SYNC_DRY_RUN", "yes")])).expect("pipeline");
        assert!(pipeline.options().dry_run);
    }
}
