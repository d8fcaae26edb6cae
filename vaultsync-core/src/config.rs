//! Startup configuration.
//!
//! Built once from an explicit key/value source and handed to every
//! collaborator constructor. Nothing below the binary reads the process
//! environment directly.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Prefix every Doppler token carries (`dp.st.`, `dp.sa.`, `dp.pt.`, …).
pub const DOPPLER_TOKEN_PREFIX: &str = "dp.";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DopplerConfig {
    pub token: Secret,
    pub project: Option<String>,
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailwayConfig {
    pub token: Secret,
    pub project_id: String,
    pub environment_id: String,
    pub service_id: String,
}

/// Recurring-mode cadence. Occurrences are computed in UTC.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Expression as configured.
    pub expression: String,
    pub schedule: cron::Schedule,
}

impl ScheduleConfig {
    /// Parse a cron expression. Five-field expressions (no seconds) are
    /// widened to fire at second zero.
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let trimmed = expression.trim();
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|err| ConfigError::Schedule {
                expression: trimmed.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushoverConfig {
    pub app_token: Secret,
    pub user_key: Secret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtfyConfig {
    pub server: String,
    pub topic: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub doppler: DopplerConfig,
    pub railway: RailwayConfig,
    /// `Some` selects scheduled mode; `None` runs a single cycle.
    pub schedule: Option<ScheduleConfig>,
    /// Compute and report only; never apply, restart or notify.
    pub dry_run: bool,
    /// Replace variable values with `***` in diff reports.
    pub mask_values: bool,
    pub http_timeout: Duration,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
    pub pushover: Option<PushoverConfig>,
    pub ntfy: Option<NtfyConfig>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Names and values that are not valid UTF-8 are converted lossily
    /// rather than aborting the process.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(lossy_vars(std::env::vars_os()))
    }

    /// Load configuration from explicit key/value pairs.
    ///
    /// Required:
    /// - `DOPPLER_TOKEN` (must start with `dp.`)
    /// - `RAILWAY_API_TOKEN`, `RAILWAY_PROJECT_ID`, `RAILWAY_ENVIRONMENT_ID`,
    ///   `RAILWAY_SERVICE_ID`
    ///
    /// Optional:
    /// - `DOPPLER_PROJECT`, `DOPPLER_CONFIG`
    /// - `SYNC_CRON`: enables scheduled mode; evaluated in UTC
    /// - `SYNC_DRY_RUN`, `SYNC_MASK_VALUES`: booleans, default false
    /// - `HTTP_TIMEOUT_SECS`: default 30
    /// - `LOG_FORMAT`: `text` (default) or `json`
    /// - `PUSHOVER_APP_TOKEN` + `PUSHOVER_USER_KEY`: enable Pushover together
    /// - `NTFY_TOPIC` (+ `NTFY_SERVER`, default `https://ntfy.sh`): enable ntfy
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = Vars(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );

        let doppler_token = vars.required("DOPPLER_TOKEN")?;
        if !doppler_token.starts_with(DOPPLER_TOKEN_PREFIX) {
            return Err(ConfigError::Invalid {
                name: "DOPPLER_TOKEN",
                reason: format!("expected a token starting with '{DOPPLER_TOKEN_PREFIX}'"),
            });
        }
        let doppler = DopplerConfig {
            token: Secret::new(doppler_token),
            project: vars.optional("DOPPLER_PROJECT"),
            config: vars.optional("DOPPLER_CONFIG"),
        };

        let railway = RailwayConfig {
            token: Secret::new(vars.required("RAILWAY_API_TOKEN")?),
            project_id: vars.required("RAILWAY_PROJECT_ID")?,
            environment_id: vars.required("RAILWAY_ENVIRONMENT_ID")?,
            service_id: vars.required("RAILWAY_SERVICE_ID")?,
        };

        let schedule = vars
            .optional("SYNC_CRON")
            .map(|expr| ScheduleConfig::parse(&expr))
            .transpose()?;

        let http_timeout = match vars.optional("HTTP_TIMEOUT_SECS") {
            None => DEFAULT_HTTP_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "HTTP_TIMEOUT_SECS",
                        reason: format!("expected a positive number of seconds, got '{raw}'"),
                    })
                }
            },
        };

        let log_json = match vars.optional("LOG_FORMAT").as_deref() {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected 'text' or 'json', got '{other}'"),
                })
            }
        };

        let pushover = match (
            vars.optional("PUSHOVER_APP_TOKEN"),
            vars.optional("PUSHOVER_USER_KEY"),
        ) {
            (Some(app_token), Some(user_key)) => Some(PushoverConfig {
                app_token: Secret::new(app_token),
                user_key: Secret::new(user_key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing { name: "PUSHOVER_USER_KEY" }),
            (None, Some(_)) => return Err(ConfigError::Missing { name: "PUSHOVER_APP_TOKEN" }),
        };

        let ntfy = vars.optional("NTFY_TOPIC").map(|topic| NtfyConfig {
            server: vars
                .optional("NTFY_SERVER")
                .unwrap_or_else(|| DEFAULT_NTFY_SERVER.to_string())
                .trim_end_matches('/')
                .to_string(),
            topic,
        });

        Ok(Self {
            doppler,
            railway,
            schedule,
            dry_run: vars.flag("SYNC_DRY_RUN")?,
            mask_values: vars.flag("SYNC_MASK_VALUES")?,
            http_timeout,
            log_json,
            pushover,
            ntfy,
        })
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }
}

struct Vars(HashMap<String, String>);

impl Vars {
    /// Trimmed, non-empty value.
    fn optional(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing { name })
    }

    fn flag(&self, name: &'static str) -> Result<bool, ConfigError> {
        match self.optional(name) {
            None => Ok(false),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name,
                    reason: format!("expected a boolean, got '{raw}'"),
                }),
            },
        }
    }
}

fn lossy_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter().map(|(key, value)| {
        (
            key.to_string_lossy().into_owned(),
            value.to_string_lossy().into_owned(),
        )
    })
}
