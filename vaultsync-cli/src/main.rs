//! vaultsync: keep a Railway service's variables in step with Doppler.
//!
//! # Usage
//!
//! ```text
//! vaultsync    # one cycle, or a cron schedule when SYNC_CRON is set
//! ```
//!
//! Takes no flags: every setting comes from the environment (see
//! `Config::from_vars`). Exits 1 on any error in single-shot mode, including
//! an unexpected command-line argument.

mod output;

use anyhow::{Context, Result};
use clap::Parser;

use vaultsync_clients::pipeline_from_config;
use vaultsync_core::Config;
use vaultsync_daemon::{init_tracing, start_blocking};

#[derive(Parser, Debug)]
#[command(
    name = "vaultsync",
    version,
    about = "Sync Doppler secrets into a Railway service's environment variables",
    long_about = None,
)]
struct Cli {}

fn main() -> Result<()> {
    if let Err(err) = Cli::try_parse() {
        // --help and --version
        if !err.use_stderr() {
            err.exit();
        }
        let _ = err.print();
        std::process::exit(1);
    }

    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_json);
    let pipeline = pipeline_from_config(&config).context("failed to set up sync clients")?;

    match config.schedule.clone() {
        Some(schedule) => start_blocking(pipeline, schedule).context("scheduler stopped")?,
        None => {
            let outcome = pipeline.run().context("sync failed")?;
            output::print_outcome(&outcome);
        }
    }
    Ok(())
}
