use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use vaultsync_core::config::ScheduleConfig;
use vaultsync_sync::{SyncOutcome, SyncPipeline};

use crate::error::{io_err, join_err, DaemonError};
use crate::schedule::{Cadence, ScheduleGuard, SYNC_JOB_NAME};

/// Build a multi-thread runtime and run the schedule until Ctrl-C.
///
/// Returns as soon as the schedule is stopped; a cycle still running on the
/// blocking pool is abandoned with the runtime.
pub fn start_blocking(pipeline: SyncPipeline, schedule: ScheduleConfig) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let result = runtime.block_on(run_scheduled(pipeline, schedule));
    runtime.shutdown_background();
    result
}

/// Arm the cron schedule and wait for a shutdown signal.
///
/// A cycle already in flight when the signal arrives is not awaited.
pub async fn run_scheduled(
    pipeline: SyncPipeline,
    schedule: ScheduleConfig,
) -> Result<(), DaemonError> {
    let dry_run = pipeline.options().dry_run;
    let guard = ScheduleGuard::new(SYNC_JOB_NAME, sync_job(pipeline));
    tracing::info!(schedule = %schedule.expression, dry_run, "scheduled mode armed");
    let handle = guard.start(Cadence::Cron(schedule.schedule));

    shutdown_signal().await?;
    tracing::info!("shutdown requested, stopping schedule");
    handle.stop().await
}

/// Run one cycle on the blocking pool.
pub async fn run_cycle(pipeline: SyncPipeline) -> Result<SyncOutcome, DaemonError> {
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .map_err(|e| join_err("sync", e))??;
    log_outcome(&outcome, started.elapsed());
    Ok(outcome)
}

/// Job body for the schedule guard: each tick gets its own pipeline clone.
fn sync_job(
    pipeline: SyncPipeline,
) -> impl Fn() -> Pin<Box<dyn Future<Output = Result<(), DaemonError>> + Send>> + Send + Sync + 'static
{
    move || {
        let pipeline = pipeline.clone();
        Box::pin(async move { run_cycle(pipeline).await.map(|_| ()) })
    }
}

fn log_outcome(outcome: &SyncOutcome, elapsed: Duration) {
    let duration_ms = elapsed.as_millis();
    match outcome {
        SyncOutcome::InSync => {
            tracing::info!(duration_ms, "already in sync, nothing to apply");
        }
        SyncOutcome::DryRun { diff } => tracing::info!(
            added = diff.to_add.len(),
            updated = diff.to_update.len(),
            deleted = diff.to_delete.len(),
            duration_ms,
            "dry run complete",
        ),
        SyncOutcome::Applied(applied) => {
            let delivered = applied
                .notifications
                .iter()
                .filter(|o| o.is_delivered())
                .count();
            tracing::info!(
                added = applied.diff.to_add.len(),
                updated = applied.diff.to_update.len(),
                deleted = applied.diff.to_delete.len(),
                restarted = applied.restart.acknowledged,
                notified = delivered,
                duration_ms,
                "sync applied",
            );
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(|e| io_err("ctrl-c handler", e)),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| io_err("ctrl-c handler", e))
}

/// Install the global subscriber. Honors `RUST_LOG`; defaults to `info`.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use vaultsync_core::Snapshot;
    use vaultsync_sync::{
        ApplyResult, NotificationDispatcher, PlatformTarget, RestartResult, SyncError,
        SyncOptions, VaultSource,
    };

    use super::*;
    use crate::schedule::TickOutcome;

    struct StaticVault(&'static str);

    impl VaultSource for StaticVault {
        fn fetch_payload(&self) -> Result<String, SyncError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct FlakyPlatform {
        reads: AtomicUsize,
        fail_first_read: bool,
    }

    impl PlatformTarget for FlakyPlatform {
        fn current_snapshot(&self) -> Result<Snapshot, SyncError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 && self.fail_first_read {
                return Err(SyncError::Transport {
                    service: "railway",
                    message: "connection reset".to_string(),
                });
            }
            Ok(Snapshot::from_pairs([("A", "1")]))
        }

        fn apply_variables(&self, snapshot: &Snapshot) -> Result<ApplyResult, SyncError> {
            Ok(ApplyResult {
                submitted: snapshot.len(),
                acknowledged: true,
            })
        }

        fn restart_service(&self) -> Result<RestartResult, SyncError> {
            Ok(RestartResult { acknowledged: true })
        }
    }

    fn pipeline(payload: &'static str, platform: Arc<FlakyPlatform>) -> SyncPipeline {
        SyncPipeline::new(
            Arc::new(StaticVault(payload)),
            platform,
            NotificationDispatcher::default(),
            SyncOptions::default(),
        )
    }

    #[tokio::test]
    async fn cycle_runs_on_blocking_pool() {
        let platform = Arc::new(FlakyPlatform::default());
        let outcome = tokio_test::assert_ok!(run_cycle(pipeline("A=1", platform.clone())).await);
        assert_eq!(outcome, SyncOutcome::InSync);
        assert_eq!(platform.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cycle_error_surfaces_as_sync_error() {
        let platform = Arc::new(FlakyPlatform {
            fail_first_read: true,
            ..Default::default()
        });
        let err = tokio_test::assert_err!(run_cycle(pipeline("A=1", platform)).await);
        assert!(matches!(
            err,
            DaemonError::Sync(SyncError::Transport { service: "railway", .. })
        ));
    }

    #[tokio::test]
    async fn scheduled_job_recovers_after_failed_cycle() {
        let platform = Arc::new(FlakyPlatform {
            fail_first_read: true,
            ..Default::default()
        });
        let guard = ScheduleGuard::new(SYNC_JOB_NAME, sync_job(pipeline("A=2", platform.clone())));

        for _ in 0..2 {
            let TickOutcome::Started(run) = guard.tick() else {
                panic!("idle guard must start a run");
            };
            run.await.expect("job errors stay inside the tick");
        }
        assert_eq!(platform.reads.load(Ordering::SeqCst), 2);
    }
}
