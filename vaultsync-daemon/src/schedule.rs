//! Schedule guard: fires a job on a cadence, never more than one run at a
//! time, and keeps going whatever a run returns.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{join_err, DaemonError};

pub const SYNC_JOB_NAME: &str = "vaultsync";

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// When the next tick fires.
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Evaluated against UTC wall-clock time.
    Cron(cron::Schedule),
    /// Fixed period, used to drive the guard under paused test time.
    #[cfg(test)]
    Every(Duration),
}

impl Cadence {
    /// Delay from `now` until the next tick, or `None` if the schedule has
    /// no future occurrence.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Cadence::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
            #[cfg(test)]
            Cadence::Every(period) => Some(*period),
        }
    }
}

// ---------------------------------------------------------------------------
// Overrun guard
// ---------------------------------------------------------------------------

/// Mutual-exclusion flag shared by every tick of one schedule.
#[derive(Debug, Clone, Default)]
pub struct OverrunGuard {
    running: Arc<AtomicBool>,
}

impl OverrunGuard {
    /// Claim the flag, or `None` if a run is already in flight.
    pub fn try_begin(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the [`OverrunGuard`] when dropped, including on panic.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Schedule guard
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum TickOutcome {
    /// A run was spawned; the handle resolves when it finishes.
    Started(JoinHandle<()>),
    /// The previous run is still in flight; this tick was dropped.
    Skipped,
}

pub struct ScheduleGuard<J> {
    job_name: &'static str,
    job: Arc<J>,
    overrun: OverrunGuard,
}

impl<J, Fut> ScheduleGuard<J>
where
    J: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DaemonError>> + Send + 'static,
{
    pub fn new(job_name: &'static str, job: J) -> Self {
        Self {
            job_name,
            job: Arc::new(job),
            overrun: OverrunGuard::default(),
        }
    }

    pub fn job_name(&self) -> &'static str {
        self.job_name
    }

    pub fn is_running(&self) -> bool {
        self.overrun.is_running()
    }

    /// Handle one tick: spawn the job unless a previous run is in flight.
    ///
    /// Errors returned by the job are logged and dropped.
    pub fn tick(&self) -> TickOutcome {
        let Some(permit) = self.overrun.try_begin() else {
            tracing::warn!(job = self.job_name, "previous run still in progress, skipping tick");
            return TickOutcome::Skipped;
        };

        let job = self.job.clone();
        let job_name = self.job_name;
        TickOutcome::Started(tokio::spawn(async move {
            let _permit = permit;
            let started_at = Utc::now();
            match job().await {
                Ok(()) => tracing::debug!(job = job_name, "scheduled run finished"),
                Err(err) => tracing::error!(
                    job = job_name,
                    started_at = %started_at.to_rfc3339(),
                    failed_at = %Utc::now().to_rfc3339(),
                    error = %err,
                    "scheduled run failed",
                ),
            }
        }))
    }

    /// Arm the schedule. The returned handle is the only way to stop it.
    pub fn start(self, cadence: Cadence) -> ScheduleHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let job_name = self.job_name;

        let task = tokio::spawn(async move {
            loop {
                let Some(delay) = cadence.next_delay(Utc::now()) else {
                    tracing::warn!(job = self.job_name, "schedule has no upcoming ticks");
                    break;
                };
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(delay) => {
                        let _ = self.tick();
                    }
                }
            }
            tracing::debug!(job = self.job_name, "schedule loop exited");
        });

        ScheduleHandle {
            job_name,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Ownership handle for an armed schedule.
#[derive(Debug)]
pub struct ScheduleHandle {
    job_name: &'static str,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    pub fn job_name(&self) -> &'static str {
        self.job_name
    }

    /// Cancel future ticks and wait for the schedule loop to exit.
    ///
    /// A run already in flight is left to finish on its own.
    pub async fn stop(self) -> Result<(), DaemonError> {
        let _ = self.shutdown.send(());
        self.task.await.map_err(|err| join_err("scheduler", err))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;

    use chrono::TimeZone;
    use tokio::sync::Notify;
    use vaultsync_sync::SyncError;

    use super::*;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn injected_failure() -> DaemonError {
        DaemonError::Sync(SyncError::Transport {
            service: "railway",
            message: "injected".to_string(),
        })
    }

    #[test]
    fn permit_release_clears_flag() {
        let guard = OverrunGuard::default();
        let permit = guard.try_begin().expect("first claim");
        assert!(guard.is_running());
        assert!(guard.try_begin().is_none());
        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn cron_cadence_waits_until_next_occurrence() {
        let schedule = cron::Schedule::from_str("0 */5 * * * *").expect("cron");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 3, 30).unwrap();
        let delay = Cadence::Cron(schedule).next_delay(now).expect("delay");
        assert_eq!(delay, Duration::from_secs(90));
    }

    #[test]
    fn cron_hours_are_utc_hours() {
        let schedule = cron::Schedule::from_str("0 0 9 * * *").expect("cron");
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 59, 0).unwrap();
        let delay = Cadence::Cron(schedule).next_delay(now).expect("delay");
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn cron_cadence_without_future_occurrence_stops() {
        let schedule = cron::Schedule::from_str("0 0 0 1 1 * 2020").expect("cron");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(Cadence::Cron(schedule).next_delay(now).is_none());
    }

    #[tokio::test]
    async fn tick_is_skipped_while_previous_run_is_pending() {
        let calls = counter();
        let release = Arc::new(Notify::new());

        let guard = {
            let calls = calls.clone();
            let release = release.clone();
            ScheduleGuard::new(SYNC_JOB_NAME, move || {
                let calls = calls.clone();
                let release = release.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Ok(())
                }
            })
        };

        let first = guard.tick();
        let second = guard.tick();

        assert!(matches!(second, TickOutcome::Skipped));
        let TickOutcome::Started(first) = first else {
            panic!("first tick should start a run");
        };
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        first.await.expect("first run");
        assert!(!guard.is_running());

        let TickOutcome::Started(third) = guard.tick() else {
            panic!("tick after completion should start a run");
        };
        release.notify_one();
        third.await.expect("third run");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_run_does_not_block_next_tick() {
        let calls = counter();
        let guard = {
            let calls = calls.clone();
            ScheduleGuard::new(SYNC_JOB_NAME, move || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(injected_failure());
                    }
                    Ok(())
                }
            })
        };

        for _ in 0..3 {
            let TickOutcome::Started(run) = guard.tick() else {
                panic!("idle guard must start a run");
            };
            run.await.expect("run task must not propagate the job error");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panicking_run_releases_the_guard() {
        let guard = ScheduleGuard::new(SYNC_JOB_NAME, || async {
            if true {
                panic!("collaborator blew up");
            }
            Ok::<(), DaemonError>(())
        });

        let TickOutcome::Started(run) = guard.tick() else {
            panic!("idle guard must start a run");
        };
        assert!(run.await.is_err());
        assert!(!guard.is_running());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn schedule_keeps_ticking_after_failures() {
        let calls = counter();
        let guard = {
            let calls = calls.clone();
            ScheduleGuard::new(SYNC_JOB_NAME, move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(injected_failure())
                }
            })
        };

        let handle = guard.start(Cadence::Every(Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(210)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        handle.stop().await.expect("stop");
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3, "no ticks after stop");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn slow_run_swallows_overlapping_ticks() {
        let calls = counter();
        let guard = {
            let calls = calls.clone();
            ScheduleGuard::new(SYNC_JOB_NAME, move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(150)).await;
                    Ok(())
                }
            })
        };

        // Ticks at 60 (runs until 210), 120 and 180 (skipped), 240 (runs).
        let handle = guard.start(Cadence::Every(Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(250)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        handle.stop().await.expect("stop");
    }
}
