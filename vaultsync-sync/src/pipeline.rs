//! Shared sync cycle used by single-shot mode and the scheduler.
//!
//! One cycle:
//!
//! 1. Read current variables from the platform.
//! 2. Fetch the desired dotenv payload from the vault.
//! 3. Parse it.
//! 4. Diff current against desired.
//! 5. Log the diff report.
//! 6. Stop here when there is nothing to change (or on dry run).
//! 7. Bulk-apply the full desired snapshot, then restart the service.
//! 8. Notify providers of the outcome.
//!
//! Errors in steps 1–4 and 7 abort the cycle. The pipeline never retries;
//! the caller decides whether an error is fatal.

use std::sync::Arc;

use vaultsync_core::{diff, parse, Config, DiffResult, Snapshot};

use crate::collaborators::{ApplyResult, PlatformTarget, RestartResult, VaultSource};
use crate::notify::{DeliveryOutcome, NotificationDispatcher, NotificationPayload};
use crate::report::DiffReport;
use crate::SyncError;

/// Behaviour switches for a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Stop after reporting; never apply, restart or notify.
    pub dry_run: bool,
    /// Hide values in the diff report.
    pub mask_values: bool,
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            dry_run: config.dry_run,
            mask_values: config.mask_values,
        }
    }
}

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Desired and current state agree; no apply or restart was issued.
    InSync,
    /// Dry run with pending changes; nothing was applied.
    DryRun { diff: DiffResult },
    /// Changes were applied and the service restarted.
    Applied(AppliedChanges),
}

impl SyncOutcome {
    pub fn diff(&self) -> Option<&DiffResult> {
        match self {
            SyncOutcome::InSync => None,
            SyncOutcome::DryRun { diff } => Some(diff),
            SyncOutcome::Applied(applied) => Some(&applied.diff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChanges {
    pub diff: DiffResult,
    pub apply: ApplyResult,
    pub restart: RestartResult,
    pub notifications: Vec<DeliveryOutcome>,
}

/// A configured reconciliation cycle. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct SyncPipeline {
    vault: Arc<dyn VaultSource>,
    platform: Arc<dyn PlatformTarget>,
    notifier: Arc<NotificationDispatcher>,
    options: SyncOptions,
}

impl SyncPipeline {
    pub fn new(
        vault: Arc<dyn VaultSource>,
        platform: Arc<dyn PlatformTarget>,
        notifier: NotificationDispatcher,
        options: SyncOptions,
    ) -> Self {
        Self {
            vault,
            platform,
            notifier: Arc::new(notifier),
            options,
        }
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Run one cycle. Blocks on network I/O.
    pub fn run(&self) -> Result<SyncOutcome, SyncError> {
        let current = self.platform.current_snapshot()?;
        tracing::debug!("platform reports {} variables", current.len());

        let payload = self.vault.fetch_payload()?;
        let desired = parse(&payload)?;
        tracing::debug!("vault provides {} variables", desired.len());

        let changes = diff(&current, &desired);
        for line in DiffReport::new(&changes, self.options.mask_values).lines() {
            tracing::info!("{line}");
        }

        if changes.is_empty() {
            return Ok(SyncOutcome::InSync);
        }
        if self.options.dry_run {
            tracing::info!("[dry-run] skipping apply and restart");
            return Ok(SyncOutcome::DryRun { diff: changes });
        }

        let (apply, restart) = match self.apply_and_restart(&desired) {
            Ok(results) => results,
            Err(err) => {
                self.notify(&NotificationPayload::failure(&changes, &err));
                return Err(err);
            }
        };

        let notifications = self.notify(&NotificationPayload::success(&changes));
        Ok(SyncOutcome::Applied(AppliedChanges {
            diff: changes,
            apply,
            restart,
            notifications,
        }))
    }

    fn apply_and_restart(
        &self,
        desired: &Snapshot,
    ) -> Result<(ApplyResult, RestartResult), SyncError> {
        let apply = self.platform.apply_variables(desired)?;
        tracing::info!(
            "applied {} variables (acknowledged: {})",
            apply.submitted,
            apply.acknowledged
        );
        let restart = self.platform.restart_service()?;
        tracing::info!("service restart requested (acknowledged: {})", restart.acknowledged);
        Ok((apply, restart))
    }

    fn notify(&self, payload: &NotificationPayload) -> Vec<DeliveryOutcome> {
        if self.notifier.is_empty() {
            return Vec::new();
        }
        self.notifier.dispatch(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct StaticVault(&'static str);

    impl VaultSource for StaticVault {
        fn fetch_payload(&self) -> Result<String, SyncError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct RecordingPlatform {
        current: Snapshot,
        applied: Mutex<Vec<Snapshot>>,
    }

    impl PlatformTarget for RecordingPlatform {
        fn current_snapshot(&self) -> Result<Snapshot, SyncError> {
            Ok(self.current.clone())
        }

        fn apply_variables(&self, snapshot: &Snapshot) -> Result<ApplyResult, SyncError> {
            self.applied.lock().unwrap().push(snapshot.clone());
            Ok(ApplyResult {
                submitted: snapshot.len(),
                acknowledged: true,
            })
        }

        fn restart_service(&self) -> Result<RestartResult, SyncError> {
            Ok(RestartResult { acknowledged: true })
        }
    }

    #[test]
    fn applies_full_desired_snapshot_not_just_delta() {
        let platform = Arc::new(RecordingPlatform {
            current: Snapshot::from_pairs([("KEEP", "1"), ("OLD", "x")]),
            ..Default::default()
        });
        let pipeline = SyncPipeline::new(
            Arc::new(StaticVault("KEEP=1\nNEW=2\n")),
            platform.clone(),
            NotificationDispatcher::default(),
            SyncOptions::default(),
        );

        let outcome = pipeline.run().expect("run");
        let SyncOutcome::Applied(applied) = outcome else {
            panic!("expected applied outcome");
        };
        assert_eq!(applied.apply.submitted, 2);
        assert!(applied.notifications.is_empty());

        let submitted = platform.applied.lock().unwrap();
        let keys: Vec<_> = submitted[0].keys().collect();
        assert_eq!(keys, ["KEEP", "NEW"]);
    }

    #[test]
    fn dry_run_reports_without_applying() {
        let platform = Arc::new(RecordingPlatform::default());
        let pipeline = SyncPipeline::new(
            Arc::new(StaticVault("A=1")),
            platform.clone(),
            NotificationDispatcher::default(),
            SyncOptions {
                dry_run: true,
                mask_values: false,
            },
        );

        let outcome = pipeline.run().expect("run");
        assert!(matches!(outcome, SyncOutcome::DryRun { ref diff } if diff.to_add.len() == 1));
        assert!(platform.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn parse_failure_aborts_before_apply() {
        let platform = Arc::new(RecordingPlatform::default());
        let pipeline = SyncPipeline::new(
            Arc::new(StaticVault("A=\"unterminated")),
            platform.clone(),
            NotificationDispatcher::default(),
            SyncOptions::default(),
        );

        let err = pipeline.run().expect_err("should fail");
        assert!(matches!(err, SyncError::Parse(_)));
        assert!(platform.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn options_follow_config() {
        let config = Config::from_vars([
            ("DOPPLER_TOKEN", "dp.st.x"),
            ("RAILWAY_API_TOKEN", "t"),
            ("RAILWAY_PROJECT_ID", "p"),
            ("RAILWAY_ENVIRONMENT_ID", "e"),
            ("RAILWAY_SERVICE_ID", "s"),
            ("SYNC_DRY_RUN", "true"),
        ])
        .expect("config");
        let options = SyncOptions::from(&config);
        assert!(options.dry_run);
        assert!(!options.mask_values);
    }
}
