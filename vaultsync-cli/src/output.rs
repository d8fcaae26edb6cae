use colored::Colorize;

use vaultsync_sync::SyncOutcome;

/// Final status for a single-shot run. The diff report itself is already in
/// the log, emitted by the pipeline before apply.
pub fn print_outcome(outcome: &SyncOutcome) {
    for line in outcome_lines(outcome) {
        println!("{line}");
    }
}

fn outcome_lines(outcome: &SyncOutcome) -> Vec<String> {
    match outcome {
        SyncOutcome::InSync => {
            vec![format!("{} already in sync, nothing to do", "✓".green().bold())]
        }
        SyncOutcome::DryRun { diff } => vec![format!(
            "{} {} changes found, none applied",
            "[dry-run]".yellow().bold(),
            diff.change_count()
        )],
        SyncOutcome::Applied(applied) => {
            let restart = if applied.restart.acknowledged {
                "service restarted".normal()
            } else {
                "restart not acknowledged".yellow()
            };
            let mut lines = vec![format!(
                "{} applied {} variables ({} changes), {restart}",
                "✓".green().bold(),
                applied.apply.submitted,
                applied.diff.change_count(),
            )];
            lines.extend(applied.notifications.iter().map(|delivery| match &delivery.error {
                None => format!("  notified {}", delivery.provider),
                Some(err) => format!(
                    "  {} {}: {err}",
                    "notification failed".red(),
                    delivery.provider
                ),
            }));
            lines
        }
    }
}
