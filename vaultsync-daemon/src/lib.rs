//! Recurring sync: cron cadence, overrun protection, isolated failures and
//! Ctrl-C shutdown.

mod error;
pub mod runtime;
pub mod schedule;

pub use error::DaemonError;
pub use runtime::{init_tracing, run_cycle, run_scheduled, start_blocking};
pub use schedule::{Cadence, OverrunGuard, RunPermit, ScheduleGuard, ScheduleHandle, TickOutcome};
