//! # vaultsync-sync
//!
//! Reconciliation cycle: fetch desired and current state, diff, report,
//! apply, restart, notify.
//!
//! Collaborators are injected through the traits in [`collaborators`] and
//! [`notify`]; [`SyncPipeline::run`] executes one cycle.

pub mod collaborators;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod report;

pub use collaborators::{ApplyResult, PlatformTarget, RestartResult, VaultSource};
pub use error::SyncError;
pub use notify::{
    DeliveryOutcome, NotificationDispatcher, NotificationPayload, NotificationProvider,
    SyncStatus,
};
pub use pipeline::{AppliedChanges, SyncOptions, SyncOutcome, SyncPipeline};
pub use report::DiffReport;
