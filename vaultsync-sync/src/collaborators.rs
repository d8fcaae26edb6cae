//! Interfaces to the vault and the deployment platform.
//!
//! Implementations live in `vaultsync-clients`; tests substitute in-memory
//! doubles. Every method may block on network I/O.

use serde::Serialize;

use vaultsync_core::Snapshot;

use crate::SyncError;

/// Source of truth for the desired variable set.
pub trait VaultSource: Send + Sync {
    /// Raw dotenv payload for the configured project/config.
    fn fetch_payload(&self) -> Result<String, SyncError>;
}

/// The service whose variables are being reconciled.
pub trait PlatformTarget: Send + Sync {
    /// Variables currently set on the service (id, key and value only).
    fn current_snapshot(&self) -> Result<Snapshot, SyncError>;

    /// Upsert every variable in `snapshot`, keyed by variable key.
    fn apply_variables(&self, snapshot: &Snapshot) -> Result<ApplyResult, SyncError>;

    /// Restart the service so it picks up the new variables.
    fn restart_service(&self) -> Result<RestartResult, SyncError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    /// Number of variables submitted in the bulk upsert.
    pub submitted: usize,
    /// Whether the platform confirmed the upsert.
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartResult {
    pub acknowledged: bool,
}
