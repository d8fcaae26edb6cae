//! vaultsync core library: variable model, dotenv parser, diff engine,
//! configuration.
//!
//! - [`types`]: variable records, snapshots, diff results
//! - [`parser`]: dotenv payload → [`Snapshot`]
//! - [`diff`]: [`Snapshot`] × [`Snapshot`] → [`DiffResult`]
//! - [`config`]: validated startup configuration
//! - [`error`]: [`ConfigError`], [`ParseError`]

pub mod config;
pub mod diff;
pub mod error;
pub mod parser;
pub mod types;

pub use config::Config;
pub use diff::diff;
pub use error::{ConfigError, ParseError};
pub use parser::parse;
pub use types::{DiffResult, Snapshot, VariableId, VariableRecord, VariableUpdate};
