//! # Core Logic - Shared Building Blocks for the Drip Farm
//!
//! This crate provides the pieces every farm binary needs regardless of which
//! faucets it polls: the claim data model, the append-only claim log, typed
//! errors, logging setup and shutdown handling.
//!
//! ## Modules
//!
//! - [`config`] - Faucet, transport and logging configuration types
//! - [`database`] - Append-only claim log (SQLite and in-memory)
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Claim counters with JSON export
//! - [`traits`] - Claim driver trait and outcome type
//! - [`utils`] - Logger and shutdown runner

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{
    FaucetConfig, HttpMethod, LoggingConfig, ProxyConfig, RequestEncoding, TransportConfig,
};
pub use database::{
    ClaimLog, ClaimRecord, ClaimStatus, DatabaseManager, DbMetricsSnapshot, MemoryClaimLog,
    StoredClaim,
};
pub use error::{ConfigError, DriverError, NetworkError, StorageError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use traits::{ClaimDriver, ClaimOutcome};

pub use utils::{setup_logger, setup_quiet_logger, WorkerRunner, CLAIM_RESULT_TARGET};
