//! # Core Error Types
//!
//! Typed errors shared by the farm crates. Application code wraps them in
//! `anyhow` and downcasts to [`StorageError`] to pick the exit code.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate faucet name: '{name}'")]
    DuplicateFaucet { name: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Claim log storage errors.
///
/// Any of these surfacing from an append is fatal to the scheduler: an
/// attempt that cannot be recorded must not be treated as recorded.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to open claim log at {path}: {msg}")]
    OpenFailed { path: String, msg: String },

    #[error("Migration failed: {msg}")]
    MigrationFailed { msg: String },

    #[error("Append failed: {msg}")]
    AppendFailed { msg: String },

    #[error("Read failed: {msg}")]
    ReadFailed { msg: String },
}

/// Network and transport-related errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Connection refused to {endpoint}: {reason}")]
    ConnectionRefused { endpoint: String, reason: String },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Invalid proxy '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },
}

/// Driver lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("No driver registered with name '{name}'")]
    UnknownDriver { name: String },
}
