//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod logger;
pub(crate) mod runner;

// Selective exports - only public utilities
pub use logger::{setup_logger, setup_quiet_logger, CLAIM_RESULT_TARGET};
pub use runner::WorkerRunner;
