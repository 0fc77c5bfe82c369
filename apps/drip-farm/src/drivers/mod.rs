//! Claim drivers and the registry that names them.
//!
//! A driver is one strategy for turning a faucet config plus a wallet address
//! into a [`ClaimOutcome`]. Drivers are looked up by the `driver` key of each
//! faucet entry; the built-in set is fixed at compile time:
//!
//! | name   | driver            | behaviour                                        |
//! |--------|-------------------|--------------------------------------------------|
//! | `demo` | [`DemoDriver`]    | simulated claim, no network                      |
//! | `http` | [`HttpDriver`]    | calls the faucet endpoint, simulates without one |
//!
//! Extra drivers can be added with [`DriverRegistry::register`] before the
//! scheduler starts.
//!
//! # Writing a driver
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use drip_farm::drivers::{ClaimContext, ClaimDriver, ClaimOutcome};
//!
//! pub struct NoopDriver;
//!
//! #[async_trait]
//! impl ClaimDriver<ClaimContext> for NoopDriver {
//!     fn name(&self) -> &str {
//!         "noop"
//!     }
//!
//!     async fn claim(&self, ctx: &ClaimContext) -> Result<ClaimOutcome> {
//!         Ok(ClaimOutcome::failure(format!("noop for {}", ctx.wallet)))
//!     }
//! }
//! ```

use crate::transport::HttpTransport;
use core_logic::config::FaucetConfig;
use core_logic::error::DriverError;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod demo;
pub mod http;

pub use core_logic::traits::{ClaimDriver, ClaimOutcome};
pub use demo::{DemoDriver, SimulatedClaim};
pub use http::{AmountExtractor, DefaultAmountExtractor, HttpDriver};

/// Everything a driver gets for one attempt.
#[derive(Clone)]
pub struct ClaimContext {
    /// Shared transport, opaque to the scheduler
    pub transport: Arc<dyn HttpTransport>,
    pub faucet: Arc<FaucetConfig>,
    pub wallet: String,
}

impl ClaimContext {
    pub fn coin(&self) -> &str {
        self.faucet.coin().unwrap_or("unknown")
    }
}

impl std::fmt::Debug for ClaimContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimContext")
            .field("faucet", &self.faucet.name)
            .field("wallet", &self.wallet)
            .finish_non_exhaustive()
    }
}

// Trait alias
pub type FarmDriver = dyn ClaimDriver<ClaimContext>;

/// Name → driver lookup table.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<FarmDriver>>,
}

impl DriverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `demo` and `http` drivers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DemoDriver::new()));
        registry.register(Arc::new(HttpDriver::new()));
        registry
    }

    /// Adds a driver under its own name, returning any driver it replaced.
    pub fn register(&mut self, driver: Arc<FarmDriver>) -> Option<Arc<FarmDriver>> {
        self.drivers.insert(driver.name().to_string(), driver)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<FarmDriver>, DriverError> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::UnknownDriver {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.drivers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["demo", "http"]);
        assert_eq!(registry.resolve("demo").unwrap().name(), "demo");
        assert_eq!(registry.resolve("http").unwrap().name(), "http");
    }

    #[test]
    fn test_unknown_driver() {
        let registry = DriverRegistry::with_defaults();
        let err = registry.resolve("faucetpay").err().unwrap();
        assert_eq!(
            err,
            DriverError::UnknownDriver {
                name: "faucetpay".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "No driver registered with name 'faucetpay'"
        );
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = DriverRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(Arc::new(DemoDriver::seeded(1))).is_none());
        assert!(registry.register(Arc::new(DemoDriver::seeded(2))).is_some());
        assert_eq!(registry.len(), 1);
    }
}
