//! Configuration loader for drip-farm

use anyhow::{Context, Result};
use core_logic::config::{FaucetConfig, LoggingConfig, ProxyConfig, TransportConfig};
use core_logic::error::ConfigError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_TICK_SECONDS: u64 = 30;

/// Whole-farm settings, read once before the first tick.
#[derive(Debug, Clone, Deserialize)]
pub struct FarmConfig {
    /// Pause between scheduler passes
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Legacy switch, only consulted when `[transport].proxy` is unset
    #[serde(default)]
    pub use_tor: bool,
    #[serde(default)]
    pub tor_socks_proxy: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Coin symbol → wallet address
    #[serde(default)]
    pub wallets: BTreeMap<String, String>,
    #[serde(default)]
    pub faucets: Vec<FaucetConfig>,
}

fn default_tick_seconds() -> u64 {
    DEFAULT_TICK_SECONDS
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            tick_seconds: DEFAULT_TICK_SECONDS,
            transport: TransportConfig::default(),
            use_tor: false,
            tor_socks_proxy: None,
            logging: LoggingConfig::default(),
            wallets: BTreeMap::new(),
            faucets: Vec::new(),
        }
    }
}

impl FarmConfig {
    /// Load configuration from a TOML file, or JSON when the extension is `.json`.
    ///
    /// # Example
    /// ```ignore
    /// let config = FarmConfig::from_path("config/config.toml")?;
    /// ```
    pub fn from_path(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_string(),
            msg: e.to_string(),
        })?;

        let is_json = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content).context(format!("Failed to parse config JSON {}", path))
        } else {
            Self::from_toml_str(&content).context(format!("Failed to parse config TOML {}", path))
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    /// Enabled faucets, in file order.
    pub fn enabled_faucets(&self) -> Vec<FaucetConfig> {
        self.faucets.iter().filter(|f| f.enabled).cloned().collect()
    }

    /// Transport settings with the legacy Tor keys folded in.
    pub fn effective_transport(&self) -> TransportConfig {
        let mut transport = self.transport.clone();
        if transport.proxy.is_none() && self.use_tor {
            if let Some(url) = self
                .tor_socks_proxy
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
            {
                transport.proxy = Some(ProxyConfig {
                    url: url.to_string(),
                    username: None,
                    password: None,
                });
            }
        }
        transport
    }

    /// Checks that must pass before the loop starts.
    ///
    /// Returns the non-fatal findings as warnings.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.tick_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_seconds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let mut warnings = Vec::new();
        let mut names = HashSet::new();
        for faucet in &self.faucets {
            let name = faucet.name.trim();
            if name.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "faucets[].name".to_string(),
                });
            }
            if !names.insert(name.to_string()) {
                return Err(ConfigError::DuplicateFaucet {
                    name: name.to_string(),
                });
            }
            if faucet.enabled && faucet.coin().is_none() {
                warnings.push(format!("Faucet '{}' has no coin and will be skipped", name));
            }
        }

        if self.use_tor && self.transport.proxy.is_none() && self.tor_socks_proxy.is_none() {
            warnings.push("use_tor is set but tor_socks_proxy is missing".to_string());
        }

        Ok(warnings)
    }
}
