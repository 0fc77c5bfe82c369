use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_DRIVER: &str = "demo";
pub const DEFAULT_CLAIM_INTERVAL_MINUTES: u64 = 30;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 14; Termux) drip-farm/0.1 (+reqwest)";

/// One faucet entry as it appears in the config file.
///
/// The scheduler only reads `name`, `coin`, `driver`, `claim_interval_minutes`
/// and `enabled`. Everything else belongs to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    pub name: String,
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_claim_interval")]
    pub claim_interval_minutes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    // --- driver-specific ---
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub send_as: RequestEncoding,
    #[serde(default = "default_address_param")]
    pub address_param: String,
    #[serde(default = "default_api_key_param")]
    pub api_key_param: String,
    #[serde(default = "default_amount_field")]
    pub amount_field: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Any other keys, kept for third-party drivers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FaucetConfig {
    /// Minimal config: everything but name and coin defaulted.
    pub fn new(name: impl Into<String>, coin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coin: Some(coin.into()),
            driver: default_driver(),
            claim_interval_minutes: DEFAULT_CLAIM_INTERVAL_MINUTES,
            enabled: true,
            endpoint: None,
            method: HttpMethod::default(),
            api_key: None,
            send_as: RequestEncoding::default(),
            address_param: default_address_param(),
            api_key_param: default_api_key_param(),
            amount_field: default_amount_field(),
            headers: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.claim_interval_minutes = minutes;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Coin symbol, `None` when absent or blank.
    pub fn coin(&self) -> Option<&str> {
        self.coin
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Endpoint, `None` when absent or blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn claim_interval(&self) -> Duration {
        Duration::from_secs(self.claim_interval_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

/// Where the wallet address and API key go in the outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEncoding {
    #[default]
    Query,
    #[serde(alias = "body")]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Settings for the shared HTTP transport handed to drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// SQLite claim log.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Directory for rotated tracing output.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_claim_interval() -> u64 {
    DEFAULT_CLAIM_INTERVAL_MINUTES
}

fn default_enabled() -> bool {
    true
}

fn default_address_param() -> String {
    "address".to_string()
}

fn default_api_key_param() -> String {
    "api_key".to_string()
}

fn default_amount_field() -> String {
    "amount".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_db_path() -> String {
    "logs/farm_log.db".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}
