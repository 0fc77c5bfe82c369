//! Coin → wallet address book.
//!
//! Built from the `[wallets]` table, then overridden by `DRIP_WALLET_<COIN>`
//! environment variables, then (optionally) completed interactively.

use anyhow::{Context, Result};
use core_logic::config::FaucetConfig;
use dialoguer::Input;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

pub const WALLET_ENV_PREFIX: &str = "DRIP_WALLET_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletBook {
    wallets: BTreeMap<String, String>,
}

impl WalletBook {
    /// Blank addresses are dropped.
    pub fn new(wallets: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut book = Self::default();
        for (coin, address) in wallets {
            book.insert(coin, address);
        }
        book
    }

    pub fn insert(&mut self, coin: impl Into<String>, address: impl Into<String>) {
        let coin = coin.into().trim().to_string();
        let address = address.into().trim().to_string();
        if coin.is_empty() || address.is_empty() {
            return;
        }
        self.wallets.insert(coin, address);
    }

    /// Applies `DRIP_WALLET_<COIN>=address` pairs. The coin part keeps the
    /// case of any existing entry, so `DRIP_WALLET_DOGE` overrides `doge`.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            let Some(coin) = key.as_ref().strip_prefix(WALLET_ENV_PREFIX) else {
                continue;
            };
            if coin.is_empty() || value.as_ref().trim().is_empty() {
                continue;
            }
            let coin = self
                .wallets
                .keys()
                .find(|existing| existing.eq_ignore_ascii_case(coin))
                .cloned()
                .unwrap_or_else(|| coin.to_string());
            self.insert(coin, value.as_ref());
            applied += 1;
        }
        applied
    }

    /// Overrides from the process environment.
    pub fn apply_env(&mut self) -> usize {
        self.apply_overrides(std::env::vars())
    }

    pub fn get(&self, coin: &str) -> Option<&str> {
        self.wallets.get(coin).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Coins used by `faucets` that have no address, in first-use order.
    pub fn missing_coins<'a>(&self, faucets: impl IntoIterator<Item = &'a FaucetConfig>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        faucets
            .into_iter()
            .filter_map(FaucetConfig::coin)
            .filter(|coin| self.get(coin).is_none())
            .filter(|coin| seen.insert(coin.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Asks on the terminal for every missing coin. Empty answers are skipped.
    pub fn prompt_missing(&mut self, faucets: &[FaucetConfig]) -> Result<usize> {
        let mut added = 0;
        for coin in self.missing_coins(faucets) {
            let address: String = Input::new()
                .with_prompt(format!("Wallet address for {} (empty to skip)", coin))
                .allow_empty(true)
                .interact_text()
                .with_context(|| format!("Failed to read wallet for {}", coin))?;
            if address.trim().is_empty() {
                continue;
            }
            info!("Wallet for {} set interactively", coin);
            self.insert(coin, address);
            added += 1;
        }
        Ok(added)
    }
}
