//! The claim loop.
//!
//! One pass ("tick") walks the enabled faucets in config order. For each one it
//! checks coin and wallet, asks the interval gate, resolves the driver, runs it
//! behind a panic boundary and appends exactly one record to the claim log.
//! Ticks are separated by a fixed, cancellable sleep.

use crate::drivers::{ClaimContext, ClaimOutcome, DriverRegistry};
use crate::gate::{is_due, Clock, SystemClock};
use crate::transport::HttpTransport;
use crate::wallets::WalletBook;
use anyhow::Error as AnyError;
use chrono::{DateTime, Utc};
use core_logic::config::FaucetConfig;
use core_logic::database::{ClaimLog, ClaimRecord, ClaimStatus};
use core_logic::error::StorageError;
use core_logic::metrics::MetricsCollector;
use core_logic::CLAIM_RESULT_TARGET;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(30);

/// Console lines stay under ~200 chars.
const CONSOLE_MSG_LIMIT: usize = 125;

/// Last attempt time per faucet. In-memory only, reset on every start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastRunState {
    runs: HashMap<String, Option<DateTime<Utc>>>,
}

impl LastRunState {
    pub fn new<'a>(faucets: impl IntoIterator<Item = &'a FaucetConfig>) -> Self {
        Self {
            runs: faucets.into_iter().map(|f| (f.name.clone(), None)).collect(),
        }
    }

    pub fn get(&self, faucet: &str) -> Option<DateTime<Utc>> {
        self.runs.get(faucet).copied().flatten()
    }

    pub fn mark(&mut self, faucet: &str, at: DateTime<Utc>) {
        self.runs.insert(faucet.to_string(), Some(at));
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub success: usize,
    pub fail: usize,
    pub errors: usize,
    pub driver_errors: usize,
    pub not_due: usize,
    pub skipped: usize,
}

impl TickSummary {
    /// Records appended during the tick.
    pub fn records(&self) -> usize {
        self.success + self.fail + self.errors + self.driver_errors
    }

    fn count(&mut self, status: ClaimStatus) {
        match status {
            ClaimStatus::Success => self.success += 1,
            ClaimStatus::Fail => self.fail += 1,
            ClaimStatus::Error => self.errors += 1,
            ClaimStatus::DriverError => self.driver_errors += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub records: usize,
    pub cancelled: bool,
}

pub struct Scheduler {
    faucets: Vec<Arc<FaucetConfig>>,
    wallets: WalletBook,
    registry: DriverRegistry,
    transport: Arc<dyn HttpTransport>,
    log: Arc<dyn ClaimLog>,
    clock: Arc<dyn Clock>,
    tick_period: Duration,
    state: LastRunState,
    warned: HashSet<String>,
    metrics: &'static MetricsCollector,
}

impl Scheduler {
    /// Disabled faucets are dropped here; the rest keep their order.
    pub fn new(
        faucets: Vec<FaucetConfig>,
        wallets: WalletBook,
        registry: DriverRegistry,
        transport: Arc<dyn HttpTransport>,
        log: Arc<dyn ClaimLog>,
    ) -> Self {
        let faucets: Vec<Arc<FaucetConfig>> = faucets
            .into_iter()
            .filter(|f| f.enabled)
            .map(Arc::new)
            .collect();
        let state = LastRunState::new(faucets.iter().map(Arc::as_ref));
        Self {
            faucets,
            wallets,
            registry,
            transport,
            log,
            clock: Arc::new(SystemClock),
            tick_period: DEFAULT_TICK_PERIOD,
            state,
            warned: HashSet::new(),
            metrics: MetricsCollector::global(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn faucet_count(&self) -> usize {
        self.faucets.len()
    }

    pub fn last_run(&self, faucet: &str) -> Option<DateTime<Utc>> {
        self.state.get(faucet)
    }

    /// Logs every coin/wallet gap once, before the first tick.
    pub fn warn_config_gaps(&mut self) {
        for faucet in self.faucets.clone() {
            match faucet.coin() {
                None => self.warn_once(
                    format!("coin:{}", faucet.name),
                    format!("Faucet '{}' has no coin configured, skipping", faucet.name),
                ),
                Some(coin) if self.wallets.get(coin).is_none() => self.warn_once(
                    format!("wallet:{}", coin),
                    format!(
                        "No wallet configured for coin '{}', skipping faucet '{}'",
                        coin, faucet.name
                    ),
                ),
                Some(_) => {}
            }
        }
    }

    fn warn_once(&mut self, key: String, message: String) {
        if self.warned.insert(key) {
            warn!("{}", message);
        }
    }

    /// One pass over all faucets.
    ///
    /// Only a claim log failure ends the tick early; every driver fault is
    /// recorded and the pass moves on.
    pub async fn tick(&mut self) -> Result<TickSummary, StorageError> {
        let mut summary = TickSummary::default();

        for faucet in self.faucets.clone() {
            let Some(coin) = faucet.coin().map(str::to_string) else {
                self.warn_once(
                    format!("coin:{}", faucet.name),
                    format!("Faucet '{}' has no coin configured, skipping", faucet.name),
                );
                summary.skipped += 1;
                continue;
            };
            let Some(wallet) = self.wallets.get(&coin).map(str::to_string) else {
                self.warn_once(
                    format!("wallet:{}", coin),
                    format!(
                        "No wallet configured for coin '{}', skipping faucet '{}'",
                        coin, faucet.name
                    ),
                );
                summary.skipped += 1;
                continue;
            };

            let now = self.clock.now();
            if !is_due(faucet.claim_interval(), self.state.get(&faucet.name), now) {
                summary.not_due += 1;
                continue;
            }

            // Unresolvable drivers do not consume the cooldown.
            let driver = match self.registry.resolve(&faucet.driver) {
                Ok(driver) => driver,
                Err(e) => {
                    let record = ClaimRecord {
                        timestamp: now,
                        faucet: faucet.name.clone(),
                        coin,
                        amount: 0.0,
                        status: ClaimStatus::DriverError,
                        message: e.to_string(),
                    };
                    self.commit(&record, Duration::ZERO).await?;
                    summary.count(ClaimStatus::DriverError);
                    continue;
                }
            };

            debug!("Time to claim from {} ({})", faucet.name, coin);
            let ctx = ClaimContext {
                transport: Arc::clone(&self.transport),
                faucet: Arc::clone(&faucet),
                wallet,
            };
            let started = Instant::now();
            let result = AssertUnwindSafe(driver.claim(&ctx)).catch_unwind().await;
            let elapsed = started.elapsed();

            let (status, amount, message) = classify(result);
            let record = ClaimRecord {
                timestamp: now,
                faucet: faucet.name.clone(),
                coin,
                amount,
                status,
                message,
            };
            self.commit(&record, elapsed).await?;
            // An attempt only counts once its record is stored.
            self.state.mark(&faucet.name, now);
            summary.count(status);
        }

        self.metrics.record_tick();
        Ok(summary)
    }

    async fn commit(&self, record: &ClaimRecord, elapsed: Duration) -> Result<(), StorageError> {
        if let Err(e) = self.log.append(record).await {
            error!("Claim log append failed for {}: {}", record.faucet, e);
            return Err(e);
        }
        self.metrics
            .record_claim(record.status, record.amount, elapsed);
        log_result(record, elapsed);
        Ok(())
    }

    /// Ticks until cancelled, or until `max_ticks` passes have run.
    ///
    /// A cancel that arrives mid-tick lets that tick finish; only the sleep
    /// and later ticks are skipped.
    pub async fn run(
        &mut self,
        token: CancellationToken,
        max_ticks: Option<u64>,
    ) -> Result<RunSummary, StorageError> {
        let mut run = RunSummary::default();
        info!(
            "Starting drip farm: {} faucet(s), tick every {}s",
            self.faucets.len(),
            self.tick_period.as_secs()
        );
        self.warn_config_gaps();

        loop {
            if token.is_cancelled() {
                run.cancelled = true;
                break;
            }

            let summary = self.tick().await?;
            run.ticks += 1;
            run.records += summary.records();
            debug!("Tick {} done: {:?}", run.ticks, summary);

            if max_ticks.is_some_and(|max| run.ticks >= max) {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler stopping (cancelled during sleep).");
                    run.cancelled = true;
                    break;
                }
                _ = sleep(self.tick_period) => {}
            }
        }

        Ok(run)
    }
}

type DriverResult = Result<anyhow::Result<ClaimOutcome>, Box<dyn Any + Send>>;

/// Maps whatever came out of the fault boundary to a record triple.
fn classify(result: DriverResult) -> (ClaimStatus, f64, String) {
    match result {
        Ok(Ok(outcome)) if !outcome.is_well_formed() => (
            ClaimStatus::Error,
            0.0,
            format!("driver returned invalid amount {}", outcome.amount),
        ),
        Ok(Ok(outcome)) if outcome.success => {
            (ClaimStatus::Success, outcome.amount, outcome.message)
        }
        Ok(Ok(outcome)) => (ClaimStatus::Fail, 0.0, outcome.message),
        Ok(Err(e)) => (ClaimStatus::Error, 0.0, error_text(&e)),
        Err(panic) => (
            ClaimStatus::Error,
            0.0,
            format!("driver panicked: {}", panic_text(panic.as_ref())),
        ),
    }
}

fn error_text(e: &AnyError) -> String {
    format!("{:#}", e)
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Single-line, clipped form of a message for the console.
pub fn clip_message(message: &str) -> String {
    let raw = message.replace('\n', " | ");
    if raw.chars().count() > CONSOLE_MSG_LIMIT {
        let truncated: String = raw.chars().take(CONSOLE_MSG_LIMIT - 3).collect();
        format!("{}...", truncated)
    } else {
        raw
    }
}

fn log_result(record: &ClaimRecord, elapsed: Duration) {
    let msg = clip_message(&record.message);
    match record.status {
        ClaimStatus::Success => info!(
            target: CLAIM_RESULT_TARGET,
            "SUCCESS [{}] {} {} {} in {:.1}s",
            record.faucet,
            record.amount,
            record.coin,
            msg,
            elapsed.as_secs_f64()
        ),
        ClaimStatus::Fail => info!(
            target: CLAIM_RESULT_TARGET,
            "FAILED  [{}] {} {} in {:.1}s",
            record.faucet,
            record.coin,
            msg,
            elapsed.as_secs_f64()
        ),
        ClaimStatus::Error => warn!(
            target: CLAIM_RESULT_TARGET,
            "ERROR   [{}] {} {}",
            record.faucet,
            record.coin,
            msg
        ),
        ClaimStatus::DriverError => warn!(
            target: CLAIM_RESULT_TARGET,
            "ERROR   [{}] {} {}",
            record.faucet,
            record.coin,
            msg
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_message() {
        assert_eq!(clip_message("line1\nline2"), "line1 | line2");
        let long = "y".repeat(400);
        let clipped = clip_message(&long);
        assert_eq!(clipped.chars().count(), CONSOLE_MSG_LIMIT);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_classify_outcomes() {
        let ok = classify(Ok(Ok(ClaimOutcome::success(4.0, "demo-ok"))));
        assert_eq!(ok, (ClaimStatus::Success, 4.0, "demo-ok".to_string()));

        let fail = classify(Ok(Ok(ClaimOutcome::failure("demo-fail"))));
        assert_eq!(fail, (ClaimStatus::Fail, 0.0, "demo-fail".to_string()));

        let negative = classify(Ok(Ok(ClaimOutcome::success(-1.0, "odd"))));
        assert_eq!(negative.0, ClaimStatus::Error);
        assert_eq!(negative.1, 0.0);

        let nan = classify(Ok(Ok(ClaimOutcome::success(f64::NAN, "odd"))));
        assert_eq!(nan.0, ClaimStatus::Error);

        let err = classify(Ok(Err(anyhow::anyhow!("boom").context("claiming"))));
        assert_eq!(err, (ClaimStatus::Error, 0.0, "claiming: boom".to_string()));

        let payload: Box<dyn Any + Send> = Box::new("kaput");
        let panicked = classify(Err(payload));
        assert_eq!(panicked.2, "driver panicked: kaput");
    }

    #[test]
    fn test_last_run_state() {
        let faucets = vec![FaucetConfig::new("a", "DOGE")];
        let mut state = LastRunState::new(&faucets);
        assert_eq!(state.get("a"), None);
        assert_eq!(state.get("missing"), None);
        let at = Utc::now();
        state.mark("a", at);
        assert_eq!(state.get("a"), Some(at));
    }
}
