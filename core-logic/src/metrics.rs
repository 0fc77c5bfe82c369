use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::database::ClaimStatus;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub claims: ClaimMetrics,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimMetrics {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub errors: u64,
    pub driver_errors: u64,
    pub success_rate: f64,
    /// Sum of successful amounts, in thousandths of a unit.
    pub claimed_milli_units: u64,
    pub ticks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub total_duration_ms: u64,
    pub avg_claim_duration_ms: f64,
    pub min_claim_duration_ms: u64,
    pub max_claim_duration_ms: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    claims_total: AtomicU64,
    claims_success: AtomicU64,
    claims_failed: AtomicU64,
    claims_error: AtomicU64,
    claims_driver_error: AtomicU64,
    claimed_milli: AtomicU64,
    ticks: AtomicU64,
    claim_duration_sum_ms: AtomicU64,
    claim_min_duration_ms: AtomicU64,
    claim_max_duration_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            claims_total: AtomicU64::new(0),
            claims_success: AtomicU64::new(0),
            claims_failed: AtomicU64::new(0),
            claims_error: AtomicU64::new(0),
            claims_driver_error: AtomicU64::new(0),
            claimed_milli: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            claim_duration_sum_ms: AtomicU64::new(0),
            claim_min_duration_ms: AtomicU64::new(u64::MAX),
            claim_max_duration_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn global() -> &'static Self {
        static INSTANCE: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();
        INSTANCE.get_or_init(MetricsCollector::default)
    }

    pub fn record_claim(&self, status: ClaimStatus, amount: f64, duration: Duration) {
        self.claims_total.fetch_add(1, Ordering::SeqCst);

        let duration_ms = duration.as_millis() as u64;
        self.claim_duration_sum_ms
            .fetch_add(duration_ms, Ordering::SeqCst);
        self.claim_min_duration_ms
            .fetch_min(duration_ms, Ordering::SeqCst);
        self.claim_max_duration_ms
            .fetch_max(duration_ms, Ordering::SeqCst);

        let counter = match status {
            ClaimStatus::Success => &self.claims_success,
            ClaimStatus::Fail => &self.claims_failed,
            ClaimStatus::Error => &self.claims_error,
            ClaimStatus::DriverError => &self.claims_driver_error,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if status == ClaimStatus::Success && amount.is_finite() && amount > 0.0 {
            self.claimed_milli
                .fetch_add((amount * 1000.0).round() as u64, Ordering::SeqCst);
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.claims_total.load(Ordering::SeqCst);
        let success = self.claims_success.load(Ordering::SeqCst);
        let total_duration = self.claim_duration_sum_ms.load(Ordering::SeqCst);
        let min_duration = self.claim_min_duration_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.uptime().as_secs(),
            claims: ClaimMetrics {
                total,
                success,
                failed: self.claims_failed.load(Ordering::SeqCst),
                errors: self.claims_error.load(Ordering::SeqCst),
                driver_errors: self.claims_driver_error.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    success as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                claimed_milli_units: self.claimed_milli.load(Ordering::SeqCst),
                ticks: self.ticks.load(Ordering::SeqCst),
            },
            performance: PerformanceMetrics {
                total_duration_ms: total_duration,
                avg_claim_duration_ms: if total > 0 {
                    total_duration as f64 / total as f64
                } else {
                    0.0
                },
                min_claim_duration_ms: if min_duration == u64::MAX {
                    0
                } else {
                    min_duration
                },
                max_claim_duration_ms: self.claim_max_duration_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn claims_total(&self) -> u64 {
        self.claims_total.load(Ordering::SeqCst)
    }

    pub fn claims_success(&self) -> u64 {
        self.claims_success.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
