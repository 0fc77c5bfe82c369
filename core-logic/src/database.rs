use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::StorageError;

/// Status column of the claim log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimStatus {
    Success,
    Fail,
    Error,
    DriverError,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Success => "success",
            ClaimStatus::Fail => "fail",
            ClaimStatus::Error => "error",
            ClaimStatus::DriverError => "driver_error",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "success" => Ok(ClaimStatus::Success),
            "fail" => Ok(ClaimStatus::Fail),
            "error" => Ok(ClaimStatus::Error),
            "driver_error" => Ok(ClaimStatus::DriverError),
            other => Err(format!("unknown claim status '{}'", other)),
        }
    }
}

/// One claim attempt, as produced by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRecord {
    /// Attempt time, not the time the faucet paid out.
    pub timestamp: DateTime<Utc>,
    pub faucet: String,
    pub coin: String,
    pub amount: f64,
    pub status: ClaimStatus,
    pub message: String,
}

/// A claim log row exactly as stored.
///
/// Fields stay textual so the report can survive rows it cannot parse.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredClaim {
    pub id: i64,
    pub timestamp: String,
    pub faucet: String,
    pub coin: String,
    pub amount: String,
    pub status: String,
    pub message: String,
}

impl StoredClaim {
    fn from_record(id: i64, record: &ClaimRecord) -> Self {
        Self {
            id,
            timestamp: format_timestamp(&record.timestamp),
            faucet: record.faucet.clone(),
            coin: record.coin.clone(),
            amount: format_amount(record.amount),
            status: record.status.as_str().to_string(),
            message: record.message.clone(),
        }
    }

    /// Amount as a number; anything unparsable counts as zero.
    pub fn amount_value(&self) -> f64 {
        self.amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Calendar date of the attempt, if the timestamp can be read.
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.timestamp.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
        // Naive ISO timestamps written by older farm versions
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.date());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    pub fn status_value(&self) -> Option<ClaimStatus> {
        self.status.parse().ok()
    }

    /// Rebuilds the record; `None` when a field does not parse.
    pub fn to_record(&self) -> Option<ClaimRecord> {
        let timestamp = DateTime::parse_from_rfc3339(self.timestamp.trim())
            .ok()?
            .with_timezone(&Utc);
        let amount = self.amount.trim().parse::<f64>().ok()?;
        Some(ClaimRecord {
            timestamp,
            faucet: self.faucet.clone(),
            coin: self.coin.clone(),
            amount,
            status: self.status_value()?,
            message: self.message.clone(),
        })
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Shortest decimal form that parses back to the same `f64`.
pub fn format_amount(amount: f64) -> String {
    format!("{}", amount)
}

/// Append-only sink for claim attempts.
#[async_trait]
pub trait ClaimLog: Send + Sync {
    /// Appends one record atomically.
    async fn append(&self, record: &ClaimRecord) -> Result<(), StorageError>;

    /// Every record in insertion order.
    async fn load_all(&self) -> Result<Vec<StoredClaim>, StorageError>;

    /// The last `limit` records, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredClaim>, StorageError>;
}

#[derive(Debug, Default)]
pub struct DbMetrics {
    pub total_queries: AtomicU64,
    pub total_errors: AtomicU64,
    pub total_inserts: AtomicU64,
    pub total_selects: AtomicU64,
    pub avg_query_time_ms: AtomicU64,
    pub query_count_for_avg: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct DbMetricsSnapshot {
    pub total_queries: u64,
    pub total_errors: u64,
    pub total_inserts: u64,
    pub total_selects: u64,
    pub avg_query_time_ms: u64,
}

impl DbMetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_queries as f64 * 100.0
        }
    }
}

/// SQLite-backed claim log.
#[derive(Debug)]
pub struct DatabaseManager {
    pool: SqlitePool,
    metrics: Arc<DbMetrics>,
}

impl DatabaseManager {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

    /// Opens a log that must already exist. Returns `None` without touching
    /// the filesystem when `db_path` is missing.
    pub async fn open_existing(db_path: &str) -> Result<Option<Self>, StorageError> {
        if !Path::new(db_path).is_file() {
            return Ok(None);
        }
        Self::new(db_path).await.map(Some)
    }

    pub async fn new(db_path: &str) -> Result<Self, StorageError> {
        let open_failed = |msg: String| StorageError::OpenFailed {
            path: db_path.to_string(),
            msg,
        };

        let path = Path::new(db_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| open_failed(e.to_string()))?;
        }
        if !path.exists() {
            std::fs::File::create(path).map_err(|e| open_failed(e.to_string()))?;
            info!("Created new claim log: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=FULL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| open_failed(e.to_string()))?;

        let manager = Self {
            pool,
            metrics: Arc::new(DbMetrics::default()),
        };
        manager.init_schema().await?;
        info!("Claim log ready at {} (WAL Mode)", db_path);
        Ok(manager)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS claim_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                faucet TEXT NOT NULL,
                coin TEXT NOT NULL,
                amount TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed { msg: e.to_string() })?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_claim_log_faucet ON claim_log(faucet);",
            "CREATE INDEX IF NOT EXISTS idx_claim_log_status ON claim_log(status);",
        ];
        for idx_sql in indexes {
            if let Err(e) = sqlx::query(idx_sql).execute(&self.pool).await {
                debug!("Index creation skipped (may exist): {}", e);
            }
        }
        Ok(())
    }

    pub fn get_metrics(&self) -> DbMetricsSnapshot {
        DbMetricsSnapshot {
            total_queries: self.metrics.total_queries.load(Ordering::SeqCst),
            total_errors: self.metrics.total_errors.load(Ordering::SeqCst),
            total_inserts: self.metrics.total_inserts.load(Ordering::SeqCst),
            total_selects: self.metrics.total_selects.load(Ordering::SeqCst),
            avg_query_time_ms: self.metrics.avg_query_time_ms.load(Ordering::SeqCst),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Claim log closed");
    }

    fn record_query_time(&self, start: std::time::Instant, success: bool) {
        self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
        if !success {
            self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let count = self.metrics.query_count_for_avg.load(Ordering::SeqCst);
        let current_avg = self.metrics.avg_query_time_ms.load(Ordering::SeqCst);
        let new_count = count + 1;
        let new_avg = if count == 0 {
            elapsed_ms
        } else {
            (current_avg * count + elapsed_ms) / new_count
        };
        self.metrics
            .query_count_for_avg
            .store(new_count, Ordering::SeqCst);
        self.metrics
            .avg_query_time_ms
            .store(new_avg, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClaimLog for DatabaseManager {
    async fn append(&self, record: &ClaimRecord) -> Result<(), StorageError> {
        let start = std::time::Instant::now();
        let row = StoredClaim::from_record(0, record);

        let result = sqlx::query(
            "INSERT INTO claim_log (timestamp, faucet, coin, amount, status, message) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.timestamp)
        .bind(&row.faucet)
        .bind(&row.coin)
        .bind(&row.amount)
        .bind(&row.status)
        .bind(&row.message)
        .execute(&self.pool)
        .await;

        self.metrics.total_inserts.fetch_add(1, Ordering::SeqCst);
        self.record_query_time(start, result.is_ok());

        result.map(|_| ()).map_err(|e| {
            error!("Failed to append claim record: {}", e);
            StorageError::AppendFailed { msg: e.to_string() }
        })
    }

    async fn load_all(&self) -> Result<Vec<StoredClaim>, StorageError> {
        let start = std::time::Instant::now();
        let rows = sqlx::query_as::<_, StoredClaim>(
            "SELECT id, timestamp, faucet, coin, amount, status, message FROM claim_log ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        self.record_query_time(start, rows.is_ok());

        rows.map_err(|e| StorageError::ReadFailed { msg: e.to_string() })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredClaim>, StorageError> {
        let start = std::time::Instant::now();
        let rows = sqlx::query_as::<_, StoredClaim>(
            "SELECT id, timestamp, faucet, coin, amount, status, message FROM claim_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        self.record_query_time(start, rows.is_ok());

        let mut rows = rows.map_err(|e| StorageError::ReadFailed { msg: e.to_string() })?;
        rows.reverse();
        Ok(rows)
    }
}

/// In-process claim log, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryClaimLog {
    rows: Mutex<Vec<StoredClaim>>,
    fail_appends: AtomicBool,
}

impl MemoryClaimLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later append fail, simulating a dead disk.
    pub fn set_failing(&self, failing: bool) {
        self.fail_appends.store(failing, Ordering::SeqCst);
    }

    /// Inserts a raw row, bypassing record formatting.
    pub async fn push_raw(&self, mut row: StoredClaim) {
        let mut rows = self.rows.lock().await;
        row.id = rows.len() as i64 + 1;
        rows.push(row);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Parsed copies of every stored row.
    pub async fn records(&self) -> Vec<ClaimRecord> {
        self.rows
            .lock()
            .await
            .iter()
            .filter_map(StoredClaim::to_record)
            .collect()
    }
}

#[async_trait]
impl ClaimLog for MemoryClaimLog {
    async fn append(&self, record: &ClaimRecord) -> Result<(), StorageError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::AppendFailed {
                msg: "memory log is read-only".to_string(),
            });
        }
        let mut rows = self.rows.lock().await;
        let id = rows.len() as i64 + 1;
        rows.push(StoredClaim::from_record(id, record));
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredClaim>, StorageError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredClaim>, StorageError> {
        let rows = self.rows.lock().await;
        let skip = rows.len().saturating_sub(limit);
        Ok(rows[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(amount: f64, status: ClaimStatus) -> ClaimRecord {
        ClaimRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            faucet: "drip_a".to_string(),
            coin: "BTC".to_string(),
            amount,
            status,
            message: "ok".to_string(),
        }
    }

    #[test]
    fn test_status_parse() {
        for status in [
            ClaimStatus::Success,
            ClaimStatus::Fail,
            ClaimStatus::Error,
            ClaimStatus::DriverError,
        ] {
            assert_eq!(status.as_str().parse::<ClaimStatus>(), Ok(status));
        }
        assert!("SUCCESS".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn test_stored_claim_lenient_fields() {
        let mut row = StoredClaim::from_record(1, &record(12.5, ClaimStatus::Success));
        assert_eq!(row.amount, "12.5");
        assert_eq!(row.amount_value(), 12.5);
        assert_eq!(row.date(), NaiveDate::from_ymd_opt(2024, 5, 1));

        row.amount = "lots".to_string();
        row.timestamp = "yesterday-ish".to_string();
        assert_eq!(row.amount_value(), 0.0);
        assert_eq!(row.date(), None);
        assert!(row.to_record().is_none());
    }

    #[test]
    fn test_naive_iso_timestamp_is_dated() {
        let mut row = StoredClaim::from_record(1, &record(1.0, ClaimStatus::Fail));
        row.timestamp = "2023-12-31T23:59:59.123456".to_string();
        assert_eq!(row.date(), NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    #[tokio::test]
    async fn test_memory_log_recent_is_chronological() {
        let log = MemoryClaimLog::new();
        for i in 0..5 {
            log.append(&record(i as f64, ClaimStatus::Success))
                .await
                .unwrap();
        }
        let recent = log.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].amount, "3");
        assert_eq!(recent[1].amount, "4");
        assert_eq!(log.recent(50).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_memory_log_failing_append() {
        let log = MemoryClaimLog::new();
        log.set_failing(true);
        let err = log
            .append(&record(1.0, ClaimStatus::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AppendFailed { .. }));
        assert!(log.is_empty().await);
    }
}
