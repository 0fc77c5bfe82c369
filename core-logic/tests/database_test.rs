use chrono::{TimeZone, Utc};
use core_logic::database::{ClaimLog, ClaimRecord, ClaimStatus, DatabaseManager};
use tempfile::TempDir;

fn record(minute: u32, faucet: &str, amount: f64, status: ClaimStatus) -> ClaimRecord {
    ClaimRecord {
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        faucet: faucet.to_string(),
        coin: "DOGE".to_string(),
        amount,
        status,
        message: format!("attempt {}", minute),
    }
}

async fn open(dir: &TempDir) -> (DatabaseManager, String) {
    let path = dir.path().join("nested").join("farm_log.db");
    let path = path.to_str().unwrap().to_string();
    (DatabaseManager::new(&path).await.unwrap(), path)
}

#[tokio::test]
async fn test_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let (db, path) = open(&dir).await;
    assert!(std::path::Path::new(&path).exists());
    assert!(db.load_all().await.unwrap().is_empty());
    db.close().await;
}

#[tokio::test]
async fn test_append_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _) = open(&dir).await;

    let written = vec![
        record(0, "drip_a", 7.0, ClaimStatus::Success),
        record(1, "drip_a", 0.0, ClaimStatus::Fail),
        record(2, "drip_b", 0.0, ClaimStatus::DriverError),
        record(3, "drip_b", 0.125, ClaimStatus::Success),
    ];
    for rec in &written {
        db.append(rec).await.unwrap();
    }

    let rows = db.load_all().await.unwrap();
    assert_eq!(rows.len(), written.len());
    for (row, rec) in rows.iter().zip(&written) {
        assert_eq!(row.to_record().as_ref(), Some(rec));
    }
    assert_eq!(rows[2].status, "driver_error");
    assert!(rows.windows(2).all(|w| w[0].id < w[1].id));

    let metrics = db.get_metrics();
    assert_eq!(metrics.total_inserts, 4);
    assert_eq!(metrics.total_errors, 0);
    assert_eq!(metrics.error_rate(), 0.0);
    assert!(metrics.total_queries >= 4);

    db.close().await;
}

#[tokio::test]
async fn test_recent_is_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _) = open(&dir).await;
    for minute in 0..6 {
        db.append(&record(minute, "drip_a", 1.0, ClaimStatus::Success))
            .await
            .unwrap();
    }

    let recent = db.recent(3).await.unwrap();
    let messages: Vec<_> = recent.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["attempt 3", "attempt 4", "attempt 5"]);
    assert_eq!(db.recent(100).await.unwrap().len(), 6);

    db.close().await;
}

#[tokio::test]
async fn test_reopen_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (db, _) = open(&dir).await;
        db.append(&record(0, "drip_a", 3.0, ClaimStatus::Success))
            .await
            .unwrap();
        db.close().await;
    }

    let (db, _) = open(&dir).await;
    db.append(&record(1, "drip_a", 4.0, ClaimStatus::Success))
        .await
        .unwrap();
    let rows = db.load_all().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].amount_value(), 3.0);
    assert_eq!(rows[1].amount_value(), 4.0);
    db.close().await;
}

#[tokio::test]
async fn test_open_existing_leaves_missing_path_alone() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    let path = nested.join("farm_log.db");
    let path = path.to_str().unwrap();

    assert!(DatabaseManager::open_existing(path).await.unwrap().is_none());
    assert!(!nested.exists());

    let (db, _) = open(&dir).await;
    db.append(&record(0, "drip_a", 1.0, ClaimStatus::Success))
        .await
        .unwrap();
    db.close().await;

    let db = DatabaseManager::open_existing(path).await.unwrap().unwrap();
    assert_eq!(db.load_all().await.unwrap().len(), 1);
    db.close().await;
}
