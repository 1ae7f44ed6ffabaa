//! Backup rotation and restore over the file-backed stores.

mod support;

use chrono::{Duration, NaiveDate};
use std::fs;
use std::sync::Arc;

use flight_archive::db::repository::HistoricalRepository;
use flight_archive::db::services;
use flight_archive::models::FlightType;
use flight_archive::services::{BackupError, BackupManager, BackupType};
use support::{otp_arrivals, Stores};

fn manager_for(stores: &Stores) -> BackupManager {
    let mut config = stores.config.clone();
    config
        .auxiliary_files
        .insert("weather".to_string(), "weather_cache.json".into());
    BackupManager::from_config(
        &config,
        stores.cache.clone(),
        stores.archive.clone(),
        stores.clock.clone(),
    )
}

async fn seed(stores: &Stores) {
    services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Arrival,
        &otp_arrivals(),
        "api",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_nine_daily_backups_keep_seven_newest() {
    let stores = Stores::new();
    seed(&stores).await;
    let manager = manager_for(&stores);

    let mut ids = Vec::new();
    for _ in 0..9 {
        ids.push(manager.create_daily_backup().await.unwrap().id);
        stores.clock.advance(Duration::days(1));
    }

    let kept: Vec<String> = manager.list_backups().into_iter().map(|m| m.id).collect();
    assert_eq!(kept.len(), 7);
    // Newest first, the two oldest gone from the listing and from disk.
    let mut expected: Vec<String> = ids[2..].to_vec();
    expected.reverse();
    assert_eq!(kept, expected);
    for old in &ids[..2] {
        assert!(!manager.backup_dir().join(old).exists());
    }
    assert!(manager.backup_dir().join("backup_manifest.json").exists());
}

#[tokio::test]
async fn test_manifest_reflects_components() {
    let stores = Stores::new();
    seed(&stores).await;
    fs::write(stores.config.data_dir.join("weather_cache.json"), r#"{"OTP":{"temp":4}}"#).unwrap();
    let manager = manager_for(&stores);

    let manifest = manager
        .create_manual_backup(Some("Before schema change".to_string()))
        .await
        .unwrap();
    assert_eq!(manifest.backup_type, BackupType::Manual);
    assert!(manifest.is_valid);
    assert!(manifest.components.flight_cache);
    assert!(manifest.components.historical_store);
    assert_eq!(manifest.components.auxiliary.get("weather"), Some(&true));
    assert_eq!(manifest.flight_count, 10);
    assert!(manifest.description.starts_with("Before schema change - 10 flights"));
    assert!(manifest.checksums.contains_key("weather_cache.json"));
    assert!(manager.validate_backup_integrity(&manifest.id).unwrap());
}

#[tokio::test]
async fn test_restore_round_trip() {
    let stores = Stores::new();
    seed(&stores).await;
    let manager = manager_for(&stores);
    let backup = manager.create_daily_backup().await.unwrap();

    stores.cache.clear_all_cache().unwrap();
    stores
        .archive
        .delete_before(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
        .await
        .unwrap();
    assert!(stores.cache.is_empty());

    stores.clock.advance(Duration::minutes(5));
    let report = manager.restore_from_backup(&backup.id).await.unwrap();
    assert!(report.failed.is_empty());
    assert!(report.restored.contains(&"flightCache".to_string()));
    assert!(report.restored.contains(&"historicalStore".to_string()));

    assert_eq!(stores.cache.len(), 10);
    let archive: Arc<dyn HistoricalRepository> = stores.archive.clone();
    assert_eq!(archive.get_available_dates("OTP").await.unwrap().len(), 1);

    // The emptied state was saved before restoring.
    let pre = manager.get_backup(&report.pre_restore_backup_id).unwrap();
    assert_eq!(pre.backup_type, BackupType::Manual);
    assert_eq!(pre.flight_count, 0);

    // Restored data survives a restart.
    let (cache, _) = stores.reopen();
    assert_eq!(cache.len(), 10);
}

#[tokio::test]
async fn test_tampered_backup_is_refused() {
    let stores = Stores::new();
    seed(&stores).await;
    let manager = manager_for(&stores);
    let backup = manager.create_daily_backup().await.unwrap();

    let component = manager.backup_dir().join(&backup.id).join("flights_cache.json");
    fs::write(&component, "[]").unwrap();
    assert!(!manager.validate_backup_integrity(&backup.id).unwrap());

    // Checksums are re-verified per component during restore.
    stores.cache.clear_all_cache().unwrap();
    let report = manager.restore_from_backup(&backup.id).await.unwrap();
    assert!(report.failed.contains(&"flightCache".to_string()));
    assert!(stores.cache.is_empty());
}

#[tokio::test]
async fn test_unknown_backup_is_not_found() {
    let stores = Stores::new();
    let manager = manager_for(&stores);
    let err = manager.restore_from_backup("daily_backup_1999").await.unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));
    assert!(manager.list_backups().is_empty());
}
