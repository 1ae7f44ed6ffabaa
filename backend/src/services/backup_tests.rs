use super::*;
use crate::db::repositories::LocalRepository;
use crate::models::{Clock, FixedClock, FlightType, RawFlight};
use chrono::{Duration, TimeZone};
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    clock: Arc<FixedClock>,
    cache: Arc<PersistentFlightCache>,
    archive: LocalRepository,
    manager: BackupManager,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()));
    let (cache, _) =
        PersistentFlightCache::open(dir.path().join("flights_cache.json"), 14, clock.clone()).unwrap();
    let cache = Arc::new(cache);
    let archive = LocalRepository::new();
    let manager = BackupManager::new(
        dir.path().join("daily_backups"),
        cache.clone(),
        Arc::new(archive.clone()),
        clock.clone(),
    );
    Fixture {
        dir,
        clock,
        cache,
        archive,
        manager,
    }
}

fn seed(cache: &PersistentFlightCache) {
    let batch = vec![
        RawFlight::from(json!({"flight_number": "RO301", "scheduled_time": "2025-03-09T07:45:00Z"})),
        RawFlight::from(json!({"flight_number": "W63101", "scheduled_time": "2025-03-09T09:10:00Z"})),
    ];
    cache
        .add_flight_data("OTP", FlightType::Departure, &batch, "test")
        .unwrap();
}

fn backup_dirs(manager: &BackupManager) -> Vec<String> {
    let mut dirs: Vec<String> = fs::read_dir(manager.backup_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    dirs.sort();
    dirs
}

#[tokio::test]
async fn test_daily_backup_captures_components() {
    let f = fixture();
    seed(&f.cache);

    let manifest = f.manager.create_daily_backup().await.unwrap();
    assert!(manifest.is_valid);
    assert!(manifest.components.flight_cache);
    assert!(manifest.components.historical_store);
    assert_eq!(manifest.flight_count, 2);
    assert!(manifest.id.starts_with("daily_backup_2025-03-10T00-00-00"));
    assert!(manifest.description.starts_with("Daily backup - 2 flights, "));
    assert!(manifest.checksums.contains_key(CACHE_COMPONENT_FILE));

    let dir = f.manager.backup_dir().join(&manifest.id);
    assert!(dir.join(MANIFEST_FILE).exists());
    assert!(dir.join(CACHE_COMPONENT_FILE).exists());
    assert_eq!(f.manager.list_backups(), vec![manifest]);
}

#[tokio::test]
async fn test_nine_backups_leave_seven() {
    let f = fixture();
    let mut ids = Vec::new();
    for _ in 0..9 {
        ids.push(f.manager.create_daily_backup().await.unwrap().id);
        f.clock.advance(Duration::days(1));
    }

    let listed = f.manager.list_backups();
    assert_eq!(listed.len(), 7);
    assert!(listed.windows(2).all(|w| w[0].created_at > w[1].created_at));

    let expected: Vec<String> = ids[2..].iter().rev().cloned().collect();
    let listed_ids: Vec<String> = listed.iter().map(|m| m.id.clone()).collect();
    assert_eq!(listed_ids, expected);

    let mut on_disk = backup_dirs(&f.manager);
    let mut from_manifest = listed_ids.clone();
    on_disk.sort();
    from_manifest.sort();
    assert_eq!(on_disk, from_manifest);
}

#[tokio::test]
async fn test_same_instant_gets_suffixed_id() {
    let f = fixture();
    let a = f.manager.create_manual_backup(None).await.unwrap();
    let b = f.manager.create_manual_backup(None).await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(b.id, format!("{}_1", a.id));
    assert_eq!(f.manager.list_backups()[0].id, b.id);
}

#[tokio::test]
async fn test_same_instant_rotation_keeps_newest() {
    let f = fixture();
    let mut created = Vec::new();
    for _ in 0..11 {
        let manifest = f.manager.create_manual_backup(None).await.unwrap();
        assert!(f.manager.backup_dir().join(&manifest.id).exists());
        created.push(manifest);
    }

    // Rotation freed the early names, but none is handed out again.
    let base = &created[0].id;
    let last = created.last().unwrap();
    assert_eq!(last.id, format!("{}_10", base));
    assert_eq!(last.sequence, 11);

    let listed: Vec<String> = f.manager.list_backups().into_iter().map(|m| m.id).collect();
    let expected: Vec<String> = created[4..].iter().rev().map(|m| m.id.clone()).collect();
    assert_eq!(listed, expected);

    let mut kept = expected.clone();
    kept.sort();
    assert_eq!(backup_dirs(&f.manager), kept);
}

#[tokio::test]
async fn test_unavailable_archive_still_valid() {
    let f = fixture();
    seed(&f.cache);
    f.archive.set_healthy(false);

    let manifest = f.manager.create_daily_backup().await.unwrap();
    assert!(manifest.is_valid);
    assert!(manifest.components.flight_cache);
    assert!(!manifest.components.historical_store);
    assert!(f.manager.validate_backup_integrity(&manifest.id).unwrap());
}

#[tokio::test]
async fn test_missing_auxiliary_file_is_not_captured() {
    let f = fixture();
    let weather = f.dir.path().join("weather_cache.json");
    let manager = BackupManager::new(
        f.dir.path().join("other_backups"),
        f.cache.clone(),
        Arc::new(f.archive.clone()),
        f.clock.clone(),
    )
    .with_auxiliary(BTreeMap::from([("weather".to_string(), weather.clone())]));

    let manifest = manager.create_manual_backup(Some("before deploy".into())).await.unwrap();
    assert_eq!(manifest.components.auxiliary.get("weather"), Some(&false));
    assert!(manifest.description.starts_with("before deploy - "));

    fs::write(&weather, br#"{"OTP": {"temp": 12}}"#).unwrap();
    let manifest = manager.create_manual_backup(None).await.unwrap();
    assert_eq!(manifest.components.auxiliary.get("weather"), Some(&true));
    assert!(manager
        .backup_dir()
        .join(&manifest.id)
        .join("weather_cache.json")
        .exists());
}

#[tokio::test]
async fn test_tampered_component_fails_validation() {
    let f = fixture();
    seed(&f.cache);
    let manifest = f.manager.create_daily_backup().await.unwrap();
    assert!(f.manager.validate_backup_integrity(&manifest.id).unwrap());

    let cache_copy = f.manager.backup_dir().join(&manifest.id).join(CACHE_COMPONENT_FILE);
    fs::write(&cache_copy, b"{}").unwrap();
    assert!(!f.manager.validate_backup_integrity(&manifest.id).unwrap());

    fs::write(&cache_copy, b"{not json").unwrap();
    assert!(!f.manager.validate_backup_integrity(&manifest.id).unwrap());
}

#[tokio::test]
async fn test_validate_unknown_backup() {
    let f = fixture();
    assert!(matches!(
        f.manager.validate_backup_integrity("nope"),
        Err(BackupError::NotFound(_))
    ));
    assert!(matches!(
        f.manager.validate_backup_integrity("../secrets"),
        Err(BackupError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_restore_brings_back_cache() {
    let f = fixture();
    seed(&f.cache);
    let backup = f.manager.create_daily_backup().await.unwrap();

    f.cache.clear_all_cache().unwrap();
    assert!(f.cache.is_empty());
    f.clock.advance(Duration::hours(1));

    let report = f.manager.restore_from_backup(&backup.id).await.unwrap();
    assert_eq!(f.cache.len(), 2);
    assert_eq!(report.backup_id, backup.id);
    assert!(report.restored.contains(&"flightCache".to_string()));
    assert!(report.restored.contains(&"historicalStore".to_string()));
    assert!(report.failed.is_empty());

    let pre = f.manager.get_backup(&report.pre_restore_backup_id).unwrap();
    assert_eq!(pre.backup_type, BackupType::Manual);
    assert_eq!(pre.flight_count, 0);
    assert_eq!(f.manager.list_backups().len(), 2);
}

#[tokio::test]
async fn test_restore_invalid_backup_touches_nothing() {
    let f = fixture();
    seed(&f.cache);
    let good = f.manager.create_daily_backup().await.unwrap();

    let bad_id = "daily_backup_broken";
    let bad_dir = f.manager.backup_dir().join(bad_id);
    fs::create_dir_all(&bad_dir).unwrap();
    let bad = BackupManifest {
        id: bad_id.to_string(),
        created_at: f.clock.now() - Duration::days(1),
        sequence: 0,
        backup_type: BackupType::Daily,
        components: BackupComponents::default(),
        checksums: BTreeMap::new(),
        total_size: 0,
        flight_count: 0,
        is_valid: false,
        description: "Daily backup - 0 flights, 0 KB".to_string(),
    };
    fs::write(bad_dir.join(MANIFEST_FILE), serde_json::to_vec(&bad).unwrap()).unwrap();

    let live_before = fs::read(f.cache.path()).unwrap();
    let dirs_before = backup_dirs(&f.manager);

    let err = f.manager.restore_from_backup(bad_id).await.unwrap_err();
    assert!(matches!(err, BackupError::InvalidBackup(_)));
    assert_eq!(fs::read(f.cache.path()).unwrap(), live_before);
    assert_eq!(backup_dirs(&f.manager), dirs_before);
    assert_eq!(f.manager.list_backups(), vec![good]);
}

#[tokio::test]
async fn test_rotation_removes_incomplete_directories() {
    let f = fixture();
    f.manager.create_daily_backup().await.unwrap();
    fs::create_dir_all(f.manager.backup_dir().join("daily_backup_half_written")).unwrap();

    assert_eq!(f.manager.clean_old_backups().await.unwrap(), 1);
    assert_eq!(backup_dirs(&f.manager).len(), 1);
}

#[tokio::test]
async fn test_backup_stats() {
    let f = fixture();
    f.manager.create_daily_backup().await.unwrap();
    f.clock.advance(Duration::hours(2));
    f.manager.create_manual_backup(None).await.unwrap();

    let stats = f.manager.get_backup_stats();
    assert_eq!(stats.total_backups, 2);
    assert_eq!(stats.daily_backups, 1);
    assert_eq!(stats.manual_backups, 1);
    assert!(stats.newest_backup > stats.oldest_backup);
    assert!(stats.next_scheduled_backup.unwrap() > f.clock.now());

    let unscheduled = BackupManager::new(
        f.manager.backup_dir().to_path_buf(),
        f.cache.clone(),
        Arc::new(f.archive.clone()),
        f.clock.clone(),
    )
    .with_scheduling(false);
    assert!(unscheduled.get_backup_stats().next_scheduled_backup.is_none());
}
