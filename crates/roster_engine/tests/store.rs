use std::fs;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use roster_core::{JobKind, JobSnapshot, JobState, RetryPolicy};
use roster_engine::{
    ensure_state_dir, load_config, load_jobs, load_jobs_at, load_ron, save_config, save_jobs,
    ConsoleConfig, JOBS_FILENAME,
};

fn snapshot(job_id: &str, elapsed_secs: u64) -> JobSnapshot {
    JobSnapshot {
        job_id: job_id.to_string(),
        kind: JobKind::BulkDelete,
        description: "Deleting leavers".to_string(),
        total: 12,
        current: 3,
        status: "Deleting accounts".to_string(),
        state: JobState::Running,
        elapsed_secs,
    }
}

#[test]
fn config_round_trips_through_ron() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console.ron");

    let mut config = ConsoleConfig::default();
    config.api.base_url = "https://accounts.example.org".to_string();
    config
        .api
        .headers
        .insert("X-Application-Id".to_string(), "app-123".to_string());
    config.user_retry = RetryPolicy {
        max_attempts: 5,
        base_delay_ms: 250,
        max_delay_ms: 4_000,
    };
    config.poller.interval_ms = 2_000;

    save_config(&path, &config).unwrap();
    assert_eq!(load_config(&path), config);
}

#[test]
fn missing_config_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        load_config(&dir.path().join("absent.ron")),
        ConsoleConfig::default()
    );
}

#[test]
fn invalid_config_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console.ron");
    fs::write(&path, "(api: (base_url: 42").unwrap();
    assert_eq!(load_config(&path), ConsoleConfig::default());
}

#[test]
fn partial_config_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console.ron");
    fs::write(&path, r#"(api: (base_url: "https://accounts.example.org"))"#).unwrap();

    let config = load_config(&path);
    assert_eq!(config.api.base_url, "https://accounts.example.org");
    assert_eq!(config.api.request_timeout_ms, 30_000);
    assert_eq!(config.user_retry, RetryPolicy::user_facing());
    assert_eq!(config.poll_retry, RetryPolicy::background());
    assert_eq!(config.elapsed.assume_complete_after_secs, 120);
}

#[test]
fn jobs_round_trip_and_count_offline_time() {
    let dir = tempfile::tempdir().unwrap();
    ensure_state_dir(dir.path()).unwrap();
    let jobs = vec![snapshot("d-1", 30), snapshot("d-2", 0)];

    save_jobs(dir.path(), &jobs).unwrap();
    assert!(dir.path().join(JOBS_FILENAME).exists());

    let loaded = load_jobs_at(dir.path(), Utc::now() + Duration::seconds(60));
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].job_id, "d-1");
    assert!((90..=91).contains(&loaded[0].elapsed_secs));
    assert!((60..=61).contains(&loaded[1].elapsed_secs));
    assert_eq!(loaded[1].status, "Deleting accounts");
}

#[test]
fn missing_or_corrupt_jobs_load_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_jobs(dir.path()).is_empty());

    fs::write(dir.path().join(JOBS_FILENAME), "not ron at all").unwrap();
    assert!(load_jobs(dir.path()).is_empty());
}

#[test]
fn load_ron_reports_missing_files_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let loaded: Option<ConsoleConfig> = load_ron(&dir.path().join("nothing.ron")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn ensure_state_dir_creates_nested_directories() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state").join("roster");
    ensure_state_dir(&nested).unwrap();
    assert!(nested.is_dir());
}
