use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use roster_core::csv::to_csv_string;
use roster_core::{CsvRow, JobSnapshot};
use roster_logging::{roster_info, roster_warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File holding in-flight jobs between console sessions.
pub const JOBS_FILENAME: &str = ".roster_jobs.ron";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state directory missing or not writable: {0}")]
    Directory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not parse {path}: {message}")]
    Ron { path: PathBuf, message: String },
    #[error("could not serialize state: {0}")]
    Serialize(String),
}

/// Create `dir` if needed and check that it accepts new files.
pub fn ensure_state_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::Directory(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    Ok(())
}

/// Serialize `value` as pretty RON and swap it into `path` atomically.
pub fn save_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::new())
        .map_err(|e| StoreError::Serialize(e.to_string()))?;
    write_atomically(path, &content)
}

/// Write `rows` as CSV to `path` before a destructive sweep.
///
/// Goes through the same temp-file swap as the state files.
pub fn write_csv_backup(
    path: &Path,
    headers: &[String],
    rows: &[CsvRow],
) -> Result<(), StoreError> {
    write_atomically(path, &to_csv_string(headers, rows))?;
    roster_info!("Backed up {} row(s) to {:?}", rows.len(), path);
    Ok(())
}

fn write_atomically(path: &Path, content: &str) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_state_dir(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Read RON from `path`. A missing file is `Ok(None)`.
pub fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::Io(err)),
    };
    ron::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Ron {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedJobs {
    saved_utc: DateTime<Utc>,
    jobs: Vec<JobSnapshot>,
}

pub fn save_jobs(dir: &Path, jobs: &[JobSnapshot]) -> Result<(), StoreError> {
    let state = PersistedJobs {
        saved_utc: Utc::now(),
        jobs: jobs.to_vec(),
    };
    save_ron(&dir.join(JOBS_FILENAME), &state)?;
    roster_info!("Saved {} tracked job(s) to {:?}", jobs.len(), dir);
    Ok(())
}

/// Load persisted jobs, counting the time the console was closed as elapsed.
///
/// Unreadable state is logged and treated as empty.
pub fn load_jobs(dir: &Path) -> Vec<JobSnapshot> {
    load_jobs_at(dir, Utc::now())
}

pub fn load_jobs_at(dir: &Path, now: DateTime<Utc>) -> Vec<JobSnapshot> {
    let path = dir.join(JOBS_FILENAME);
    let state: PersistedJobs = match load_ron(&path) {
        Ok(Some(state)) => state,
        Ok(None) => return Vec::new(),
        Err(err) => {
            roster_warn!("Ignoring persisted jobs: {}", err);
            return Vec::new();
        }
    };

    let offline_secs = (now - state.saved_utc).num_seconds().max(0) as u64;
    state
        .jobs
        .into_iter()
        .map(|mut job| {
            job.elapsed_secs = job.elapsed_secs.saturating_add(offline_secs);
            job
        })
        .collect()
}
