use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Config, RecordingsConfig};

/// Path for a new recording, named by unix timestamp.
///
/// # Errors
/// Returns error if the system clock is before the unix epoch or HOME is
/// unset.
pub fn new_recording_path() -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("failed to get current time")?
        .as_secs();
    Ok(Config::recordings_dir()?.join(format!("recording_{timestamp}.wav")))
}

/// Delete recordings beyond the retention policy.
///
/// Recordings older than `retention_days` or past `max_count` (newest kept)
/// are removed. Returns the number of files deleted. Individual deletion
/// failures are logged and skipped.
///
/// # Errors
/// Returns error if the recordings directory cannot be listed.
pub fn cleanup_old_recordings(config: &RecordingsConfig) -> Result<usize> {
    let dir = Config::recordings_dir()?;

    if !dir.exists() {
        return Ok(0);
    }

    let mut recordings: Vec<(PathBuf, u64)> = fs::read_dir(&dir)
        .context("failed to read recordings directory")?
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if !path.is_file() {
                return None;
            }

            let filename = path.file_name()?.to_str()?;
            let timestamp: u64 = filename
                .strip_prefix("recording_")?
                .strip_suffix(".wav")?
                .parse()
                .ok()?;

            Some((path, timestamp))
        })
        .collect();

    if recordings.is_empty() {
        return Ok(0);
    }

    // Newest first
    recordings.sort_by(|a, b| b.1.cmp(&a.1));

    let mut to_delete = HashSet::new();

    if config.retention_days > 0 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("failed to get current time")?
            .as_secs();
        let retention_secs = u64::from(config.retention_days) * 24 * 60 * 60;

        for (path, timestamp) in &recordings {
            if now.saturating_sub(*timestamp) > retention_secs {
                to_delete.insert(path.clone());
            }
        }
    }

    if config.max_count > 0 && recordings.len() > config.max_count {
        for (path, _) in recordings.iter().skip(config.max_count) {
            to_delete.insert(path.clone());
        }
    }

    let mut deleted_count = 0;
    for path in to_delete {
        match fs::remove_file(&path) {
            Ok(()) => {
                deleted_count += 1;
                tracing::debug!("deleted recording: {}", path.display());
            }
            Err(e) => {
                tracing::warn!("failed to delete {}: {}", path.display(), e);
            }
        }
    }

    if deleted_count > 0 {
        tracing::info!(
            deleted = deleted_count,
            remaining = recordings.len() - deleted_count,
            "recordings cleanup complete"
        );
    }

    Ok(deleted_count)
}
