// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for recording output files

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::constants::{encoding, recording};
use crate::errors::{AppError, AppResult};

/// Default directory for recording output
///
/// The platform videos directory when one exists, otherwise the home
/// directory, otherwise the working directory; always with a
/// `recordings` subdirectory appended.
pub fn default_recordings_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(recording::RECORDINGS_DIR_NAME)
}

/// Create the output directory if it does not exist yet
pub fn ensure_dir(dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Storage(format!("creating {}: {e}", dir.display())))
}

/// Timestamped output path for a new recording, `YYYYMMDD_HHMMSS.mp4`
pub fn timestamped_output(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(encoding::TIMESTAMP_FORMAT);
    dir.join(format!("{stamp}.{}", encoding::OUTPUT_EXTENSION))
}

/// List recordings in `dir`, newest first
///
/// Scans for files with the output extension. A missing or unreadable
/// directory yields an empty list.
pub async fn list_recordings(dir: PathBuf) -> Vec<PathBuf> {
    let scanned = tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_recording = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(encoding::OUTPUT_EXTENSION))
                    .unwrap_or(false);
                if !is_recording {
                    continue;
                }
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(UNIX_EPOCH);
                files.push((modified, path));
            }
        }
        files.sort_by_key(|(modified, _)| std::cmp::Reverse(*modified));
        files.into_iter().map(|(_, path)| path).collect::<Vec<_>>()
    })
    .await;

    match scanned {
        Ok(files) => files,
        Err(err) => {
            debug!(error = %err, "Recording scan task failed");
            Vec::new()
        }
    }
}

/// Most recently modified recording in `dir`, if any
pub async fn latest_recording(dir: PathBuf) -> Option<PathBuf> {
    list_recordings(dir).await.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_default_dir_ends_with_recordings() {
        let dir = default_recordings_dir();
        assert_eq!(
            dir.file_name().and_then(|n| n.to_str()),
            Some("recordings")
        );
    }

    #[test]
    fn test_timestamped_output_shape() {
        let path = timestamped_output(Path::new("/tmp/out"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
        // YYYYMMDD_HHMMSS
        assert_eq!(stem.len(), 15);
        assert_eq!(stem.as_bytes()[8], b'_');
        assert!(
            stem.chars().all(|c| c.is_ascii_digit() || c == '_'),
            "unexpected stem {stem:?}"
        );
    }

    #[tokio::test]
    async fn test_list_recordings_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.mp4"), b"a").unwrap();
        thread::sleep(Duration::from_millis(50));
        std::fs::write(dir.path().join("new.mp4"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();

        let files = list_recordings(dir.path().to_path_buf()).await;
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["new.mp4", "old.mp4"]);

        let latest = latest_recording(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(latest.file_name().and_then(|n| n.to_str()), Some("new.mp4"));
    }

    #[tokio::test]
    async fn test_missing_dir_lists_empty() {
        let dir = PathBuf::from("/nonexistent/angiocam-recordings");
        assert!(list_recordings(dir.clone()).await.is_empty());
        assert!(latest_recording(dir).await.is_none());
    }
}
