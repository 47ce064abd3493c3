// SPDX-License-Identifier: MPL-2.0

//! Best-effort preview sink.
//!
//! The pull loop publishes each filtered frame into a lock-free slot;
//! consumers read whatever is newest whenever they get around to it. A
//! slow consumer only ever misses frames, it can never block the loop.
//! Snapshots encode the current slot content to a PNG on disk.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use image::RgbImage;
use tracing::{debug, info};

use crate::backends::capture::CameraFrame;
use crate::constants::preview;
use crate::errors::{AppError, AppResult};

/// Latest-frame slot shared between the pull loop and consumers.
pub struct PreviewSink {
    latest: ArcSwapOption<CameraFrame>,
}

impl PreviewSink {
    pub fn new() -> Self {
        Self {
            latest: ArcSwapOption::empty(),
        }
    }

    /// Publishes a frame, replacing whatever was there. Never blocks.
    pub fn publish(&self, frame: CameraFrame) {
        self.latest.store(Some(Arc::new(frame)));
    }

    /// The most recently published frame, if any.
    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.latest.load_full()
    }

    /// Empties the slot, used when the capture source goes away.
    pub fn clear(&self) {
        self.latest.store(None);
    }

    /// Encodes the current frame to a PNG at `path`.
    ///
    /// Compression runs on the blocking pool so callers on the async
    /// runtime are not stalled by it.
    pub async fn snapshot(&self, path: PathBuf) -> AppResult<PathBuf> {
        let Some(frame) = self.latest() else {
            return Err(AppError::Other("no preview frame available".into()));
        };

        info!(path = %path.display(), "Saving preview snapshot");
        let saved = tokio::task::spawn_blocking(move || -> AppResult<PathBuf> {
            let image = bgr_frame_to_rgb(&frame)
                .ok_or_else(|| AppError::Other("preview frame has a malformed buffer".into()))?;
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| AppError::Storage(format!("snapshot save failed: {e}")))?;
            Ok(path)
        })
        .await
        .map_err(|e| AppError::Other(format!("snapshot task error: {e}")))??;

        debug!(path = %saved.display(), "Snapshot saved");
        Ok(saved)
    }
}

impl Default for PreviewSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Size of the preview rendering surface for a capture resolution: the
/// width is fixed and the height follows the source aspect ratio,
/// truncated to whole pixels.
pub fn preview_target_size(width: u32, height: u32) -> (u32, u32) {
    let width = u64::from(width.max(1));
    let height = u64::from(height.max(1));
    let target_height = (u64::from(preview::TARGET_WIDTH) * height / width) as u32;
    (preview::TARGET_WIDTH, target_height.max(1))
}

/// Repacks a BGR24 frame into an [`RgbImage`].
fn bgr_frame_to_rgb(frame: &CameraFrame) -> Option<RgbImage> {
    if frame.data.len() != frame.expected_len() {
        return None;
    }
    let mut rgb = Vec::with_capacity(frame.data.len());
    for px in frame.data.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    RgbImage::from_raw(frame.width, frame.height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_starts_empty() {
        let sink = PreviewSink::new();
        assert!(sink.latest().is_none());
    }

    #[test]
    fn test_publish_replaces_previous() {
        let sink = PreviewSink::new();
        sink.publish(CameraFrame::new(2, 2, vec![1u8; 12]));
        sink.publish(CameraFrame::new(2, 2, vec![9u8; 12]));

        let latest = sink.latest().unwrap();
        assert!(latest.data.iter().all(|&b| b == 9));
    }

    #[test]
    fn test_clear_empties_slot() {
        let sink = PreviewSink::new();
        sink.publish(CameraFrame::new(2, 2, vec![1u8; 12]));
        sink.clear();
        assert!(sink.latest().is_none());
    }

    #[test]
    fn test_target_size_keeps_aspect_on_divisible_pairs() {
        for (w, h) in [(640, 480), (1920, 1080), (1280, 720), (320, 240)] {
            let (tw, th) = preview_target_size(w, h);
            assert_eq!(tw, 1280);
            assert_eq!(
                u64::from(tw) * u64::from(h),
                u64::from(th) * u64::from(w),
                "aspect changed for {w}x{h}"
            );
        }
    }

    #[test]
    fn test_target_size_truncates_fractional_height() {
        // 1280 * 480 / 641 = 958.5..., truncated to whole pixels.
        assert_eq!(preview_target_size(641, 480), (1280, 958));
    }

    #[test]
    fn test_target_size_handles_degenerate_input() {
        let (tw, th) = preview_target_size(0, 0);
        assert_eq!(tw, 1280);
        assert!(th >= 1);
    }

    #[tokio::test]
    async fn test_snapshot_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.png");

        let sink = PreviewSink::new();
        sink.publish(CameraFrame::new(4, 3, vec![200u8; 36]));

        let saved = sink.snapshot(path.clone()).await.unwrap();
        assert_eq!(saved, path);
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
    }

    #[tokio::test]
    async fn test_snapshot_without_frame_fails() {
        let sink = PreviewSink::new();
        let result = sink.snapshot(PathBuf::from("/tmp/never.png")).await;
        assert!(result.is_err());
    }
}
