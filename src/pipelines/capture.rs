// SPDX-License-Identifier: MPL-2.0

//! Live capture pipeline with filter fan-out.
//!
//! The pipeline owns the frame source and a dedicated pull loop. Every
//! pulled frame is filtered once with the current [`FilterConfig`]
//! snapshot, then the same filtered frame goes to the preview slot and,
//! while a recording is attached, into the recording channel. The
//! preview can only miss frames and the recording channel can only drop
//! them; neither sink can ever block the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::backends::capture::{
    CameraFrame, CaptureCapability, CaptureLoopController, Device, FfmpegCaptureSource,
    FrameSource, LoopAction,
};
use crate::backends::ffmpeg::FfmpegCommand;
use crate::errors::{AppResult, CaptureError, RecordingError};
use crate::media::filters::{FilterConfig, apply_filters};
use crate::pipelines::preview::PreviewSink;

/// Pipeline lifecycle. Recording always overlaps Previewing; a stopped
/// or exhausted source returns the pipeline to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Previewing,
    Recording,
}

/// State shared between the pull loop and the controlling thread.
struct PipelineShared {
    filters: ArcSwap<FilterConfig>,
    preview: PreviewSink,
    recording: Mutex<Option<SyncSender<CameraFrame>>>,
    state: Mutex<PipelineState>,
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
}

impl PipelineShared {
    fn new() -> Self {
        Self {
            filters: ArcSwap::from_pointee(FilterConfig::default()),
            preview: PreviewSink::new(),
            recording: Mutex::new(None),
            state: Mutex::new(PipelineState::Idle),
            frames_captured: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: PipelineState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Filters one frame and hands it to the active sinks.
    ///
    /// The recording sink gets the exact frame produced by this
    /// iteration; a full channel drops the frame rather than waiting.
    fn dispatch(&self, frame: CameraFrame) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);

        let config = **self.filters.load();
        let filtered = apply_filters(&frame, config);

        let mut recording = self.recording.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = recording.as_ref() {
            match sender.try_send(filtered.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Recording channel full, dropping frame");
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Recording sink gone, detaching");
                    *recording = None;
                    self.set_state(PipelineState::Previewing);
                }
            }
        }
        drop(recording);

        self.preview.publish(filtered);
    }

    /// Releases the sinks and returns to Idle. Dropping the recording
    /// sender lets an attached session observe the end of the stream.
    fn finish(&self) {
        *self.recording.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.preview.clear();
        self.set_state(PipelineState::Idle);
    }
}

/// Owns the live frame source and fans filtered frames out to sinks.
pub struct CapturePipeline {
    shared: Arc<PipelineShared>,
    controller: Option<CaptureLoopController>,
    capability: Option<CaptureCapability>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PipelineShared::new()),
            controller: None,
            capability: None,
        }
    }

    /// Opens the device at the requested capability and starts pulling.
    ///
    /// On failure the state stays Idle. An already-running pipeline
    /// refuses a second source.
    pub fn start(
        &mut self,
        ffmpeg: &FfmpegCommand,
        device: &Device,
        capability: CaptureCapability,
    ) -> AppResult<()> {
        if self.is_running() {
            return Err(CaptureError::SourceBusy.into());
        }
        let source = FfmpegCaptureSource::open(ffmpeg, device, capability)?;
        self.start_with_source(Box::new(source), capability)
    }

    /// Starts the pull loop over an already-open source.
    ///
    /// This is the seam tests use to drive the pipeline with synthetic
    /// sources instead of a capture process.
    pub fn start_with_source(
        &mut self,
        source: Box<dyn FrameSource>,
        capability: CaptureCapability,
    ) -> AppResult<()> {
        if self.is_running() {
            return Err(CaptureError::SourceBusy.into());
        }

        info!(capability = %capability, "Capture pipeline starting");
        self.shared.set_state(PipelineState::Previewing);
        self.capability = Some(capability);

        let shared = Arc::clone(&self.shared);
        let mut source = source;
        let controller = CaptureLoopController::start("capture-pull", move || {
            let Some(frame) = source.next_frame() else {
                info!("Capture source exhausted");
                shared.finish();
                return LoopAction::Stop;
            };
            shared.dispatch(frame);
            LoopAction::Continue
        });

        self.controller = Some(controller);
        Ok(())
    }

    /// Stops the pull loop and releases the source. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            info!("Capture pipeline stopping");
            controller.stop();
        }
        self.shared.finish();
        self.capability = None;
    }

    pub fn is_running(&self) -> bool {
        self.controller
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Capability the pipeline was started with, while running.
    pub fn capability(&self) -> Option<CaptureCapability> {
        self.capability
    }

    /// Replaces the filter snapshot; the next pulled frame uses it.
    pub fn set_filters(&self, config: FilterConfig) {
        self.shared.filters.store(Arc::new(config));
    }

    pub fn filters(&self) -> FilterConfig {
        **self.shared.filters.load()
    }

    pub fn preview(&self) -> &PreviewSink {
        &self.shared.preview
    }

    pub fn frames_captured(&self) -> u64 {
        self.shared.frames_captured.load(Ordering::Relaxed)
    }

    /// Frames dropped because the recording channel was full.
    pub fn frames_dropped(&self) -> u64 {
        self.shared.frames_dropped.load(Ordering::Relaxed)
    }

    /// Routes a copy of every filtered frame into `sender` until the
    /// recording ends. Only one recording may be attached at a time, and
    /// only while the pipeline is previewing.
    pub fn attach_recording_sink(&self, sender: SyncSender<CameraFrame>) -> AppResult<()> {
        match self.shared.state() {
            PipelineState::Recording => Err(RecordingError::AlreadyRecording.into()),
            PipelineState::Idle => Err(CaptureError::SourceUnavailable(
                "capture pipeline is not active".to_string(),
            )
            .into()),
            PipelineState::Previewing => {
                *self
                    .shared
                    .recording
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = Some(sender);
                self.shared.set_state(PipelineState::Recording);
                Ok(())
            }
        }
    }

    /// Detaches the recording sink, dropping its sender. Idempotent.
    pub fn detach_recording_sink(&self) {
        let mut recording = self
            .shared
            .recording
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if recording.take().is_some() && self.shared.state() == PipelineState::Recording {
            self.shared.set_state(if self.is_running() {
                PipelineState::Previewing
            } else {
                PipelineState::Idle
            });
        }
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if self.controller.is_some() {
            warn!("Capture pipeline dropped while running, stopping it");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Yields `count` frames whose blue channel carries the frame
    /// index, then reports exhaustion. Channels differ so colour
    /// filters visibly change the bytes.
    struct ScriptedSource {
        count: u8,
        yielded: u8,
        pace: Duration,
    }

    impl ScriptedSource {
        fn new(count: u8) -> Self {
            Self {
                count,
                yielded: 0,
                pace: Duration::from_millis(2),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Option<CameraFrame> {
            if self.yielded >= self.count {
                return None;
            }
            thread::sleep(self.pace);
            self.yielded += 1;
            let pixel = [self.yielded, 60, 200];
            Some(CameraFrame::new(2, 2, pixel.repeat(4)))
        }
    }

    fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_publishes_preview_frames() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(200)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        assert_eq!(pipeline.state(), PipelineState::Previewing);
        wait_for("a preview frame", || pipeline.preview().latest().is_some());
        assert!(pipeline.frames_captured() > 0);

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.preview().latest().is_none());

        // Stopping again is a no-op.
        pipeline.stop();
    }

    #[test]
    fn test_second_start_is_refused_while_running() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(255)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        let result = pipeline.start_with_source(
            Box::new(ScriptedSource::new(1)),
            CaptureCapability::new(2, 2, 30),
        );
        assert!(result.is_err());
        pipeline.stop();
    }

    #[test]
    fn test_exhausted_source_returns_to_idle() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(3)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        wait_for("pipeline to go idle", || {
            pipeline.state() == PipelineState::Idle
        });
        assert_eq!(pipeline.frames_captured(), 3);
        assert!(pipeline.preview().latest().is_none());
    }

    #[test]
    fn test_recording_gets_frames_in_pull_order() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(30)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        let (sender, receiver) = sync_channel::<CameraFrame>(64);
        pipeline.attach_recording_sink(sender).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Recording);

        wait_for("source to drain", || {
            pipeline.state() == PipelineState::Idle
        });

        let markers: Vec<u8> = receiver.iter().map(|f| f.data[0]).collect();
        assert!(!markers.is_empty());
        for pair in markers.windows(2) {
            assert!(pair[0] < pair[1], "frames reordered: {markers:?}");
        }
    }

    #[test]
    fn test_attach_requires_active_pipeline() {
        let pipeline = CapturePipeline::new();
        let (sender, _receiver) = sync_channel::<CameraFrame>(4);
        assert!(pipeline.attach_recording_sink(sender).is_err());
    }

    #[test]
    fn test_second_recording_is_rejected() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(255)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        let (first, _keep_first) = sync_channel::<CameraFrame>(4);
        pipeline.attach_recording_sink(first).unwrap();

        let (second, _keep_second) = sync_channel::<CameraFrame>(4);
        let result = pipeline.attach_recording_sink(second);
        assert!(result.is_err());

        pipeline.detach_recording_sink();
        assert_eq!(pipeline.state(), PipelineState::Previewing);
        pipeline.stop();
    }

    #[test]
    fn test_full_recording_channel_drops_without_blocking() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(50)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        // Capacity one and nobody draining: everything past the first
        // frame must be dropped, not waited for.
        let (sender, receiver) = sync_channel::<CameraFrame>(1);
        pipeline.attach_recording_sink(sender).unwrap();

        wait_for("source to drain", || {
            pipeline.state() == PipelineState::Idle
        });
        assert_eq!(pipeline.frames_captured(), 50);
        assert!(pipeline.frames_dropped() > 0);
        drop(receiver);
    }

    #[test]
    fn test_filter_change_applies_to_later_frames() {
        let mut pipeline = CapturePipeline::new();
        pipeline
            .start_with_source(
                Box::new(ScriptedSource::new(255)),
                CaptureCapability::new(2, 2, 30),
            )
            .unwrap();

        pipeline.set_filters(FilterConfig {
            grayscale: true,
            ..Default::default()
        });

        wait_for("a grayscale preview frame", || {
            pipeline
                .preview()
                .latest()
                .map(|f| f.data[0] == f.data[1] && f.data[1] == f.data[2])
                .unwrap_or(false)
        });
        pipeline.stop();
    }
}
