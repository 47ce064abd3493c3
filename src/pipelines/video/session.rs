// SPDX-License-Identifier: MPL-2.0

//! Bounded-duration recording sessions.
//!
//! A session owns the encoder sink and a worker thread that drains the
//! frame channel until the duration elapses, the source ends, a write
//! fails or the session is cancelled. Whatever the exit path, the worker
//! closes the encoder exactly once before reporting its outcome. A
//! countdown ticker publishes remaining seconds for status queries and
//! stops with the worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::backends::capture::{CameraFrame, CaptureLoopController, LoopAction};
use crate::constants::timing;
use crate::errors::RecordingError;
use crate::media::encoders::CodecChoice;
use crate::pipelines::video::encoder::FrameEncoder;

/// Everything one recording needs, fixed at session start.
#[derive(Debug, Clone)]
pub struct RecordingJob {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub duration: Duration,
    pub quality: u32,
    pub codec: CodecChoice,
}

impl RecordingJob {
    /// Nominal time between frames at the declared rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.framerate.max(1)))
    }
}

/// Why the consumption loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    SourceExhausted,
    Cancelled,
    WriteError,
}

/// Final report of one session, produced exactly once.
#[derive(Debug)]
pub struct RecordingOutcome {
    pub output: PathBuf,
    pub frames_written: u64,
    pub elapsed: Duration,
    pub reason: StopReason,
    /// Set when finalizing the output failed
    pub close_error: Option<RecordingError>,
}

/// Single-writer consumer of the filtered frame stream.
///
/// At most one session runs at a time; the pipeline enforces that by
/// refusing to attach a second recording sink.
pub struct RecordingSession {
    cancel: Arc<AtomicBool>,
    remaining_secs: Arc<AtomicU64>,
    worker: Option<JoinHandle<RecordingOutcome>>,
    countdown: Option<CaptureLoopController>,
    output: PathBuf,
}

impl RecordingSession {
    /// Opens the encoder and starts the consumption worker.
    ///
    /// The encoder opens on the caller's thread, so a start failure
    /// surfaces here and no session comes into existence.
    pub fn begin(
        job: RecordingJob,
        frames: Receiver<CameraFrame>,
        mut encoder: Box<dyn FrameEncoder>,
    ) -> Result<Self, RecordingError> {
        encoder.open(&job)?;
        info!(
            output = %job.output.display(),
            duration_secs = job.duration.as_secs(),
            codec = job.codec.encoder_name(),
            "Recording session started"
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let remaining_secs = Arc::new(AtomicU64::new(job.duration.as_secs()));
        let duration = job.duration;
        let output = job.output.clone();

        let finished = Arc::new(AtomicBool::new(false));

        let worker = {
            let cancel = Arc::clone(&cancel);
            let finished = Arc::clone(&finished);
            thread::Builder::new()
                .name("recording-session".into())
                .spawn(move || {
                    let outcome = consumption_loop(encoder, frames, job, &cancel);
                    finished.store(true, Ordering::SeqCst);
                    outcome
                })
                .map_err(|e| RecordingError::EncoderStartFailed(format!("worker thread: {e}")))?
        };

        let countdown = {
            let remaining = Arc::clone(&remaining_secs);
            let started = Instant::now();
            CaptureLoopController::start("recording-countdown", move || {
                // Nothing left to count once the worker has exited.
                if finished.load(Ordering::SeqCst) {
                    remaining.store(0, Ordering::Relaxed);
                    return LoopAction::Stop;
                }
                let left = duration.saturating_sub(started.elapsed()).as_secs();
                if remaining.swap(left, Ordering::Relaxed) != left {
                    info!("Recording: {left}s remaining");
                }
                thread::sleep(timing::COUNTDOWN_POLL_INTERVAL);
                LoopAction::Continue
            })
        };

        Ok(Self {
            cancel,
            remaining_secs,
            worker: Some(worker),
            countdown: Some(countdown),
            output,
        })
    }

    /// Seconds left before the duration elapses, for status queries.
    /// Reads zero once the session has finished, however it ended.
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_secs.load(Ordering::Relaxed)
    }

    /// True once the consumption loop has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map(|w| w.is_finished()).unwrap_or(true)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Requests cooperative cancellation. The loop observes the flag at
    /// the top of its next iteration.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Ends the session and returns its outcome.
    ///
    /// Idempotent: the first call joins the worker and yields the
    /// outcome; later calls return None.
    pub fn end(&mut self) -> Option<RecordingOutcome> {
        self.cancel();
        if let Some(mut countdown) = self.countdown.take() {
            countdown.stop();
        }

        let worker = self.worker.take()?;
        match worker.join() {
            Ok(outcome) => {
                info!(
                    frames = outcome.frames_written,
                    reason = ?outcome.reason,
                    "Recording session ended"
                );
                Some(outcome)
            }
            Err(e) => {
                error!("Recording worker panicked: {:?}", e);
                None
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.end();
        }
    }
}

/// Drains the frame channel into the encoder until a stop condition.
///
/// The deadline is checked at the top of each iteration and channel
/// waits are capped at one frame interval, so termination lags the
/// deadline by at most one interval. The encoder is closed on every
/// path before the outcome is built, including after a write failure,
/// so a partial recording still ends up a playable file.
fn consumption_loop(
    mut encoder: Box<dyn FrameEncoder>,
    frames: Receiver<CameraFrame>,
    job: RecordingJob,
    cancel: &AtomicBool,
) -> RecordingOutcome {
    let started = Instant::now();
    let wait = job.frame_interval();
    let mut frames_written = 0u64;

    let reason = loop {
        if cancel.load(Ordering::SeqCst) {
            break StopReason::Cancelled;
        }
        if started.elapsed() >= job.duration {
            break StopReason::DurationElapsed;
        }

        match frames.recv_timeout(wait) {
            Ok(frame) => {
                if let Err(e) = encoder.write_frame(&frame) {
                    warn!("Frame write failed, ending recording early: {e}");
                    break StopReason::WriteError;
                }
                frames_written += 1;
                if frames_written % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(frames = frames_written, "Recording progress");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break StopReason::SourceExhausted,
        }
    };

    let close_error = encoder.close().err();
    if let Some(e) = &close_error {
        warn!("Encoder close failed: {e}");
    }

    RecordingOutcome {
        output: job.output,
        frames_written,
        elapsed: started.elapsed(),
        reason,
        close_error,
    }
}
