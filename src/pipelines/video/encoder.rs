// SPDX-License-Identifier: MPL-2.0

//! Encoder sink for recording sessions.
//!
//! Filtered frames are piped as raw BGR24 into an external ffmpeg
//! process that encodes and muxes on the fly. The trait seam lets
//! session tests swap the process for an in-memory stub.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Stdio};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backends::capture::CameraFrame;
use crate::backends::ffmpeg::{FfmpegCommand, StderrLogger, spawn_stderr_logger};
use crate::constants::{encoding, timing};
use crate::errors::RecordingError;
use crate::media::encoders::CodecChoice;
use crate::pipelines::video::session::RecordingJob;

/// Sink that turns a stream of frames into one output file.
///
/// `open` is called once before any frame. `close` finalizes the output
/// and is called exactly once per session on every exit path; calling it
/// without an open sink is a no-op so shutdown paths can be unconditional.
pub trait FrameEncoder: Send {
    fn open(&mut self, job: &RecordingJob) -> Result<(), RecordingError>;
    fn write_frame(&mut self, frame: &CameraFrame) -> Result<(), RecordingError>;
    fn close(&mut self) -> Result<(), RecordingError>;
}

/// ffmpeg child process accepting raw BGR24 on stdin.
pub struct FfmpegEncoder {
    ffmpeg: FfmpegCommand,
    codec: CodecChoice,
    process: Option<EncoderProcess>,
}

struct EncoderProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<StderrLogger>,
    output: PathBuf,
    frames: u64,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: FfmpegCommand, codec: CodecChoice) -> Self {
        Self {
            ffmpeg,
            codec,
            process: None,
        }
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn open(&mut self, job: &RecordingJob) -> Result<(), RecordingError> {
        if self.process.is_some() {
            return Err(RecordingError::EncoderStartFailed(
                "encoder already open".into(),
            ));
        }

        let scale = self.codec.quality_scale();
        let quality = scale.clamp(job.quality);
        let size = format!("{}x{}", job.width, job.height);

        let mut command = self.ffmpeg.command();
        command
            .args(["-hide_banner", "-loglevel", "warning", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24"])
            .args(["-s", &size])
            .args(["-framerate", &job.framerate.to_string()])
            .args(["-i", "-"])
            .args(["-vcodec", self.codec.encoder_name()])
            .args([scale.flag, &quality.to_string()])
            .args(["-preset", encoding::SPEED_PRESET])
            .args(["-pix_fmt", encoding::OUTPUT_PIXEL_FORMAT])
            .args(["-movflags", encoding::MOVFLAGS])
            .arg(&job.output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| RecordingError::EncoderStartFailed(e.to_string()))?;
        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecordingError::EncoderStartFailed(
                    "encoder process has no stdin pipe".into(),
                ));
            }
        };
        let stderr = spawn_stderr_logger(&mut child, "encoder");

        info!(
            output = %job.output.display(),
            codec = self.codec.encoder_name(),
            quality,
            "Encoder started"
        );

        self.process = Some(EncoderProcess {
            child,
            stdin: Some(stdin),
            stderr,
            output: job.output.clone(),
            frames: 0,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: &CameraFrame) -> Result<(), RecordingError> {
        let Some(process) = self.process.as_mut() else {
            return Err(RecordingError::WriteFailed("encoder not open".into()));
        };
        let Some(stdin) = process.stdin.as_mut() else {
            return Err(RecordingError::WriteFailed("encoder already closed".into()));
        };

        stdin
            .write_all(&frame.data)
            .map_err(|e| RecordingError::WriteFailed(e.to_string()))?;
        process.frames += 1;
        Ok(())
    }

    /// Sends EOF by dropping stdin, then waits for ffmpeg to flush and
    /// finalize the container. A process still running at the deadline
    /// is killed and reported as a close failure.
    fn close(&mut self) -> Result<(), RecordingError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        drop(process.stdin.take());

        let deadline = Instant::now() + timing::ENCODER_CLOSE_TIMEOUT;
        let status = loop {
            match process.child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("Encoder did not exit after EOF, killing it");
                        let _ = process.child.kill();
                        let _ = process.child.wait();
                        break None;
                    }
                    thread::sleep(timing::CHILD_POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = process.child.kill();
                    let _ = process.child.wait();
                    return Err(RecordingError::CloseFailed(e.to_string()));
                }
            }
        };
        let tail = match process.stderr.take() {
            Some(mut logger) => {
                logger.join();
                logger.tail()
            }
            None => String::new(),
        };
        let describe = |reason: String| {
            if tail.is_empty() {
                reason
            } else {
                format!("{reason}: {tail}")
            }
        };

        let Some(status) = status else {
            return Err(RecordingError::CloseFailed(describe(
                "encoder timed out on close".into(),
            )));
        };
        if !status.success() {
            return Err(RecordingError::CloseFailed(describe(format!(
                "encoder exited with {status}"
            ))));
        }

        match std::fs::metadata(&process.output) {
            Ok(meta) if meta.len() > 0 => {
                info!(
                    path = %process.output.display(),
                    frames = process.frames,
                    "Recording saved"
                );
                Ok(())
            }
            Ok(_) => Err(RecordingError::CloseFailed("output file is empty".into())),
            Err(e) => Err(RecordingError::CloseFailed(format!(
                "output file missing: {e}"
            ))),
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            debug!("Encoder dropped while open, killing process");
            drop(process.stdin.take());
            let _ = process.child.kill();
            let _ = process.child.wait();
            if let Some(mut logger) = process.stderr.take() {
                logger.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::encoders::CodecChoice;
    use std::time::Duration;

    fn test_job() -> RecordingJob {
        RecordingJob {
            output: PathBuf::from("/tmp/out.mp4"),
            width: 64,
            height: 48,
            framerate: 30,
            duration: Duration::from_secs(1),
            quality: 23,
            codec: CodecChoice::SoftwareFallback,
        }
    }

    #[test]
    fn test_open_with_missing_binary_fails_to_start() {
        let mut encoder = FfmpegEncoder::new(
            FfmpegCommand::from_path("/nonexistent/ffmpeg"),
            CodecChoice::SoftwareFallback,
        );
        let err = encoder.open(&test_job()).unwrap_err();
        assert!(matches!(err, RecordingError::EncoderStartFailed(_)));
    }

    #[test]
    fn test_write_before_open_fails() {
        let mut encoder = FfmpegEncoder::new(
            FfmpegCommand::from_path("/nonexistent/ffmpeg"),
            CodecChoice::SoftwareFallback,
        );
        let frame = CameraFrame::new(2, 2, vec![0u8; 12]);
        assert!(matches!(
            encoder.write_frame(&frame),
            Err(RecordingError::WriteFailed(_))
        ));
    }

    #[test]
    fn test_close_without_open_is_noop() {
        let mut encoder = FfmpegEncoder::new(
            FfmpegCommand::from_path("/nonexistent/ffmpeg"),
            CodecChoice::SoftwareFallback,
        );
        assert!(encoder.close().is_ok());
        assert!(encoder.close().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_close_failure_carries_tool_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let tool = dir.path().join("ffmpeg");
        std::fs::write(
            &tool,
            "#!/bin/sh\ncat > /dev/null\necho 'Conversion failed!' >&2\nexit 1\n",
        )
        .expect("write fake tool");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let mut encoder =
            FfmpegEncoder::new(FfmpegCommand::from_path(tool), CodecChoice::SoftwareFallback);
        let mut job = test_job();
        job.output = dir.path().join("out.mp4");
        encoder.open(&job).expect("fake tool spawns");
        encoder
            .write_frame(&CameraFrame::new(64, 48, vec![0u8; 64 * 48 * 3]))
            .expect("fake tool consumes stdin");

        let err = encoder
            .close()
            .expect_err("a non-zero exit must fail the close");
        match err {
            RecordingError::CloseFailed(detail) => {
                assert!(
                    detail.contains("Conversion failed!"),
                    "close error must carry the tool's report, got {detail:?}"
                );
            }
            other => panic!("expected CloseFailed, got {other:?}"),
        }
    }
}
