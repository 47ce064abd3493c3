// SPDX-License-Identifier: GPL-3.0-only

//! Pull-style frame sources
//!
//! The pipeline consumes frames through the [`FrameSource`] trait so the
//! capture process can be swapped for synthetic sources in tests. The
//! production source drives the external tool with a raw BGR24 pipe on
//! stdout and reads exact frame-sized chunks from it.

use std::io::Read;
use std::process::{Child, ChildStdout, Stdio};

use tracing::{debug, info};

use crate::backends::capture::types::{CameraFrame, CaptureCapability, Device};
use crate::backends::ffmpeg::{FfmpegCommand, StderrLogger, spawn_stderr_logger};
use crate::errors::CaptureError;

/// A blocking, pull-style stream of frames
pub trait FrameSource: Send {
    /// Pull the next frame; `None` means the source is exhausted
    ///
    /// Exhaustion is terminal and not an error. Implementations must keep
    /// returning `None` once they have reported it.
    fn next_frame(&mut self) -> Option<CameraFrame>;
}

/// Live capture through the external tool
///
/// Opens the device at the requested capability, decoding MJPEG to packed
/// BGR24 on the tool side so every stdout read yields exactly one frame.
/// Opening blocks until the first frame has arrived; a device that is
/// busy or absent therefore fails at open time instead of posing as an
/// immediately exhausted stream.
pub struct FfmpegCaptureSource {
    child: Child,
    stdout: ChildStdout,
    capability: CaptureCapability,
    stderr: Option<StderrLogger>,
    /// Frame read during the open handshake, served before the pipe
    first_frame: Option<CameraFrame>,
    exhausted: bool,
}

impl FfmpegCaptureSource {
    pub fn open(
        ffmpeg: &FfmpegCommand,
        device: &Device,
        capability: CaptureCapability,
    ) -> Result<Self, CaptureError> {
        let mut command = ffmpeg.command();
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("warning")
            .arg("-f")
            .arg("dshow")
            .arg("-vcodec")
            .arg("mjpeg")
            .arg("-video_size")
            .arg(format!("{}x{}", capability.width, capability.height))
            .arg("-framerate")
            .arg(capability.framerate.to_string())
            .arg("-i")
            .arg(format!("video={}", device.name))
            .arg("-an")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("bgr24")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::SourceUnavailable(
                "capture stdout was not piped".to_string(),
            ));
        };
        let stderr = spawn_stderr_logger(&mut child, "capture");

        // A busy or missing device makes the tool print its error and
        // exit without writing a single byte. Block for the first frame
        // so that shows up here and not as end-of-stream downstream.
        let mut first = vec![0u8; capability.frame_len()];
        if let Err(e) = stdout.read_exact(&mut first) {
            debug!(error = %e, "Capture ended before the first frame");
            return Err(Self::open_failure(child, stderr));
        }

        info!(
            device = %device.name,
            capability = %capability,
            "Opened capture source"
        );

        Ok(Self {
            child,
            stdout,
            capability,
            stderr,
            first_frame: Some(CameraFrame::new(capability.width, capability.height, first)),
            exhausted: false,
        })
    }

    /// Reap the failed process and fold its exit status and stderr tail
    /// into the error.
    fn open_failure(mut child: Child, stderr: Option<StderrLogger>) -> CaptureError {
        let _ = child.kill();
        let status = match child.wait() {
            Ok(status) => status.to_string(),
            Err(e) => format!("unreaped: {e}"),
        };
        let tail = stderr
            .map(|mut logger| {
                logger.join();
                logger.tail()
            })
            .unwrap_or_default();
        let detail = if tail.is_empty() {
            format!("capture tool delivered no frames ({status})")
        } else {
            format!("capture tool delivered no frames ({status}): {tail}")
        };
        CaptureError::SourceUnavailable(detail)
    }
}

impl FrameSource for FfmpegCaptureSource {
    fn next_frame(&mut self) -> Option<CameraFrame> {
        if self.exhausted {
            return None;
        }
        if let Some(frame) = self.first_frame.take() {
            return Some(frame);
        }

        let mut buf = vec![0u8; self.capability.frame_len()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Some(CameraFrame::new(
                self.capability.width,
                self.capability.height,
                buf,
            )),
            Err(e) => {
                // EOF and short reads both mean the stream is over
                debug!(error = %e, "Capture stream ended");
                self.exhausted = true;
                None
            }
        }
    }
}

impl Drop for FfmpegCaptureSource {
    fn drop(&mut self) {
        // The child may already have exited after EOF; kill errors are
        // expected in that case.
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "Capture process already exited");
        }
        let _ = self.child.wait();
        if let Some(mut logger) = self.stderr.take() {
            logger.join();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Writes an executable shell script standing in for the capture tool
    fn fake_tool(dir: &Path, script: &str) -> FfmpegCommand {
        let path = dir.join("ffmpeg");
        fs::write(&path, script).expect("write fake tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
        FfmpegCommand::from_path(path)
    }

    #[test]
    fn test_open_fails_when_tool_exits_without_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ffmpeg = fake_tool(
            dir.path(),
            "#!/bin/sh\necho 'Could not open video device' >&2\nexit 1\n",
        );

        let result = FfmpegCaptureSource::open(
            &ffmpeg,
            &Device::placeholder(),
            CaptureCapability::new(2, 2, 30),
        );

        match result {
            Ok(_) => panic!("a tool that exits before the first frame must not open"),
            Err(CaptureError::SourceUnavailable(detail)) => {
                assert!(
                    detail.contains("Could not open video device"),
                    "error must carry the tool's own report, got {detail:?}"
                );
            }
            Err(other) => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_handshake_frame_is_served_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Two 2x2 BGR24 frames of 12 bytes each, then end of stream
        let ffmpeg = fake_tool(
            dir.path(),
            "#!/bin/sh\nprintf 'AAAAAAAAAAAA'\nprintf 'BBBBBBBBBBBB'\n",
        );

        let mut source = FfmpegCaptureSource::open(
            &ffmpeg,
            &Device::placeholder(),
            CaptureCapability::new(2, 2, 30),
        )
        .expect("two full frames are enough to open");

        let first = source.next_frame().expect("frame read at open is not lost");
        assert!(first.data.iter().all(|&b| b == b'A'));

        let second = source.next_frame().expect("streaming resumes after the handshake");
        assert!(second.data.iter().all(|&b| b == b'B'));

        assert!(source.next_frame().is_none());
        assert!(source.next_frame().is_none(), "exhaustion must be sticky");
    }
}
