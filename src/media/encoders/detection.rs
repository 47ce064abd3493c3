// SPDX-License-Identifier: MPL-2.0

//! Encoder capability probing.
//!
//! Resolves once per process whether hardware encoding is usable. The
//! listing step only proves the encoder is installed; drivers routinely
//! advertise encoders that fail at runtime, so a short synthetic encode
//! confirms it actually works. Every failure downgrades to the software
//! fallback and is recorded, never propagated.

use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backends::ffmpeg::FfmpegCommand;
use crate::constants::{encoding, timing};
use crate::media::encoders::quality::CodecChoice;

/// Why the probe fell back to software encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// ffmpeg could not be executed at all
    ToolUnavailable(String),
    /// The encoder listing does not contain the hardware encoder
    EncoderMissing,
    /// The hardware encoder is installed but the smoke encode failed
    SmokeTestFailed(String),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::ToolUnavailable(reason) => {
                write!(f, "ffmpeg not runnable: {reason}")
            }
            ProbeFailure::EncoderMissing => {
                write!(f, "{} not in encoder list", encoding::HARDWARE_ENCODER)
            }
            ProbeFailure::SmokeTestFailed(reason) => {
                write!(f, "{} smoke encode failed: {reason}", encoding::HARDWARE_ENCODER)
            }
        }
    }
}

/// Resolves the codec choice once and caches it for the process.
///
/// Construct one per process and share it; every consumer that calls
/// [`EncoderProbe::resolve`] after the first gets the cached choice
/// without re-running the probe.
pub struct EncoderProbe {
    ffmpeg: FfmpegCommand,
    cached: Mutex<Option<CodecChoice>>,
    last_failure: Mutex<Option<ProbeFailure>>,
    invocations: AtomicU32,
}

impl EncoderProbe {
    pub fn new(ffmpeg: FfmpegCommand) -> Self {
        Self {
            ffmpeg,
            cached: Mutex::new(None),
            last_failure: Mutex::new(None),
            invocations: AtomicU32::new(0),
        }
    }

    /// A probe whose answer is fixed up front. No process is ever
    /// spawned; `resolve` returns `choice` directly.
    pub fn preloaded(ffmpeg: FfmpegCommand, choice: CodecChoice) -> Self {
        let probe = Self::new(ffmpeg);
        *probe.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(choice);
        probe
    }

    /// Returns the resolved codec, probing on the first call only.
    pub fn resolve(&self) -> CodecChoice {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(choice) = *cached {
            return choice;
        }

        self.invocations.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let choice = match self.try_hardware() {
            Ok(()) => CodecChoice::HardwareAccelerated,
            Err(failure) => {
                warn!("hardware encoder unusable: {failure}");
                *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
                CodecChoice::SoftwareFallback
            }
        };
        info!(
            "resolved encoder {} in {:?}",
            choice.encoder_name(),
            started.elapsed()
        );

        *cached = Some(choice);
        choice
    }

    /// The failure that forced the software fallback, if any.
    pub fn last_failure(&self) -> Option<ProbeFailure> {
        self.last_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// How many times the full probe has actually run.
    pub fn probe_invocations(&self) -> u32 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Clears the cached choice so the next `resolve` probes again.
    pub fn reset(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn try_hardware(&self) -> Result<(), ProbeFailure> {
        self.check_listing()?;
        self.smoke_test()
    }

    /// Asks ffmpeg for its encoder list and scans for the hardware
    /// encoder name.
    fn check_listing(&self) -> Result<(), ProbeFailure> {
        let output = self
            .ffmpeg
            .command()
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ProbeFailure::ToolUnavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(ProbeFailure::ToolUnavailable(format!(
                "encoder listing exited with {}",
                output.status
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        if listing
            .lines()
            .any(|line| line.contains(encoding::HARDWARE_ENCODER))
        {
            Ok(())
        } else {
            Err(ProbeFailure::EncoderMissing)
        }
    }

    /// Encodes a fraction of a second of synthetic black video with the
    /// hardware encoder. Succeeds only if the process exits cleanly
    /// within the timeout and the output file has content.
    fn smoke_test(&self) -> Result<(), ProbeFailure> {
        let dir =
            tempfile::tempdir().map_err(|e| ProbeFailure::SmokeTestFailed(e.to_string()))?;
        let output_path = dir.path().join("probe.mp4");

        let mut child = self
            .ffmpeg
            .command()
            .args(["-f", "lavfi", "-i", "color=black:s=128x128:d=0.1:r=30"])
            .args(["-vcodec", encoding::HARDWARE_ENCODER])
            .args(["-t", "0.1", "-y"])
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProbeFailure::SmokeTestFailed(e.to_string()))?;

        let deadline = Instant::now() + timing::SMOKE_TEST_TIMEOUT;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        debug!("smoke encode still running at deadline, killing it");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProbeFailure::SmokeTestFailed("timed out".into()));
                    }
                    thread::sleep(timing::CHILD_POLL_INTERVAL);
                }
                Err(e) => return Err(ProbeFailure::SmokeTestFailed(e.to_string())),
            }
        };
        if !status.success() {
            return Err(ProbeFailure::SmokeTestFailed(format!("exited with {status}")));
        }

        match std::fs::metadata(&output_path) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(ProbeFailure::SmokeTestFailed("output file empty".into())),
            Err(e) => Err(ProbeFailure::SmokeTestFailed(format!(
                "output file missing: {e}"
            ))),
        }
    }
}
