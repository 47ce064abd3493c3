// SPDX-License-Identifier: MPL-2.0

//! Video recording: encoder process management and session lifecycle
//!
//! A [`RecordingSession`] owns one [`FrameEncoder`] for its whole life.
//! The session worker is the only writer and the only closer, so an
//! encoder is opened once, written from one thread and closed exactly
//! once no matter how the recording ends.

pub mod encoder;
pub mod session;

pub use encoder::{FfmpegEncoder, FrameEncoder};
pub use session::{RecordingJob, RecordingOutcome, RecordingSession, StopReason};
