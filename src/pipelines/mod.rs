// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for live capture, preview and recording
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Frame Source │ ──▶ │ Capture Pipeline  │ ──▶ │ Preview Slot │
//! │   (BGR24)    │     │  - Filter chain   │     │ (latest-wins)│
//! │              │     │  - Fan-out        │     └──────────────┘
//! │              │     │                   │ ──▶ ┌──────────────┐
//! └──────────────┘     └───────────────────┘     │  Recording   │
//!                                                │   Session    │
//!                                                │  ──▶ MP4     │
//!                                                └──────────────┘
//! ```
//!
//! The capture loop is the only producer. The preview slot keeps the
//! newest frame and silently discards older ones; the recording channel
//! is bounded and drops frames when the encoder falls behind. Neither
//! consumer can stall the loop.
//!
//! # Modules
//!
//! - [`capture`]: Pull loop, filter application and sink fan-out
//! - [`preview`]: Latest-frame slot and snapshot export
//! - [`video`]: Recording sessions backed by an external encoder

pub mod capture;
pub mod preview;
pub mod video;

pub use capture::{CapturePipeline, PipelineState};
pub use preview::{PreviewSink, preview_target_size};
pub use video::{
    FfmpegEncoder, FrameEncoder, RecordingJob, RecordingOutcome, RecordingSession, StopReason,
};
