// SPDX-License-Identifier: MPL-2.0

//! angiocam - live angiography capture, filtering and timed recording
//!
//! This library provides the core functionality for the angiocam tool:
//! device enumeration, MJPEG frame capture through an external ffmpeg
//! process, a vessel-oriented filter chain, a latest-frame preview slot
//! and bounded-duration MP4 recording.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: ffmpeg process plumbing, device catalog and frame capture
//! - [`media`]: Filter chain, color conversion and encoder selection
//! - [`pipelines`]: Capture fan-out, preview slot and recording sessions
//! - [`config`]: User configuration handling
//! - [`storage`]: Recording directories and output naming
//!
//! # Example
//!
//! ```ignore
//! // Typically driven through the CLI:
//! // angiocam record --camera 0 --duration 30 --vessel
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::capture::{CameraFrame, CaptureCapability, Device, DeviceCatalog};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use media::{CodecChoice, EncoderProbe, FilterConfig};
pub use pipelines::{CapturePipeline, PipelineState, RecordingSession};
