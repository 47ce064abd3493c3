// SPDX-License-Identifier: MPL-2.0

//! Capture backend: devices, capabilities and frame delivery
//!
//! ```text
//! ┌──────────────────────┐
//! │   CapturePipeline    │
//! └──────────┬───────────┘
//!            │ next_frame()
//!            ▼
//! ┌──────────────────────┐
//! │   FrameSource trait  │  ← swap point for tests
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ FfmpegCaptureSource  │  ← raw BGR24 pipe from the tool
//! └──────────────────────┘
//! ```

pub mod enumeration;
pub mod frame_loop;
pub mod source;
pub mod types;

pub use enumeration::DeviceCatalog;
pub use frame_loop::{CaptureLoopController, LoopAction};
pub use source::{FfmpegCaptureSource, FrameSource};
pub use types::*;
