// SPDX-License-Identifier: MPL-2.0

//! Encoder capability probing and codec quality mapping
//!
//! This module decides which H.264 encoder a recording uses:
//! - Hardware encoder priority with a one-shot runtime smoke test
//! - Software fallback for maximum compatibility
//! - Per-codec quality parameter mapping (flag, bounds, direction)

pub mod detection;
pub mod quality;

// Re-export commonly used types
pub use detection::{EncoderProbe, ProbeFailure};

pub use quality::{CodecChoice, QualityDirection, QualityScale};
