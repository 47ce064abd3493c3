// SPDX-License-Identifier: MPL-2.0

//! Media processing utilities for filtering and encoding
//!
//! This module provides the image processing capabilities used by the
//! capture pipeline:
//!
//! # Color Space Conversion
//!
//! Camera frames arrive as packed BGR24. The [`color`] module converts
//! individual pixels between BGR and the Lab, YCrCb and HSV spaces the
//! filters work in, using the 8-bit conventions capture tooling expects.
//!
//! # Frame Filters
//!
//! The [`filters`] module implements the enhancement chain applied
//! between capture and fan-out: vessel enhancement, two CLAHE variants
//! and grayscale. [`clahe`] holds the tiled equalization itself.
//!
//! # Encoder Selection
//!
//! The [`encoders`] module probes once per process for a usable
//! hardware H.264 encoder and carries the quality parameter mapping for
//! whichever codec is chosen.

pub mod clahe;
pub mod color;
pub mod encoders;
pub mod filters;

// Re-export commonly used types
pub use encoders::{CodecChoice, EncoderProbe};
pub use filters::{FilterConfig, apply_filters};
