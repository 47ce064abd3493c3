// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture backend

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::constants::capture;

/// A capture device as reported by the backend
///
/// Devices are enumerated fresh on every refresh and never mutated in
/// place. The index is the position in the enumeration order and is what
/// the CLI accepts as a camera selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub index: usize,
}

impl Device {
    /// Synthetic entry reported when enumeration fails
    ///
    /// Keeps downstream selection logic working against a non-empty list
    /// even when the backend query broke.
    pub fn placeholder() -> Self {
        Self {
            name: capture::PLACEHOLDER_DEVICE_NAME.to_string(),
            index: 0,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}

/// A negotiable capture mode: resolution plus framerate
///
/// All fields are strictly positive; the parsing paths guarantee it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureCapability {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl CaptureCapability {
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate,
        }
    }

    /// Parse a `WxH@F` selector, tolerating a trailing `fps`
    ///
    /// Malformed input falls back to the default capability instead of
    /// failing; an explicit selector should never abort a recording run.
    pub fn parse(input: &str) -> Self {
        parse_capability(input).unwrap_or_default()
    }

    /// Duration of a single frame at this capability's rate
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.framerate as f64)
    }

    /// Byte length of one packed BGR24 frame at this resolution
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl Default for CaptureCapability {
    fn default() -> Self {
        Self {
            width: capture::DEFAULT_WIDTH,
            height: capture::DEFAULT_HEIGHT,
            framerate: capture::DEFAULT_FRAMERATE,
        }
    }
}

impl std::fmt::Display for CaptureCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}fps", self.width, self.height, self.framerate)
    }
}

fn parse_capability(input: &str) -> Option<CaptureCapability> {
    let (size, rate) = input.trim().split_once('@')?;
    let (width, height) = size.split_once('x')?;
    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().parse().ok()?;
    let rate: u32 = rate.trim().trim_end_matches("fps").parse().ok()?;
    if width == 0 || height == 0 || rate == 0 {
        return None;
    }
    Some(CaptureCapability::new(width, height, rate))
}

/// A single captured frame, packed BGR24
///
/// Pixel data is shared behind an `Arc` so the preview slot and the
/// recorder can hold the same frame without copies; no consumer mutates
/// it in place.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Packed BGR triples, row-major, stride = width * 3
    pub data: Arc<[u8]>,
    /// Timestamp when the frame was pulled (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            captured_at: Instant::now(),
        }
    }

    /// Expected byte length for the frame's dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}
