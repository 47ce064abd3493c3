// SPDX-License-Identifier: MPL-2.0

//! Backend layer wrapping the external media tool
//!
//! Everything that talks to hardware goes through the external tool: one
//! resolved [`ffmpeg::FfmpegCommand`] value is handed to the capture,
//! probing and encoding layers, which each spawn their own invocations.
//!
//! # Modules
//!
//! - [`ffmpeg`]: binary resolution and invocation helpers
//! - [`capture`]: device enumeration, capability probing and frame sources

pub mod capture;
pub mod ffmpeg;
