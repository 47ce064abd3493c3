// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture and recording stack

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture-related errors
    Capture(CaptureError),
    /// Recording-related errors
    Recording(RecordingError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Capture-specific errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Device enumeration or capability probing failed
    DeviceQueryFailed(String),
    /// Device does not expose an MJPEG stream
    UnsupportedDevice(String),
    /// Capture source could not be opened
    SourceUnavailable(String),
    /// A capture source is already running
    SourceBusy,
}

/// Recording-specific errors
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// Encoder process could not be started
    EncoderStartFailed(String),
    /// Recording already in progress
    AlreadyRecording,
    /// Frame could not be written to the encoder
    WriteFailed(String),
    /// Encoder did not finalize the output cleanly
    CloseFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceQueryFailed(msg) => write!(f, "Device query failed: {}", msg),
            CaptureError::UnsupportedDevice(name) => {
                write!(f, "Device {:?} has no MJPEG stream", name)
            }
            CaptureError::SourceUnavailable(msg) => write!(f, "Source unavailable: {}", msg),
            CaptureError::SourceBusy => write!(f, "A capture source is already running"),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::EncoderStartFailed(msg) => {
                write!(f, "Failed to start encoder: {}", msg)
            }
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::WriteFailed(msg) => write!(f, "Frame write failed: {}", msg),
            RecordingError::CloseFailed(msg) => write!(f, "Encoder close failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecordingError {}

// Conversions from sub-errors to AppError
impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(err: std::io::Error) -> Self {
        RecordingError::WriteFailed(err.to_string())
    }
}
