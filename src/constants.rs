// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture defaults and limits
pub mod capture {
    /// Fallback capture width when no capability could be negotiated
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Fallback capture height when no capability could be negotiated
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Fallback capture framerate
    pub const DEFAULT_FRAMERATE: u32 = 30;

    /// Bounded frame channel capacity between the pull loop and the recorder
    ///
    /// About two seconds of slack at 30 fps. When the recorder falls behind
    /// by more than this, frames are dropped and counted rather than
    /// stalling the pull loop.
    pub const FRAME_CHANNEL_CAPACITY: usize = 64;

    /// Synthetic device name reported when enumeration fails
    pub const PLACEHOLDER_DEVICE_NAME: &str = "Default Camera";
}

/// Preview surface constants
pub mod preview {
    /// Render target width; height follows the frame aspect ratio
    pub const TARGET_WIDTH: u32 = 1280;
}

/// Vessel-enhancement filter tuning
///
/// These values were tuned against angiography footage and are the defaults
/// behind `VesselParams`. Callers can override any of them per instance.
pub mod vessel {
    /// CLAHE clip limit for the luminance equalization passes
    pub const CLAHE_CLIP: f32 = 2.0;

    /// Small CLAHE tile grid (columns, rows); the large pass doubles both
    pub const TILE_GRID: (u32, u32) = (3, 3);

    /// Gaussian kernel size for luminance pre-smoothing
    pub const L_SMOOTH_KSIZE: usize = 5;

    /// Blend weight of the large-tile pass into the equalized luminance
    pub const MULTISCALE_WEIGHT: f32 = 0.5;

    /// Chroma A gain about the neutral point
    pub const A_BOOST: f32 = 1.2;

    /// Chroma B gain about the neutral point
    pub const B_BOOST: f32 = 1.1;

    /// Extra A gain applied inside the vessel mask
    pub const VESSEL_EXTRA_BOOST: f32 = 1.3;

    /// Boosted-A threshold for the reddish-chroma mask term
    pub const MASK_A_MIN: u8 = 135;

    /// Equalized-luminance ceiling for the dark-vessel mask term
    pub const MASK_L_MAX: u8 = 120;

    /// Cr threshold for the YCrCb mask term
    pub const MASK_CR_MIN: u8 = 145;

    /// Hue band edges for the red-hue mask term (half-degree 0..180 scale)
    pub const MASK_HUE_LOW: u8 = 10;
    pub const MASK_HUE_HIGH: u8 = 170;

    /// Saturation floor for the red-hue mask term
    pub const MASK_SAT_MIN: u8 = 70;
}

/// Contrast equalization defaults for the standalone CLAHE filters
pub mod clahe {
    /// Clip limit shared by the color and luminance CLAHE stages
    pub const CLIP_LIMIT: f32 = 2.0;

    /// Tile grid shared by the color and luminance CLAHE stages
    pub const TILE_GRID: (u32, u32) = (3, 3);
}

/// Encoder invocation constants
pub mod encoding {
    /// Hardware H.264 encoder name probed for
    pub const HARDWARE_ENCODER: &str = "h264_qsv";

    /// Software H.264 encoder used as fallback
    pub const SOFTWARE_ENCODER: &str = "libx264";

    /// Encoder speed/size trade-off preset
    pub const SPEED_PRESET: &str = "medium";

    /// Output pixel format for broad player compatibility
    pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

    /// Container flags; moves the moov atom up front for streamable files
    pub const MOVFLAGS: &str = "+faststart";

    /// Output container extension
    pub const OUTPUT_EXTENSION: &str = "mp4";

    /// Default quality value shared by both quality scales
    pub const DEFAULT_QUALITY: u32 = 23;

    /// Timestamp pattern for output file names
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
}

/// Recording defaults
pub mod recording {
    /// Default bounded recording duration in seconds
    pub const DEFAULT_DURATION_SECS: u64 = 60;

    /// Directory created under the videos directory for output files
    pub const RECORDINGS_DIR_NAME: &str = "recordings";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Wall-clock bound on the hardware encoder smoke test
    pub const SMOKE_TEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Poll interval while waiting on a child process to exit
    pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Grace period for the encoder process to finalize after stdin closes
    pub const ENCODER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Countdown ticker poll interval; display granularity stays one second
    pub const COUNTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Frame counter modulo for periodic pull-loop logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Resolution labels for capability listings
pub fn get_resolution_label(width: u32) -> Option<&'static str> {
    match width {
        w if w >= 3840 => Some("4K"), // 3840x2160
        w if w >= 2560 => Some("2K"), // 2560x1440
        w if w >= 1920 => Some("HD"), // 1920x1080
        w if w >= 1280 => Some("720p"),
        w if w >= 640 => Some("SD"), // 640x480
        _ => None,
    }
}

/// Application information utilities
pub mod app_info {
    /// Directory name for configuration storage
    pub const APP_NAME: &str = "angiocam";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_labels() {
        assert_eq!(get_resolution_label(3840), Some("4K"));
        assert_eq!(get_resolution_label(1920), Some("HD"));
        assert_eq!(get_resolution_label(640), Some("SD"));
        assert_eq!(get_resolution_label(320), None);
    }

    #[test]
    fn test_vessel_grid_doubles_cleanly() {
        let (gx, gy) = vessel::TILE_GRID;
        assert!(gx > 0 && gy > 0, "tile grid must be non-degenerate");
        assert_eq!(gx * 2, 6, "large pass doubles the small grid");
        assert_eq!(gy * 2, 6, "large pass doubles the small grid");
    }
}
