// SPDX-License-Identifier: GPL-3.0-only

//! Device enumeration and capability probing
//!
//! Both queries shell out to the capture tool and parse its stderr, which
//! is where DirectShow reports device and option listings. Enumeration
//! fails soft: a broken backend yields the placeholder device and a
//! queriable failure status instead of an error.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::backends::capture::types::{CaptureCapability, Device};
use crate::backends::ffmpeg::FfmpegCommand;
use crate::errors::{AppError, AppResult, CaptureError};

/// Extracts width, height and fps from a DirectShow option line
const CAPABILITY_PATTERN: &str = r"max s=(\d+)x(\d+)\s+fps=(\d+)";

/// Catalog of capture devices and their negotiable modes
pub struct DeviceCatalog {
    ffmpeg: FfmpegCommand,
    capability_pattern: Regex,
    last_query_failure: Option<String>,
}

impl DeviceCatalog {
    pub fn new(ffmpeg: FfmpegCommand) -> AppResult<Self> {
        let capability_pattern = Regex::new(CAPABILITY_PATTERN)
            .map_err(|e| AppError::Other(format!("invalid capability pattern: {}", e)))?;
        Ok(Self {
            ffmpeg,
            capability_pattern,
            last_query_failure: None,
        })
    }

    /// List capture devices, never returning an empty list
    ///
    /// Runs the device listing invocation and picks the quoted name out of
    /// every video line. The listing command exits non-zero by design, so
    /// only a spawn failure or an empty parse counts as a failed query;
    /// both yield the placeholder device.
    pub fn enumerate(&mut self) -> Vec<Device> {
        self.last_query_failure = None;

        let output = self
            .ffmpeg
            .command()
            .args([
                "-hide_banner",
                "-f",
                "dshow",
                "-list_devices",
                "true",
                "-i",
                "dummy",
            ])
            .output();

        let stderr = match output {
            Ok(output) => String::from_utf8_lossy(&output.stderr).into_owned(),
            Err(e) => {
                warn!(error = %e, "Device enumeration command failed");
                self.last_query_failure = Some(e.to_string());
                return vec![Device::placeholder()];
            }
        };

        let devices = parse_device_list(&stderr);
        if devices.is_empty() {
            warn!("No video devices parsed from listing, using placeholder");
            self.last_query_failure = Some("no video devices reported".to_string());
            return vec![Device::placeholder()];
        }

        info!(count = devices.len(), "Enumerated capture devices");
        devices
    }

    /// Why the last enumeration fell back to the placeholder, if it did
    pub fn last_query_failure(&self) -> Option<&str> {
        self.last_query_failure.as_deref()
    }

    /// Probe the MJPEG modes a device can deliver
    ///
    /// Devices without any MJPEG line are rejected as unsupported; the
    /// caller reports the gap and substitutes an empty capability set.
    pub fn probe_capabilities(
        &self,
        device: &Device,
    ) -> Result<Vec<CaptureCapability>, CaptureError> {
        let output = self
            .ffmpeg
            .command()
            .args(["-hide_banner", "-f", "dshow", "-list_options", "true", "-i"])
            .arg(format!("video={}", device.name))
            .output()
            .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let capabilities = self.parse_capability_listing(&stderr, &device.name)?;

        info!(
            device = %device.name,
            count = capabilities.len(),
            "Probed capture capabilities"
        );
        Ok(capabilities)
    }

    fn parse_capability_listing(
        &self,
        listing: &str,
        device_name: &str,
    ) -> Result<Vec<CaptureCapability>, CaptureError> {
        if !listing.lines().any(|line| line.contains("vcodec=mjpeg")) {
            return Err(CaptureError::UnsupportedDevice(device_name.to_string()));
        }

        let mut capabilities = Vec::new();
        for line in listing.lines() {
            if !(line.contains("vcodec=mjpeg") && line.contains("fps=")) {
                continue;
            }
            let Some(caps) = self.capability_pattern.captures(line) else {
                debug!(line = %line.trim(), "Skipping malformed capability line");
                continue;
            };
            let (Some(w), Some(h), Some(fps)) = (caps.get(1), caps.get(2), caps.get(3)) else {
                continue;
            };
            let (Ok(width), Ok(height), Ok(framerate)) = (
                w.as_str().parse::<u32>(),
                h.as_str().parse::<u32>(),
                fps.as_str().parse::<u32>(),
            ) else {
                continue;
            };
            if width == 0 || height == 0 || framerate == 0 {
                continue;
            }

            let capability = CaptureCapability::new(width, height, framerate);
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }

        Ok(capabilities)
    }
}

/// Pick device names out of the listing stderr
///
/// A device line carries the marker `(video)` and the name between the
/// first pair of double quotes. Audio devices and alternative-name lines
/// fall through.
fn parse_device_list(stderr: &str) -> Vec<Device> {
    let mut devices = Vec::new();
    for line in stderr.lines() {
        if !line.contains("(video)") {
            continue;
        }
        if let Some(name) = line.split('"').nth(1) {
            devices.push(Device {
                name: name.to_string(),
                index: devices.len(),
            });
        }
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_LISTING: &str = "\
[dshow @ 0000020c7e2c4e40] \"Integrated Camera\" (video)\n\
[dshow @ 0000020c7e2c4e40]   Alternative name \"@device_pnp_\\\\?\\usb#vid_04f2\"\n\
[dshow @ 0000020c7e2c4e40] \"USB Capture HDMI\" (video)\n\
[dshow @ 0000020c7e2c4e40] \"Microphone Array\" (audio)\n\
dummy: Immediate exit requested";

    const OPTION_LISTING: &str = "\
[dshow @ 0x1] DirectShow video device options (from video devices)\n\
[dshow @ 0x1]  Pin \"Capture\" (alternative pin name \"0\")\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=640x480 fps=5 max s=640x480 fps=30\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=1280x720 fps=5 max s=1280x720 fps=30\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=1280x720 fps=5 max s=1280x720 fps=30\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=1920x1080 fps=5 max s=1920x1080 fps=30\n\
[dshow @ 0x1]   pixel_format=yuyv422  min s=640x480 fps=5 max s=640x480 fps=30";

    fn test_catalog() -> DeviceCatalog {
        DeviceCatalog::new(FfmpegCommand::from_path("/nonexistent/ffmpeg"))
            .expect("catalog construction")
    }

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(DEVICE_LISTING);
        assert_eq!(devices.len(), 2, "audio devices must not be listed");
        assert_eq!(devices[0].name, "Integrated Camera");
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[1].name, "USB Capture HDMI");
        assert_eq!(devices[1].index, 1);
    }

    #[test]
    fn test_parse_device_list_empty() {
        assert!(parse_device_list("dummy: Immediate exit requested").is_empty());
    }

    #[test]
    fn test_parse_capability_listing() {
        let catalog = test_catalog();
        let capabilities = catalog
            .parse_capability_listing(OPTION_LISTING, "Integrated Camera")
            .expect("listing has MJPEG lines");
        assert_eq!(
            capabilities,
            vec![
                CaptureCapability::new(640, 480, 30),
                CaptureCapability::new(1280, 720, 30),
                CaptureCapability::new(1920, 1080, 30),
            ],
            "duplicates removed, non-MJPEG lines ignored"
        );
    }

    #[test]
    fn test_no_mjpeg_is_unsupported() {
        let catalog = test_catalog();
        let listing = "[dshow @ 0x1]   pixel_format=yuyv422  min s=640x480 fps=5 max s=640x480 fps=30";
        let err = catalog
            .parse_capability_listing(listing, "Legacy Cam")
            .expect_err("no MJPEG lines present");
        assert!(matches!(err, CaptureError::UnsupportedDevice(name) if name == "Legacy Cam"));
    }

    #[test]
    fn test_malformed_and_zero_lines_skipped() {
        let catalog = test_catalog();
        let listing = "\
[dshow @ 0x1]   vcodec=mjpeg  fps= garbled\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=0x0 fps=0 max s=0x0 fps=0\n\
[dshow @ 0x1]   vcodec=mjpeg  min s=640x480 fps=5 max s=640x480 fps=30";
        let capabilities = catalog
            .parse_capability_listing(listing, "cam")
            .expect("one valid line remains");
        assert_eq!(capabilities, vec![CaptureCapability::new(640, 480, 30)]);
    }

    #[test]
    fn test_enumerate_failure_yields_placeholder() {
        let mut catalog = test_catalog();
        let devices = catalog.enumerate();
        assert_eq!(devices, vec![Device::placeholder()]);
        assert!(
            catalog.last_query_failure().is_some(),
            "failed query must be observable"
        );
    }
}
