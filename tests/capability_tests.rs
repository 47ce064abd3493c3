// SPDX-License-Identifier: MPL-2.0

//! Integration tests for device enumeration and encoder selection
//!
//! All of these run against a nonexistent tool binary, exercising the
//! fallback paths that must hold when the external tool is broken.

use angiocam::backends::ffmpeg::FfmpegCommand;
use angiocam::errors::CaptureError;
use angiocam::media::{CodecChoice, EncoderProbe};
use angiocam::{CaptureCapability, DeviceCatalog};

fn broken_ffmpeg() -> FfmpegCommand {
    FfmpegCommand::from_path("/nonexistent/angiocam-test/ffmpeg")
}

#[test]
fn test_codec_resolution_is_memoized() {
    let probe = EncoderProbe::new(broken_ffmpeg());

    let first = probe.resolve();
    let second = probe.resolve();

    assert_eq!(first, CodecChoice::SoftwareFallback);
    assert_eq!(second, first);
    assert_eq!(
        probe.probe_invocations(),
        1,
        "Second resolve must reuse the cached choice"
    );
    assert!(
        probe.last_failure().is_some(),
        "Fallback reason must stay queriable"
    );
}

#[test]
fn test_preloaded_probe_never_probes() {
    let probe = EncoderProbe::preloaded(broken_ffmpeg(), CodecChoice::HardwareAccelerated);

    assert_eq!(probe.resolve(), CodecChoice::HardwareAccelerated);
    assert_eq!(probe.probe_invocations(), 0);
}

#[test]
fn test_quality_scales_stay_distinct() {
    // The same numeric value means different things on the two scales;
    // the flag it travels under must never be conflated.
    let hw = CodecChoice::HardwareAccelerated.quality_scale();
    let sw = CodecChoice::SoftwareFallback.quality_scale();

    assert_eq!(hw.clamp(1), 1);
    assert_eq!(sw.clamp(1), 1);
    assert_ne!(hw.flag, sw.flag);
    assert_ne!(hw.max, sw.max);
}

#[test]
fn test_failed_enumeration_reports_placeholder() {
    let mut catalog = DeviceCatalog::new(broken_ffmpeg()).expect("catalog construction");

    let devices = catalog.enumerate();
    assert_eq!(devices.len(), 1, "Enumeration must never return empty");
    assert_eq!(devices[0].name, "Default Camera");
    assert_eq!(devices[0].index, 0);
    assert!(
        catalog.last_query_failure().is_some(),
        "The failed query must be observable"
    );
}

#[test]
fn test_capability_probe_failure_is_typed() {
    let mut catalog = DeviceCatalog::new(broken_ffmpeg()).expect("catalog construction");
    let devices = catalog.enumerate();

    let err = catalog
        .probe_capabilities(&devices[0])
        .expect_err("broken binary cannot list options");
    assert!(matches!(err, CaptureError::DeviceQueryFailed(_)));
}

#[test]
fn test_malformed_format_selector_falls_back() {
    for selector in ["", "not-a-format", "1280x720", "0x0@30fps"] {
        assert_eq!(
            CaptureCapability::parse(selector),
            CaptureCapability::new(640, 480, 30),
            "selector {selector:?} should fall back to the default format"
        );
    }
}
