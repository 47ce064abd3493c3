// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture operations
//!
//! This module provides command-line functionality for:
//! - Listing capture devices and their modes
//! - Reporting the selected encoder
//! - Running the live preview
//! - Recording filtered video

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::thread;
use std::time::{Duration, Instant};

use angiocam::backends::capture::{CaptureCapability, Device, DeviceCatalog};
use angiocam::backends::ffmpeg::FfmpegCommand;
use angiocam::config::Config;
use angiocam::constants::{capture, get_resolution_label};
use angiocam::errors::CaptureError;
use angiocam::media::encoders::{EncoderProbe, QualityDirection};
use angiocam::media::filters::FilterConfig;
use angiocam::pipelines::CapturePipeline;
use angiocam::pipelines::video::{FfmpegEncoder, RecordingJob, RecordingSession};
use angiocam::storage;

/// List capture devices and the modes each one reports
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let ffmpeg = FfmpegCommand::locate()?;
    let mut catalog = DeviceCatalog::new(ffmpeg)?;

    let devices = catalog.enumerate();
    if let Some(reason) = catalog.last_query_failure() {
        println!("Device query failed ({reason}); showing the fallback entry.");
        println!();
    }

    println!("Available capture devices:");
    println!();
    for device in &devices {
        println!("  [{}] {}", device.index, device.name);
        match catalog.probe_capabilities(device) {
            Ok(mut capabilities) => {
                // Highest resolution first
                capabilities.sort_by(|a, b| (b.width * b.height).cmp(&(a.width * a.height)));
                for capability in &capabilities {
                    match get_resolution_label(capability.width) {
                        Some(label) => println!("      {capability} ({label})"),
                        None => println!("      {capability}"),
                    }
                }
            }
            Err(CaptureError::UnsupportedDevice(_)) => {
                println!("      No MJPEG modes reported; device unsupported");
            }
            Err(err) => println!("      Capability query failed: {err}"),
        }
        println!();
    }

    Ok(())
}

/// Report the encoder the capability probe selects on this machine
pub fn show_codec() -> Result<(), Box<dyn std::error::Error>> {
    let ffmpeg = FfmpegCommand::locate()?;
    let probe = EncoderProbe::new(ffmpeg);

    let choice = probe.resolve();
    println!("Selected encoder: {choice}");
    if let Some(failure) = probe.last_failure() {
        println!("Hardware encoder unavailable: {failure}");
    }

    let scale = choice.quality_scale();
    println!(
        "Quality scale: {} {}..={} (default {}, {})",
        scale.flag,
        scale.min,
        scale.max,
        scale.default,
        match scale.direction {
            QualityDirection::HigherIsBetter => "higher is better",
            QualityDirection::LowerIsBetter => "lower is better",
        }
    );

    Ok(())
}

/// Run the live preview without recording
pub fn run_preview(
    camera: usize,
    duration: Option<u64>,
    snapshot: Option<PathBuf>,
    filters: Option<FilterConfig>,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    let filters = filters.unwrap_or(config.filters);

    let ffmpeg = FfmpegCommand::locate()?;
    let mut catalog = DeviceCatalog::new(ffmpeg.clone())?;
    let devices = catalog.enumerate();
    let device = pick_device(&devices, camera)?;
    println!("Using camera: {}", device.name);

    let capability = negotiate_capability(&catalog, device)?;
    println!("Capture format: {capability}");
    println!("Filters: {}", describe_filters(&filters));

    let mut pipeline = CapturePipeline::new();
    pipeline.set_filters(filters);
    pipeline.start(&ffmpeg, device, capability)?;

    let stop_flag = install_stop_handler()?;
    println!();
    println!("Previewing... (press Ctrl+C to stop)");

    let started = Instant::now();
    while pipeline.is_running() {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping...");
            break;
        }
        if let Some(secs) = duration
            && started.elapsed() >= Duration::from_secs(secs)
        {
            println!();
            break;
        }
        print!("\rPreview: {} frames", pipeline.frames_captured());
        std::io::stdout().flush()?;
        thread::sleep(Duration::from_millis(100));
    }

    // Snapshot before stop; stopping clears the preview slot
    if let Some(path) = snapshot {
        let rt = tokio::runtime::Runtime::new()?;
        match rt.block_on(pipeline.preview().snapshot(path)) {
            Ok(saved) => println!("Snapshot saved: {}", saved.display()),
            Err(err) => println!("Snapshot failed: {err}"),
        }
    }

    pipeline.stop();
    println!("Preview ended after {} frames", pipeline.frames_captured());

    if save {
        config.filters = filters;
        if let Some(secs) = duration {
            config.duration_secs = secs;
        }
        config.save()?;
        println!("Saved preview settings as defaults");
    }

    Ok(())
}

/// Record filtered video to a timestamped MP4
#[allow(clippy::too_many_arguments)]
pub fn record(
    camera: usize,
    duration: Option<u64>,
    quality: Option<u32>,
    format: Option<String>,
    output_dir: Option<PathBuf>,
    filters: Option<FilterConfig>,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    let filters = filters.unwrap_or(config.filters);
    let duration_secs = duration.unwrap_or(config.duration_secs);

    let ffmpeg = FfmpegCommand::locate()?;
    let mut catalog = DeviceCatalog::new(ffmpeg.clone())?;
    let devices = catalog.enumerate();
    let device = pick_device(&devices, camera)?;
    println!("Using camera: {}", device.name);

    let capability = match format.as_deref() {
        Some(selector) => CaptureCapability::parse(selector),
        None => negotiate_capability(&catalog, device)?,
    };
    println!("Recording format: {capability}");
    println!("Filters: {}", describe_filters(&filters));

    let probe = EncoderProbe::new(ffmpeg.clone());
    let codec = probe.resolve();
    println!("Encoder: {codec}");
    if let Some(failure) = probe.last_failure() {
        println!("Hardware encoder unavailable: {failure}");
    }

    let scale = codec.quality_scale();
    let quality_value = scale.clamp(quality.or(config.quality).unwrap_or(scale.default));
    println!("Quality: {} {}", scale.flag, quality_value);

    let dir = output_dir
        .clone()
        .or_else(|| config.save_dir.clone())
        .unwrap_or_else(storage::default_recordings_dir);
    storage::ensure_dir(&dir)?;
    let output = storage::timestamped_output(&dir);
    println!("Output: {}", output.display());
    println!("Duration: {duration_secs} seconds");

    let mut pipeline = CapturePipeline::new();
    pipeline.set_filters(filters);
    pipeline.start(&ffmpeg, device, capability)?;

    let (sender, receiver) = sync_channel(capture::FRAME_CHANNEL_CAPACITY);
    let job = RecordingJob {
        output,
        width: capability.width,
        height: capability.height,
        framerate: capability.framerate,
        duration: Duration::from_secs(duration_secs),
        quality: quality_value,
        codec,
    };

    let encoder = Box::new(FfmpegEncoder::new(ffmpeg, codec));
    let mut session = match RecordingSession::begin(job, receiver, encoder) {
        Ok(session) => session,
        Err(err) => {
            pipeline.stop();
            return Err(err.into());
        }
    };
    if let Err(err) = pipeline.attach_recording_sink(sender) {
        session.cancel();
        session.end();
        pipeline.stop();
        return Err(err.into());
    }

    let stop_flag = install_stop_handler()?;
    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    while !session.is_finished() {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            session.cancel();
            break;
        }
        print!("\rRecording: {:>4}s remaining", session.remaining_seconds());
        std::io::stdout().flush()?;
        thread::sleep(Duration::from_millis(100));
    }
    println!();

    let outcome = session.end();
    pipeline.detach_recording_sink();
    let dropped = pipeline.frames_dropped();
    pipeline.stop();

    let Some(outcome) = outcome else {
        return Err("recording session produced no outcome".into());
    };
    if let Some(err) = outcome.close_error {
        return Err(err.into());
    }

    println!(
        "Video saved: {} ({} frames, {:.1}s)",
        outcome.output.display(),
        outcome.frames_written,
        outcome.elapsed.as_secs_f64()
    );
    if dropped > 0 {
        println!("Note: {dropped} frames dropped (encoder could not keep up)");
    }

    let rt = tokio::runtime::Runtime::new()?;
    if let Some(latest) = rt.block_on(storage::latest_recording(dir)) {
        println!("Latest recording: {}", latest.display());
    }

    if save {
        config.filters = filters;
        config.duration_secs = duration_secs;
        if quality.is_some() {
            config.quality = Some(quality_value);
        }
        if let Some(dir) = output_dir {
            config.save_dir = Some(dir);
        }
        config.save()?;
        println!("Saved recording settings as defaults");
    }

    Ok(())
}

/// Select the device at `index`, with a range-checked error message
fn pick_device(devices: &[Device], index: usize) -> Result<&Device, Box<dyn std::error::Error>> {
    match devices.get(index) {
        Some(device) => Ok(device),
        None => Err(format!(
            "Camera index {} out of range (0-{})",
            index,
            devices.len().saturating_sub(1)
        )
        .into()),
    }
}

/// Probe the device and pick a capture mode near the default resolution
///
/// A device without MJPEG modes is refused. A failed query falls back to
/// the default capability so a flaky listing does not block capture.
fn negotiate_capability(
    catalog: &DeviceCatalog,
    device: &Device,
) -> Result<CaptureCapability, Box<dyn std::error::Error>> {
    match catalog.probe_capabilities(device) {
        Ok(capabilities) => Ok(select_capability(&capabilities)),
        Err(err @ CaptureError::UnsupportedDevice(_)) => Err(err.into()),
        Err(err) => {
            println!("Capability query failed ({err}); using the default format");
            Ok(CaptureCapability::default())
        }
    }
}

/// Pick the capture mode closest to the default resolution
fn select_capability(capabilities: &[CaptureCapability]) -> CaptureCapability {
    let exact = capabilities
        .iter()
        .filter(|c| c.width == capture::DEFAULT_WIDTH && c.height == capture::DEFAULT_HEIGHT)
        .max_by_key(|c| c.framerate);
    if let Some(capability) = exact {
        return *capability;
    }

    capabilities
        .iter()
        .min_by_key(|c| {
            let height_diff = (c.height as i32 - capture::DEFAULT_HEIGHT as i32).abs();
            let rate_diff = (c.framerate as i32 - capture::DEFAULT_FRAMERATE as i32).abs();
            // Prioritize resolution over framerate
            height_diff * 10 + rate_diff
        })
        .copied()
        .unwrap_or_default()
}

/// Ctrl+C sets the flag; command loops poll it and wind down cleanly
fn install_stop_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;
    Ok(flag)
}

fn describe_filters(config: &FilterConfig) -> String {
    let mut enabled = Vec::new();
    if config.vessel {
        enabled.push("vessel");
    }
    if config.clahe_color {
        enabled.push("clahe-color");
    }
    if config.clahe_luma {
        enabled.push("clahe-luma");
    }
    if config.grayscale {
        enabled.push("grayscale");
    }
    if enabled.is_empty() {
        "none".to_string()
    } else {
        enabled.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_capability_prefers_default_resolution() {
        let capabilities = vec![
            CaptureCapability::new(1920, 1080, 30),
            CaptureCapability::new(640, 480, 15),
            CaptureCapability::new(640, 480, 30),
        ];
        assert_eq!(
            select_capability(&capabilities),
            CaptureCapability::new(640, 480, 30),
            "exact default resolution at the best rate wins"
        );
    }

    #[test]
    fn test_select_capability_falls_back_to_closest() {
        let capabilities = vec![
            CaptureCapability::new(1920, 1080, 30),
            CaptureCapability::new(1280, 720, 30),
        ];
        assert_eq!(
            select_capability(&capabilities),
            CaptureCapability::new(1280, 720, 30)
        );
    }

    #[test]
    fn test_select_capability_empty_uses_default() {
        assert_eq!(select_capability(&[]), CaptureCapability::default());
    }

    #[test]
    fn test_describe_filters() {
        assert_eq!(describe_filters(&FilterConfig::default()), "none");
        let config = FilterConfig {
            vessel: true,
            grayscale: true,
            ..Default::default()
        };
        assert_eq!(describe_filters(&config), "vessel, grayscale");
    }

    #[test]
    fn test_pick_device_bounds() {
        let devices = vec![Device::placeholder()];
        assert!(pick_device(&devices, 0).is_ok());
        assert!(pick_device(&devices, 1).is_err());

        let err = pick_device(&[], 0).expect_err("an empty list has no devices");
        assert!(err.to_string().contains("out of range"));
    }
}
