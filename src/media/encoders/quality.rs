// SPDX-License-Identifier: MPL-2.0

//! Codec selection result and the per-codec quality parameter mapping.

use std::fmt;

use crate::constants::encoding;

/// How a codec's quality scale reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityDirection {
    /// Larger values request higher quality
    HigherIsBetter,
    /// Smaller values request higher quality
    LowerIsBetter,
}

/// The quality parameter one codec understands: flag name, bounds and
/// reading direction. The two codecs use different flags over different
/// ranges, so the scale travels with the [`CodecChoice`] and the two are
/// never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityScale {
    pub flag: &'static str,
    pub min: u32,
    pub max: u32,
    pub direction: QualityDirection,
    pub default: u32,
}

impl QualityScale {
    /// Clamps a requested value into the codec's accepted range.
    pub fn clamp(&self, value: u32) -> u32 {
        value.clamp(self.min, self.max)
    }
}

/// Which encoder the capability probe resolved for this process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecChoice {
    /// Quick Sync hardware encoding
    HardwareAccelerated,
    /// CPU encoding via libx264
    SoftwareFallback,
}

impl CodecChoice {
    pub fn encoder_name(&self) -> &'static str {
        match self {
            CodecChoice::HardwareAccelerated => encoding::HARDWARE_ENCODER,
            CodecChoice::SoftwareFallback => encoding::SOFTWARE_ENCODER,
        }
    }

    pub fn quality_scale(&self) -> QualityScale {
        match self {
            CodecChoice::HardwareAccelerated => QualityScale {
                flag: "-global_quality",
                min: 1,
                max: 33,
                direction: QualityDirection::HigherIsBetter,
                default: encoding::DEFAULT_QUALITY,
            },
            CodecChoice::SoftwareFallback => QualityScale {
                flag: "-crf",
                min: 1,
                max: 51,
                direction: QualityDirection::LowerIsBetter,
                default: encoding::DEFAULT_QUALITY,
            },
        }
    }
}

impl fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecChoice::HardwareAccelerated => write!(f, "hardware ({})", self.encoder_name()),
            CodecChoice::SoftwareFallback => write!(f, "software ({})", self.encoder_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_flags_never_conflated() {
        let hw = CodecChoice::HardwareAccelerated.quality_scale();
        let sw = CodecChoice::SoftwareFallback.quality_scale();
        assert_ne!(hw.flag, sw.flag);
        assert_eq!(hw.flag, "-global_quality");
        assert_eq!(sw.flag, "-crf");
    }

    #[test]
    fn test_directions_inverted() {
        let hw = CodecChoice::HardwareAccelerated.quality_scale();
        let sw = CodecChoice::SoftwareFallback.quality_scale();
        assert_eq!(hw.direction, QualityDirection::HigherIsBetter);
        assert_eq!(sw.direction, QualityDirection::LowerIsBetter);
    }

    #[test]
    fn test_clamp_bounds() {
        let hw = CodecChoice::HardwareAccelerated.quality_scale();
        assert_eq!(hw.clamp(0), 1);
        assert_eq!(hw.clamp(23), 23);
        assert_eq!(hw.clamp(99), 33);

        let sw = CodecChoice::SoftwareFallback.quality_scale();
        assert_eq!(sw.clamp(0), 1);
        assert_eq!(sw.clamp(99), 51);
    }

    #[test]
    fn test_encoder_names() {
        assert_eq!(CodecChoice::HardwareAccelerated.encoder_name(), "h264_qsv");
        assert_eq!(CodecChoice::SoftwareFallback.encoder_name(), "libx264");
    }

    #[test]
    fn test_defaults_within_bounds() {
        for choice in [
            CodecChoice::HardwareAccelerated,
            CodecChoice::SoftwareFallback,
        ] {
            let scale = choice.quality_scale();
            assert!(scale.default >= scale.min && scale.default <= scale.max);
        }
    }
}
