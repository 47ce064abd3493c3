// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use std::path::PathBuf;

use angiocam::Config;
use angiocam::media::filters::FilterConfig;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(
        config.duration_secs, 60,
        "Default recording duration should be one minute"
    );
    assert!(config.save_dir.is_none(), "No save dir override by default");
    assert!(
        config.quality.is_none(),
        "Quality should default to the codec scale's default"
    );
    assert!(
        !config.filters.any_enabled(),
        "All filters should start disabled"
    );
}

#[test]
fn test_config_json_roundtrip() {
    let config = Config {
        save_dir: Some(PathBuf::from("/tmp/recordings")),
        duration_secs: 120,
        quality: Some(18),
        filters: FilterConfig {
            vessel: true,
            ..Default::default()
        },
    };

    let json = serde_json::to_string(&config).expect("config serializes");
    let back: Config = serde_json::from_str(&json).expect("config parses back");
    assert_eq!(back, config);
}

#[test]
fn test_missing_fields_use_defaults() {
    // An empty object is a valid config
    let back: Config = serde_json::from_str("{}").expect("empty object parses");
    assert_eq!(back, Config::default());

    // Partial configs keep defaults for absent fields
    let back: Config = serde_json::from_str(r#"{"duration_secs": 5}"#).expect("partial parses");
    assert_eq!(back.duration_secs, 5);
    assert!(back.save_dir.is_none());
    assert!(!back.filters.any_enabled());
}

#[test]
fn test_unknown_filter_fields_ignored() {
    // Filter blocks from newer releases must not break older binaries
    let json = r#"{"filters": {"vessel": true, "sharpen": true}}"#;
    let back: Config = serde_json::from_str(json).expect("unknown fields tolerated");
    assert!(back.filters.vessel);
    assert!(!back.filters.grayscale);
}
