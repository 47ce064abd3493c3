// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{app_info, recording};
use crate::errors::{AppError, AppResult};
use crate::media::filters::FilterConfig;

const CONFIG_FILE_NAME: &str = "config.json";

/// Persisted user preferences
///
/// Loaded once at startup; explicit CLI flags override whatever is
/// stored here. Unknown or missing fields fall back to defaults so old
/// config files keep working across releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory recordings are written to; `None` means the platform
    /// videos directory
    pub save_dir: Option<PathBuf>,
    /// Recording duration in seconds
    pub duration_secs: u64,
    /// Preferred quality value, clamped to the resolved codec's scale
    pub quality: Option<u32>,
    /// Filter toggles restored at startup
    pub filters: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: None,
            duration_secs: recording::DEFAULT_DURATION_SECS,
            quality: None,
            filters: FilterConfig::default(),
        }
    }
}

impl Config {
    /// Load the stored configuration, falling back to defaults
    ///
    /// A missing file is the common first-run case; an unreadable or
    /// unparsable file is logged and ignored. Loading never fails.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            debug!("No config directory on this platform, using defaults");
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Ignoring malformed config file");
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read config file");
                Self::default()
            }
        }
    }

    /// Persist the configuration as pretty-printed JSON
    pub fn save(&self) -> AppResult<()> {
        let path = Self::path()
            .ok_or_else(|| AppError::Config("no config directory on this platform".to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("creating {}: {e}", parent.display())))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("serializing config: {e}")))?;
        fs::write(&path, contents)
            .map_err(|e| AppError::Config(format!("writing {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Platform config file location, `None` where no config dir exists
    pub fn path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join(app_info::APP_NAME)
                .join(CONFIG_FILE_NAME),
        )
    }
}

