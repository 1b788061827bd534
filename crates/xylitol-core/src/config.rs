//! Logger configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::default::{DEFAULT_LEVEL, DEFAULT_LOG_PATH};
use crate::{Level, Result, RotationPolicy};

/// Environment variable overriding [`LoggerConfig::level`].
pub const LEVEL_ENV: &str = "XYLITOL_LOG_LEVEL";

/// Environment variable overriding [`LoggerConfig::file`].
pub const FILE_ENV: &str = "XYLITOL_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Level name, case-insensitive (debug, info, warn, error, fatal)
    pub level: String,
    /// Log file path
    pub file: PathBuf,
    /// Color the console level labels
    pub console_ansi: bool,
    pub rotation: RotationPolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file: PathBuf::from(DEFAULT_LOG_PATH),
            console_ansi: true,
            rotation: RotationPolicy::default(),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `XYLITOL_LOG_LEVEL` / `XYLITOL_LOG_FILE`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup(LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.level = level;
        }
        if let Some(file) = lookup(FILE_ENV).filter(|v| !v.trim().is_empty()) {
            self.file = PathBuf::from(file);
        }
        self
    }

    /// Level with the lenient fallback to `info`.
    pub fn resolved_level(&self) -> Level {
        Level::resolve(&self.level)
    }

    /// Level, rejecting unrecognized names.
    pub fn validate(&self) -> Result<Level> {
        self.level.parse()
    }
}
