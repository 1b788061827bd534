//! Severity levels and level-name resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LoggerError;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Upper-case label used by the line encoder.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Case-insensitive parse. `panic` and `dpanic` are accepted as aliases
    /// of `fatal`; `warning` as an alias of `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "fatal" | "panic" | "dpanic" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Lenient resolution: unrecognized text resolves to [`Level::Info`].
    ///
    /// Use [`str::parse`] instead when a typo should be reported.
    pub fn resolve(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Info)
    }

    /// Closest `tracing` level. `tracing` has no fatal level, so fatal
    /// records travel as `ERROR` and carry their own label.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error | Self::Fatal => tracing::Level::ERROR,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| LoggerError::InvalidLevel(s.to_string()))
    }
}
