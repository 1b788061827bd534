//! Database log adapter
//!
//! [`DbLogger`] receives the database layer's log and query-trace callbacks
//! and writes them through a shared [`Logger`]. Its verbosity is its own:
//! changing it never touches the shared logger's level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use xylitol_core::{Field, Fields, Logger};

use crate::error::StorageError;

/// Message prefix of every line written by the adapter.
pub const TAG: &str = "[SQL]";

/// Verbosity of the database layer's own instrumentation.
///
/// `Silent < Error < Warn < Info`; a level lets through itself and
/// everything to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbLogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
}

impl DbLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for DbLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbLogLevel {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            _ => Err(StorageError::InvalidLevel(s.to_string())),
        }
    }
}

fn default_slow_threshold_ms() -> u64 {
    200
}

/// Settings for [`DbLogger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbLoggerConfig {
    pub level: DbLogLevel,
    /// Queries slower than this are logged as slow; 0 disables the check.
    pub slow_threshold_ms: u64,
}

impl Default for DbLoggerConfig {
    fn default() -> Self {
        Self {
            level: DbLogLevel::default(),
            slow_threshold_ms: default_slow_threshold_ms(),
        }
    }
}

/// Log and trace callbacks of the database layer.
pub trait QueryLogger: Send + Sync {
    /// Copy of this logger with verbosity `level`.
    fn log_mode(&self, level: DbLogLevel) -> Self
    where
        Self: Sized;

    fn info(&self, msg: &str);

    fn warn(&self, msg: &str);

    fn error(&self, msg: &str);

    /// Record one executed statement.
    ///
    /// `statement` yields the SQL text and the affected row count; it is only
    /// called when the outcome will be logged.
    fn trace(
        &self,
        begin: Instant,
        statement: &dyn Fn() -> (String, i64),
        err: Option<&rusqlite::Error>,
    );
}

#[derive(Clone)]
pub struct DbLogger {
    logger: Arc<Logger>,
    level: DbLogLevel,
    slow_threshold: Duration,
}

impl DbLogger {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self::from_config(logger, &DbLoggerConfig::default())
    }

    pub fn from_config(logger: Arc<Logger>, config: &DbLoggerConfig) -> Self {
        Self {
            logger,
            level: config.level,
            slow_threshold: Duration::from_millis(config.slow_threshold_ms),
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn level(&self) -> DbLogLevel {
        self.level
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    fn allows(&self, needed: DbLogLevel) -> bool {
        needed != DbLogLevel::Silent && self.level >= needed
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        !self.slow_threshold.is_zero() && elapsed > self.slow_threshold
    }
}

impl QueryLogger for DbLogger {
    fn log_mode(&self, level: DbLogLevel) -> Self {
        Self {
            level,
            ..self.clone()
        }
    }

    #[track_caller]
    fn info(&self, msg: &str) {
        if self.allows(DbLogLevel::Info) {
            self.logger.info(&format!("{} Info: {}", TAG, msg), Fields::new());
        }
    }

    #[track_caller]
    fn warn(&self, msg: &str) {
        if self.allows(DbLogLevel::Warn) {
            self.logger.warn(&format!("{} Warn: {}", TAG, msg), Fields::new());
        }
    }

    #[track_caller]
    fn error(&self, msg: &str) {
        if self.allows(DbLogLevel::Error) {
            self.logger.error(&format!("{} Error: {}", TAG, msg), Fields::new());
        }
    }

    #[track_caller]
    fn trace(
        &self,
        begin: Instant,
        statement: &dyn Fn() -> (String, i64),
        err: Option<&rusqlite::Error>,
    ) {
        let elapsed = begin.elapsed();
        let fields = || {
            let (sql, rows) = statement();
            Fields::with_capacity(4)
                .with(Field::str("sql", sql))
                .with(Field::float("time", elapsed.as_secs_f64()))
                .with(Field::int("rows", rows))
        };

        match err {
            Some(rusqlite::Error::QueryReturnedNoRows) => {
                if self.allows(DbLogLevel::Warn) {
                    self.logger
                        .warn(&format!("{} record not found", TAG), fields());
                }
            }
            Some(err) => {
                if self.allows(DbLogLevel::Error) {
                    self.logger
                        .error(&format!("{} error", TAG), fields().with(Field::error(err)));
                }
            }
            None if self.is_slow(elapsed) => {
                if self.allows(DbLogLevel::Warn) {
                    self.logger.warn(&format!("{} slow query", TAG), fields());
                }
            }
            None => {
                if self.allows(DbLogLevel::Info) {
                    self.logger.debug(&format!("{} query", TAG), fields());
                }
            }
        }
    }
}

impl fmt::Debug for DbLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbLogger")
            .field("level", &self.level)
            .field("slow_threshold", &self.slow_threshold)
            .finish()
    }
}
