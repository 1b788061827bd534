//! # Xylitol Core
//!
//! Leveled structured logging behind one facade:
//! - Level names resolved case-insensitively
//! - Console and rotating-file sinks sharing one line encoding
//! - Trace IDs for correlating responses with their log lines
//! - A process-wide default logger for components without an injected one
//!
//! ```rust,ignore
//! use xylitol_core::{Field, Logger};
//!
//! let logger = Logger::new("info", "tmp/run.log");
//! logger.info("service started", Field::uint("port", 8080));
//! logger.set_log_level("debug");
//! ```

mod config;
mod default;
mod error;
mod fields;
mod level;
mod logger;
pub mod sink;
mod trace_id;

pub use config::{LoggerConfig, FILE_ENV, LEVEL_ENV};
pub use default::{default_logger, set_default_logger, DEFAULT_LEVEL, DEFAULT_LOG_PATH};
pub use error::{LoggerError, Result};
pub use fields::{Field, FieldValue, Fields};
pub use level::Level;
pub use logger::{Logger, LOG_TARGET};
pub use sink::{MemorySinks, RotationPolicy, SinkFactory, StandardSinks};
pub use trace_id::generate_trace_id;
