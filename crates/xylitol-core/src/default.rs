//! Process-wide default logger
//!
//! Components that are not handed a logger explicitly fall back to this one.
//! Replace it during startup, before request traffic begins.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::Logger;

/// Level of the default logger until it is replaced.
pub const DEFAULT_LEVEL: &str = "debug";

/// File path of the default logger until it is replaced.
pub const DEFAULT_LOG_PATH: &str = "tmp/run.log";

lazy_static! {
    static ref DEFAULT_LOGGER: RwLock<Arc<Logger>> =
        RwLock::new(Arc::new(Logger::new(DEFAULT_LEVEL, DEFAULT_LOG_PATH)));
}

/// The current default logger.
pub fn default_logger() -> Arc<Logger> {
    DEFAULT_LOGGER.read().clone()
}

/// Replace the default logger, returning the previous one.
pub fn set_default_logger(logger: impl Into<Arc<Logger>>) -> Arc<Logger> {
    std::mem::replace(&mut *DEFAULT_LOGGER.write(), logger.into())
}
