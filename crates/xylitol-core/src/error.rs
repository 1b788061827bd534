//! Logger errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log level: {0:?}")]
    InvalidLevel(String),

    #[error("log sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoggerError>;
