use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown database log level: {0:?}")]
    InvalidLevel(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
