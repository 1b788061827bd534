//! Xylitol Storage
//!
//! Database log adapter and a SQLite connection whose statements are traced
//! through it.
//!
//! ```rust,ignore
//! use xylitol_storage::{Database, DbLogLevel, DbLogger, QueryLogger};
//!
//! let db = Database::open(&path, DbLogger::new(logger).log_mode(DbLogLevel::Warn))?;
//! db.execute("UPDATE products SET price = ?1 WHERE code = ?2", (200, "D42"))?;
//! ```

mod database;
mod error;
mod query_logger;

pub use database::Database;
pub use error::{Result, StorageError};
pub use query_logger::{DbLogLevel, DbLogger, DbLoggerConfig, QueryLogger, TAG};
