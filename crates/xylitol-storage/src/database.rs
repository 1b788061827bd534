//! SQLite connection whose statements are traced through a [`QueryLogger`].

use rusqlite::{Connection, Params, Row};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::query_logger::QueryLogger;

/// SQLite database wrapper.
pub struct Database<L: QueryLogger> {
    conn: Connection,
    logger: L,
}

impl<L: QueryLogger> Database<L> {
    /// Open a database at the given path.
    ///
    /// If the database doesn't exist, it will be created.
    pub fn open(path: &Path, logger: L) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        debug!("Opened database at {:?}", path);
        Ok(Self { conn, logger })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(logger: L) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        debug!("Opened in-memory database");
        Ok(Self { conn, logger })
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    /// Swap the query logger's verbosity, see [`QueryLogger::log_mode`].
    pub fn set_log_mode(&mut self, level: crate::DbLogLevel) {
        self.logger = self.logger.log_mode(level);
    }

    /// Raw connection. Statements run through it are not traced.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute one statement, returning the number of changed rows.
    #[track_caller]
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        let begin = Instant::now();
        let result = self.conn.execute(sql, params);
        let rows = result.as_ref().map(|n| *n as i64).unwrap_or(0);
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        Ok(result?)
    }

    /// Execute several `;`-separated statements without parameters.
    #[track_caller]
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let begin = Instant::now();
        let result = self.conn.execute_batch(sql);
        self.logger
            .trace(begin, &|| (sql.to_string(), 0), result.as_ref().err());
        Ok(result?)
    }

    /// Run a query expected to return one row.
    ///
    /// No row is reported as `QueryReturnedNoRows` and traced as "record
    /// not found".
    #[track_caller]
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let begin = Instant::now();
        let result = self.conn.query_row(sql, params, f);
        let rows = i64::from(result.is_ok());
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        Ok(result?)
    }

    /// Run a query and map every returned row.
    #[track_caller]
    pub fn query_map<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let begin = Instant::now();
        let result = self.collect_rows(sql, params, f);
        let rows = result.as_ref().map(|v| v.len() as i64).unwrap_or(0);
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        Ok(result?)
    }

    fn collect_rows<T, P, F>(&self, sql: &str, params: P, f: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;
        rows.collect()
    }
}
