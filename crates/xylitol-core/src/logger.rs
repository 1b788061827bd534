//! Logger Facade
//!
//! A [`Logger`] owns its level, its file path and an engine: a
//! `tracing::Dispatch` whose console and file layers share one encoding and
//! one level filter. Changing the level rebuilds the engine from scratch.

use parking_lot::RwLock;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, Layer};

use crate::sink::{LineFormat, SinkFactory, StandardSinks};
use crate::{generate_trace_id, Fields, Level, LoggerConfig, Result};

/// `tracing` target of every record emitted through the facade.
pub const LOG_TARGET: &str = "xylitol";

struct Engine {
    level: Level,
    dispatch: Dispatch,
    guard: Option<WorkerGuard>,
}

impl Engine {
    fn build(level: Level, path: &Path, factory: &dyn SinkFactory) -> Self {
        let sinks = factory.build(path);
        let filter = LevelFilter::from_level(level.as_tracing());

        let console_layer = fmt::layer()
            .with_writer(sinks.console)
            .with_ansi(sinks.console_ansi)
            .event_format(LineFormat)
            .with_filter(filter);

        let file_layer = fmt::layer()
            .with_writer(sinks.file)
            .with_ansi(false)
            .event_format(LineFormat)
            .with_filter(filter);

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        Self {
            level,
            dispatch: Dispatch::new(subscriber),
            guard: sinks.guard,
        }
    }
}

/// Leveled structured logger writing to a console sink and a file sink.
///
/// Safe to share across threads. [`Logger::set_log_level`] swaps the engine
/// under a write lock, so calls already in flight finish on the old sinks.
pub struct Logger {
    path: PathBuf,
    sinks: Arc<dyn SinkFactory>,
    engine: RwLock<Engine>,
}

impl Logger {
    /// Create a logger with stdout and a rotating file at `path`.
    ///
    /// Unrecognized level text falls back to `info`.
    pub fn new(level: &str, path: impl Into<PathBuf>) -> Self {
        Self::with_sinks(Level::resolve(level), path, StandardSinks::default())
    }

    /// Like [`Logger::new`] but rejects unrecognized level text.
    pub fn try_new(level: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let level: Level = level.parse()?;
        Ok(Self::with_sinks(level, path, StandardSinks::default()))
    }

    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::with_sinks(
            config.resolved_level(),
            &config.file,
            StandardSinks::new(config.rotation.clone(), config.console_ansi),
        )
    }

    /// Create a logger whose destinations come from `sinks`.
    pub fn with_sinks(
        level: Level,
        path: impl Into<PathBuf>,
        sinks: impl SinkFactory + 'static,
    ) -> Self {
        let path = path.into();
        let sinks: Arc<dyn SinkFactory> = Arc::new(sinks);
        let engine = Engine::build(level, &path, sinks.as_ref());
        Self {
            path,
            sinks,
            engine: RwLock::new(engine),
        }
    }

    pub fn level(&self) -> Level {
        self.engine.read().level
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record at `level` would be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.engine.read().level
    }

    /// Re-resolve `level` (lenient) and rebuild both sinks.
    pub fn set_log_level(&self, level: &str) {
        self.set_level(Level::resolve(level));
    }

    /// Rebuild both sinks at `level`. Takes effect for the next call.
    pub fn set_level(&self, level: Level) {
        let engine = Engine::build(level, &self.path, self.sinks.as_ref());
        let previous = std::mem::replace(&mut *self.engine.write(), engine);
        // Flushes the previous file writer, outside the lock.
        drop(previous);
    }

    pub fn generate_trace_id(&self) -> String {
        generate_trace_id()
    }

    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, fields: impl Into<Fields>) {
        self.emit(level, Location::caller(), msg, &fields.into());
    }

    /// Like [`Logger::log`], but `fields` only runs when `level` is enabled.
    #[track_caller]
    pub fn log_with<F>(&self, level: Level, msg: &str, fields: F)
    where
        F: FnOnce() -> Fields,
    {
        if self.enabled(level) {
            self.emit(level, Location::caller(), msg, &fields());
        }
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, fields: impl Into<Fields>) {
        self.emit(Level::Debug, Location::caller(), msg, &fields.into());
    }

    #[track_caller]
    pub fn info(&self, msg: &str, fields: impl Into<Fields>) {
        self.emit(Level::Info, Location::caller(), msg, &fields.into());
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, fields: impl Into<Fields>) {
        self.emit(Level::Warn, Location::caller(), msg, &fields.into());
    }

    #[track_caller]
    pub fn error(&self, msg: &str, fields: impl Into<Fields>) {
        self.emit(Level::Error, Location::caller(), msg, &fields.into());
    }

    /// Emit at fatal level, flush the file sink and exit the process.
    ///
    /// Reserved for unrecoverable startup errors.
    #[track_caller]
    pub fn fatal(&self, msg: &str, fields: impl Into<Fields>) -> ! {
        self.emit(Level::Fatal, Location::caller(), msg, &fields.into());
        let guard = self.engine.write().guard.take();
        drop(guard);
        std::process::exit(1)
    }

    fn emit(&self, level: Level, caller: &Location<'_>, msg: &str, fields: &Fields) {
        let engine = self.engine.read();
        if level < engine.level {
            return;
        }

        let severity = level.label();
        let caller = format!("{}:{}", caller.file(), caller.line());
        let caller = caller.as_str();

        tracing::dispatcher::with_default(&engine.dispatch, || match level {
            Level::Debug => tracing::event!(
                target: LOG_TARGET,
                tracing::Level::DEBUG,
                severity,
                caller,
                fields = %fields,
                "{}",
                msg
            ),
            Level::Info => tracing::event!(
                target: LOG_TARGET,
                tracing::Level::INFO,
                severity,
                caller,
                fields = %fields,
                "{}",
                msg
            ),
            Level::Warn => tracing::event!(
                target: LOG_TARGET,
                tracing::Level::WARN,
                severity,
                caller,
                fields = %fields,
                "{}",
                msg
            ),
            Level::Error | Level::Fatal => tracing::event!(
                target: LOG_TARGET,
                tracing::Level::ERROR,
                severity,
                caller,
                fields = %fields,
                "{}",
                msg
            ),
        });
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("path", &self.path)
            .finish()
    }
}
