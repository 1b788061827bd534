//! Sink Builder
//!
//! A [`SinkFactory`] produces the two destinations every logger writes to:
//! the console and a file. Both are encoded with [`LineFormat`].

mod format;
mod rotation;

pub(crate) use format::{CALLER_FIELD, FIELDS_FIELD, SEVERITY_FIELD};
pub use format::LineFormat;
pub use rotation::{compress_file, prune_backups, RotatingFile, RotationPolicy};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};

/// The console and file destinations of one logger.
pub struct Sinks {
    pub console: BoxMakeWriter,
    /// Whether the console accepts ANSI color codes
    pub console_ansi: bool,
    pub file: BoxMakeWriter,
    /// Keeps a background file writer alive; dropping it flushes pending lines
    pub guard: Option<WorkerGuard>,
}

/// Builds [`Sinks`] for a log file path.
///
/// Called once when a logger is created and again on every level change.
pub trait SinkFactory: Send + Sync {
    fn build(&self, path: &Path) -> Sinks;
}

/// Stdout plus a rotating file fed through a non-blocking writer thread.
///
/// Every build for the same path writes through one [`RotatingFile`], so a
/// worker left over from a previous level still appends to the file the new
/// worker rotates.
#[derive(Debug, Clone)]
pub struct StandardSinks {
    policy: RotationPolicy,
    ansi: bool,
    files: Arc<Mutex<HashMap<PathBuf, SharedFile>>>,
}

impl StandardSinks {
    pub fn new(policy: RotationPolicy, ansi: bool) -> Self {
        Self {
            policy,
            ansi,
            files: Arc::default(),
        }
    }

    fn file_for(&self, path: &Path) -> SharedFile {
        self.files
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| SharedFile::new(RotatingFile::new(path, self.policy.clone())))
            .clone()
    }
}

impl Default for StandardSinks {
    fn default() -> Self {
        Self::new(RotationPolicy::default(), true)
    }
}

impl SinkFactory for StandardSinks {
    fn build(&self, path: &Path) -> Sinks {
        // Not lossy: a full queue applies backpressure instead of dropping lines.
        let (file, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("xylitol-file-sink")
            .finish(self.file_for(path));

        Sinks {
            console: BoxMakeWriter::new(io::stdout),
            console_ansi: self.ansi,
            file: BoxMakeWriter::new(file),
            guard: Some(guard),
        }
    }
}

/// A [`RotatingFile`] behind a lock, shared by the writer threads of one path.
#[derive(Clone)]
struct SharedFile(Arc<Mutex<RotatingFile>>);

impl SharedFile {
    fn new(file: RotatingFile) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }
}

impl io::Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

impl std::fmt::Debug for SharedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedFile")
    }
}

/// Shared in-memory buffer usable as a sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl io::Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemoryWriter {
    type Writer = MemoryWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// In-memory console and file buffers.
///
/// Clones share the same buffers, so a handle kept by the caller observes
/// everything written by a logger built from another clone, including across
/// level changes.
#[derive(Debug, Clone, Default)]
pub struct MemorySinks {
    console: MemoryWriter,
    file: MemoryWriter,
}

impl MemorySinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn console_output(&self) -> String {
        self.console.contents()
    }

    pub fn file_output(&self) -> String {
        self.file.contents()
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.console_output().lines().map(str::to_string).collect()
    }

    pub fn file_lines(&self) -> Vec<String> {
        self.file_output().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.console.clear();
        self.file.clear();
    }
}

impl SinkFactory for MemorySinks {
    fn build(&self, _path: &Path) -> Sinks {
        Sinks {
            console: BoxMakeWriter::new(self.console.clone()),
            console_ansi: false,
            file: BoxMakeWriter::new(self.file.clone()),
            guard: None,
        }
    }
}
