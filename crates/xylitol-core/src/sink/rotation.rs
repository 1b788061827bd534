//! Size-based rotating log file
//!
//! The active file is renamed to a timestamped backup once it would grow past
//! `max_size_bytes`. Compression and pruning of old backups run on a
//! background thread; failures there are reported on stderr and never reach
//! the writer.

use chrono::NaiveDateTime;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rotation and retention policy for the file sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Maximum size of the active file before rotation (bytes)
    pub max_size_bytes: u64,

    /// Maximum number of rotated files to keep (0 = unlimited)
    pub max_backups: usize,

    /// Rotated files older than this are deleted (0 = keep forever)
    pub max_age_days: u64,

    /// Whether to gzip rotated files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 100 * 1024 * 1024, // 100MB
            max_backups: 60,
            max_age_days: 30,
            compress: true,
        }
    }
}

/// Writer for a single log file with rotation.
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    file: Option<File>,
    size: u64,
    maintenance: Option<JoinHandle<()>>,
}

impl RotatingFile {
    /// Create a writer for `path`. The file is opened on first write.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            file: None,
            size: 0,
            maintenance: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let backup = backup_path(&self.path, chrono::Local::now());
        fs::rename(&self.path, &backup)?;
        self.size = 0;

        // Keep at most one maintenance pass in flight.
        self.wait_for_maintenance();

        let active = self.path.clone();
        let policy = self.policy.clone();
        self.maintenance = Some(std::thread::spawn(move || {
            if policy.compress {
                if let Err(e) = compress_file(&backup) {
                    eprintln!("xylitol: failed to compress log file {:?}: {}", backup, e);
                }
            }
            if let Err(e) = prune_backups(&active, &policy) {
                eprintln!("xylitol: failed to prune old log files: {}", e);
            }
        }));

        Ok(())
    }

    /// Block until the last compression/pruning pass has finished.
    pub fn wait_for_maintenance(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            let _ = handle.join();
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.file.is_none() {
            self.open()?;
        }

        let len = buf.len() as u64;
        if self.size > 0 && self.size + len > self.policy.max_size_bytes {
            if let Err(e) = self.rotate() {
                eprintln!("xylitol: failed to rotate log file {:?}: {}", self.path, e);
            }
            if self.file.is_none() {
                self.open()?;
            }
        }

        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "log file is not open"));
        };
        file.write_all(buf)?;
        self.size += len;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        let _ = self.flush();
        self.wait_for_maintenance();
    }
}

fn stem_and_ext(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    (stem, ext)
}

/// `dir/run.log` -> `dir/run-2026-01-22T10-00-00.000.log`, with a numeric
/// suffix when a backup of that name already exists.
fn backup_path(path: &Path, at: chrono::DateTime<chrono::Local>) -> PathBuf {
    let (stem, ext) = stem_and_ext(path);
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let timestamp = at.format(BACKUP_TIME_FORMAT).to_string();
    let dot_ext = ext.map(|e| format!(".{}", e)).unwrap_or_default();

    let mut candidate = dir.join(format!("{}-{}{}", stem, timestamp, dot_ext));
    let mut n = 1;
    while candidate.exists() || gz_path(&candidate).exists() {
        candidate = dir.join(format!("{}-{}-{}{}", stem, timestamp, n, dot_ext));
        n += 1;
    }
    candidate
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` into `path.gz` and remove the original.
pub fn compress_file(path: &Path) -> io::Result<PathBuf> {
    let target = gz_path(path);
    let content = fs::read(path)?;

    let file = File::create(&target)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&content)?;
    encoder.finish()?;

    fs::remove_file(path)?;
    Ok(target)
}

/// Timestamp of a backup named by [`backup_path`], or `None` when `name` is
/// some other file that merely shares the stem.
fn backup_timestamp(
    name: &str,
    prefix: &str,
    plain_suffix: &str,
    gz_suffix: &str,
) -> Option<NaiveDateTime> {
    let rest = name.strip_prefix(prefix)?;
    let middle = rest
        .strip_suffix(gz_suffix)
        .or_else(|| rest.strip_suffix(plain_suffix))?;

    if let Ok(at) = NaiveDateTime::parse_from_str(middle, BACKUP_TIME_FORMAT) {
        return Some(at);
    }
    // Collision suffix: `<timestamp>-<n>`
    let (timestamp, n) = middle.rsplit_once('-')?;
    if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(timestamp, BACKUP_TIME_FORMAT).ok()
}

/// Delete rotated backups of `active` that are older than the policy's max
/// age, then the oldest ones beyond `max_backups`.
pub fn prune_backups(active: &Path, policy: &RotationPolicy) -> io::Result<()> {
    let (stem, ext) = stem_and_ext(active);
    let prefix = format!("{}-", stem);
    let plain_suffix = ext.as_ref().map(|e| format!(".{}", e)).unwrap_or_default();
    let gz_suffix = format!("{}.gz", plain_suffix);
    let active_name = active.file_name().map(|n| n.to_string_lossy().into_owned());

    let dir = match active.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut backups = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if Some(&name) == active_name.as_ref() {
            continue;
        }
        if backup_timestamp(&name, &prefix, &plain_suffix, &gz_suffix).is_none() {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            backups.push((entry.path(), modified));
        }
    }

    // Oldest first
    backups.sort_by_key(|(_, modified)| *modified);

    if policy.max_age_days > 0 {
        let max_age = Duration::from_secs(policy.max_age_days * SECONDS_PER_DAY);
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        backups.retain(|(path, modified)| {
            if *modified < cutoff {
                if let Err(e) = fs::remove_file(path) {
                    eprintln!("xylitol: failed to remove expired log file {:?}: {}", path, e);
                }
                false
            } else {
                true
            }
        });
    }

    if policy.max_backups > 0 && backups.len() > policy.max_backups {
        let excess = backups.len() - policy.max_backups;
        for (path, _) in backups.iter().take(excess) {
            if let Err(e) = fs::remove_file(path) {
                eprintln!("xylitol: failed to remove old log file {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}
