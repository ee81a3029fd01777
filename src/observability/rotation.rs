//! Size-based rotation for the JSON log file.
//!
//! `app.log` rolls over to `app.log.1`, `app.log.2`, ... (gzipped when
//! compression is on). The backup count is enforced on every rotation;
//! the age limit is enforced when the file is opened and then hourly.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};

use crate::config::LoggingConfig;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Rotation limits, already converted to bytes and durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_bytes: usize,
    /// `None` keeps every backup.
    pub max_backups: Option<usize>,
    /// `None` keeps backups regardless of age.
    pub max_age: Option<Duration>,
    pub compress: bool,
}

impl Limits {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            max_bytes: config.file_max_size_mb.saturating_mul(1024 * 1024),
            max_backups: (config.file_max_backups > 0).then_some(config.file_max_backups),
            max_age: (config.file_max_age_days > 0)
                .then(|| DAY.saturating_mul(config.file_max_age_days.min(u32::MAX as u64) as u32)),
            compress: config.file_compress,
        }
    }
}

/// A log file that rotates by size and prunes old backups.
pub struct RotatingFile {
    inner: FileRotate<AppendCount>,
    path: PathBuf,
    max_age: Option<Duration>,
    last_prune: Instant,
}

impl RotatingFile {
    pub fn open(path: impl AsRef<Path>, limits: Limits) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        // FileRotate defers open errors to the first write.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let compression = if limits.compress {
            Compression::OnRotate(0)
        } else {
            Compression::None
        };
        let inner = FileRotate::new(
            &path,
            AppendCount::new(limits.max_backups.unwrap_or(usize::MAX)),
            ContentLimit::BytesSurpassed(limits.max_bytes),
            compression,
            #[cfg(unix)]
            None,
        );

        let mut file = Self {
            inner,
            path,
            max_age: limits.max_age,
            last_prune: Instant::now(),
        };
        file.prune();
        Ok(file)
    }

    /// Remove backups older than the age limit. Best effort.
    fn prune(&mut self) {
        self.last_prune = Instant::now();
        let Some(max_age) = self.max_age else {
            return;
        };
        let (Some(dir), Some(base)) = (self.path.parent(), self.path.file_name()) else {
            return;
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        let base = base.to_string_lossy();
        let now = SystemTime::now();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !is_backup(&name.to_string_lossy(), &base) {
                continue;
            }
            let expired = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.last_prune.elapsed() >= PRUNE_INTERVAL {
            self.prune();
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `app.log.3` and `app.log.3.gz` are backups of `app.log`.
fn is_backup(name: &str, base: &str) -> bool {
    name.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(|suffix| suffix.strip_suffix(".gz").unwrap_or(suffix))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}
