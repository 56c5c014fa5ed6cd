//! # Attendance sinks.
//!
//! Every fetched record is written twice: once into the file of the device
//! that produced it, once into the global file shared by the whole fleet.
//!
//! ```text
//! <root>/
//!   attendances_file.txt                              ← SinkTarget::Global
//!   devices/<district>/<model>-<point>/
//!       <ip>_<YYYY-MM-DD>_file.cro                    ← SinkTarget::Device
//! ```
//! Directory segments are lower-cased. Files are opened in append mode and
//! receive one [`Attendance::to_line`] per record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::device::{Attendance, Clock, Device, SystemClock};
use crate::error::SinkError;

/// Global file name under the sink root.
pub const GLOBAL_ATTENDANCE_FILE: &str = "attendances_file.txt";

/// Destination of one append.
#[derive(Clone, Copy, Debug)]
pub enum SinkTarget<'a> {
    /// The per-device file.
    Device(&'a Device),
    /// The fleet-wide file.
    Global,
}

/// Append-only attendance storage.
#[async_trait]
pub trait AttendanceSink: Send + Sync + 'static {
    async fn append(&self, records: &[Attendance], target: SinkTarget<'_>) -> Result<(), SinkError>;
}

/// File-backed sink rooted at a directory.
pub struct FileSink {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses `clock` to date per-device files.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Path that `target` resolves to today.
    pub fn path_for(&self, target: SinkTarget<'_>) -> PathBuf {
        match target {
            SinkTarget::Global => self.root.join(GLOBAL_ATTENDANCE_FILE),
            SinkTarget::Device(d) => {
                let date = self.clock.now().format("%Y-%m-%d");
                self.root
                    .join("devices")
                    .join(d.district.trim().to_lowercase())
                    .join(format!("{}-{}", d.model_name.trim(), d.point.trim()).to_lowercase())
                    .join(format!("{}_{}_file.cro", d.ip, date))
            }
        }
    }
}

async fn append_lines(path: &Path, records: &[Attendance]) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut buf = String::new();
    for r in records {
        buf.push_str(&r.to_line());
        buf.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(buf.as_bytes()).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    Ok(())
}

#[async_trait]
impl AttendanceSink for FileSink {
    /// Empty slices are a no-op.
    async fn append(&self, records: &[Attendance], target: SinkTarget<'_>) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.path_for(target);
        append_lines(&path, records).await?;
        debug!(path = ?path, count = records.len(), "attendances appended");
        Ok(())
    }
}

/// In-memory sink keeping per-device and global records apart.
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<MemorySinkInner>,
}

#[derive(Default)]
struct MemorySinkInner {
    per_device: HashMap<String, Vec<Attendance>>,
    global: Vec<Attendance>,
    global_appends: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended for the device with this IP.
    pub fn device_records(&self, ip: &str) -> Vec<Attendance> {
        self.inner
            .lock()
            .per_device
            .get(ip)
            .cloned()
            .unwrap_or_default()
    }

    pub fn global_records(&self) -> Vec<Attendance> {
        self.inner.lock().global.clone()
    }

    /// How many times the global target was appended to.
    pub fn global_appends(&self) -> usize {
        self.inner.lock().global_appends
    }
}

#[async_trait]
impl AttendanceSink for MemorySink {
    async fn append(&self, records: &[Attendance], target: SinkTarget<'_>) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        match target {
            SinkTarget::Device(d) => inner
                .per_device
                .entry(d.ip.clone())
                .or_default()
                .extend_from_slice(records),
            SinkTarget::Global => {
                inner.global_appends += 1;
                inner.global.extend_from_slice(records);
            }
        }
        Ok(())
    }
}
