//! Roster and attendance storage.
//!
//! - [`DeviceRegistry`]: [`FileRegistry`] (`" - "` separated roster) and [`MemoryRegistry`]
//! - [`AttendanceSink`]: [`FileSink`] (per-device and global files) and [`MemorySink`]

mod registry;
mod sink;

pub use registry::{
    format_roster_line, parse_roster_line, DeviceRegistry, FileRegistry, MemoryRegistry,
};
pub use sink::{AttendanceSink, FileSink, MemorySink, SinkTarget, GLOBAL_ATTENDANCE_FILE};
