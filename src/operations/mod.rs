//! Fleet operations.
//!
//! - [`DeviceOperation`] trait and the closure-backed [`OperationFn`]
//! - [`TimeSync`] read, compare and correct the device clock
//! - [`AttendanceFetch`] download, store and conditionally clear punches
//! - [`Restart`] reboot the device
//! - [`Probe`] ping and collect device information

mod attendance;
mod operation;
mod probe;
mod restart;
mod time_sync;

pub use attendance::{AttendanceFetch, AttendanceOutcome};
pub use operation::{DeviceOperation, OperationFn};
pub use probe::Probe;
pub use restart::Restart;
pub use time_sync::{is_outdated, TimeSync, TimeSyncOutcome};
