//! # Operation managers.
//!
//! Each manager owns one [`FleetRunner`](crate::FleetRunner) (and therefore
//! its own progress counters), picks devices from the roster and applies the
//! post-run side effects of its operation.
//!
//! ```text
//! roster.list_active_devices()
//!     │  dedup by IP, keep the caller's selection (unknown IPs: warn, skip)
//!     ▼
//! FleetRunner::run(devices, op) ──► FleetReport
//!     │
//!     ├─ TimeSyncManager    battery flags → roster
//!     ├─ AttendanceManager  global file once, battery flags, force clear reset
//!     ├─ RestartManager     -
//!     └─ ProbeManager       -
//! ```
//!
//! Managers are cheap; get a fresh one from the [`Fleet`](crate::Fleet) for
//! each job. A cancelled manager stays cancelled.

mod attendance;
mod base;
mod probe;
mod restart;
mod time_sync;

pub use attendance::{AttendanceManager, AttendanceRun};
pub use probe::ProbeManager;
pub use restart::RestartManager;
pub use time_sync::TimeSyncManager;
