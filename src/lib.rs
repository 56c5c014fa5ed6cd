//! # clockfleet
//!
//! **clockfleet** runs operations across a fleet of networked biometric time
//! clocks: clock synchronization, attendance download, restart and probing.
//! Devices are processed in parallel with a bounded pool, each connection is
//! retried and always released, and every device ends up with exactly one
//! entry in the run's report, whatever happened to the others.
//!
//! The wire protocol is not part of this crate; it is plugged in through the
//! [`Connector`] / [`DeviceLink`] traits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   DeviceRegistry            Fleet (config, connector, sink, clock, bus)
//!  (roster, active flag)         │
//!          │             ┌───────┴──────┬──────────────┬──────────────┐
//!          └──────────►  ▼              ▼              ▼              ▼
//!                 TimeSyncManager AttendanceManager RestartManager ProbeManager
//!                        └──────────────┴───────┬──────┴──────────────┘
//!                                               ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  FleetRunner::run(devices, op)                                        │
//! │  - Semaphore(pool_size) bounds open connections                       │
//! │  - JoinSet of workers, panics caught at the worker boundary           │
//! │  - SharedState + progress callback, once per finished device          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │DeviceSession │   │DeviceSession │   │DeviceSession │
//!   │ connect(retry│   │   op.execute │   │  disconnect  │
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ publish          │ publish          │ publish
//!          ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                            │
//! └─────────────────────────────────┬─────────────────────────────────────┘
//!                                   ▼
//!                        listener ─► SubscriberSet ─► LogWriter, custom ...
//! ```
//!
//! ### Per-device lifecycle
//! ```text
//! worker(device)
//!   ├─► wait for a pool permit (or cancellation → Cancelled)
//!   ├─► DeviceSession::connect()  retried with backoff, each attempt timed out
//!   │       └─ exhausted ──► ConnectionFailed
//!   ├─► op.execute(session)       every protocol call timed out
//!   │       ├─ Ok(payload)  ──► Success
//!   │       └─ Err(e)       ──► OperationError (OutdatedTime = battery failing)
//!   └─► disconnect()              exactly once, also after a panic
//! ```
//!
//! ## Features
//! | Area            | Description                                           | Key types / traits                          |
//! |-----------------|-------------------------------------------------------|---------------------------------------------|
//! | **Fleet**       | Wire collaborators, hand out managers.                | [`Fleet`], [`FleetBuilder`]                 |
//! | **Managers**    | Device selection and post-run side effects.           | [`AttendanceManager`], [`TimeSyncManager`]  |
//! | **Runner**      | Bounded parallel execution with failure isolation.    | [`FleetRunner`], [`FleetReport`]            |
//! | **Operations**  | Per-device work, built-in or closures.                | [`DeviceOperation`], [`OperationFn`]        |
//! | **Storage**     | Roster and attendance files.                          | [`FileRegistry`], [`FileSink`]              |
//! | **Policies**    | Connection retry with backoff and jitter.             | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Events**      | Runtime events and subscribers.                       | [`Subscribe`], [`LogWriter`], [`Event`]     |
//! | **Errors**      | Typed errors with stable labels.                      | [`FleetError`], [`DeviceError`]             |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use clockfleet::{Connector, Fleet, FleetConfig, FileRegistry, FileSink, Progress};
//!
//! async fn sync_clocks(connector: Arc<dyn Connector>) -> Result<(), clockfleet::FleetError> {
//!     let fleet = Fleet::builder(
//!         FleetConfig::default(),
//!         connector,
//!         Arc::new(FileRegistry::new("devices.txt")),
//!     )
//!     .with_sink(Arc::new(FileSink::new("attendance")))
//!     .build()?;
//!
//!     let report = fleet
//!         .time_sync()
//!         .with_progress(|p: Progress| println!("{}% ({})", p.percent, p.last_device_ip))
//!         .run_all_active()
//!         .await?;
//!
//!     for ip in report.battery_failing_ips() {
//!         println!("check the battery of {ip}");
//!     }
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod device;
mod error;
mod events;
mod managers;
mod operations;
mod policies;
mod storage;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{FleetConfig, DEFAULT_PORT};
pub use crate::core::{
    DeviceSession, Fleet, FleetBuilder, FleetReport, FleetRunner, OperationResult, Progress,
    ProgressCallback, ProgressSnapshot, SessionState, SharedState,
};
pub use device::{
    format_attendances, Attendance, AttendanceStatus, Clock, Communication, Connector, Device,
    DeviceInfo, DeviceLink, FixedClock, RawAttendance, SystemClock, ATTENDANCE_TIME_FORMAT,
};
pub use error::{
    DeviceError, FleetError, LinkError, RegistryError, RetryExhausted, SinkError,
    UNCLASSIFIED_ERROR_CODE,
};
pub use events::{Bus, Event, EventKind};
pub use managers::{AttendanceManager, AttendanceRun, ProbeManager, RestartManager, TimeSyncManager};
pub use operations::{
    is_outdated, AttendanceFetch, AttendanceOutcome, DeviceOperation, OperationFn, Probe, Restart,
    TimeSync, TimeSyncOutcome,
};
pub use policies::{BackoffPolicy, JitterPolicy, RetryAttempt, RetryPolicy};
pub use storage::{
    format_roster_line, parse_roster_line, AttendanceSink, DeviceRegistry, FileRegistry, FileSink,
    MemoryRegistry, MemorySink, SinkTarget, GLOBAL_ATTENDANCE_FILE,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
