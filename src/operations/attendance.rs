//! # Attendance fetch.
//!
//! ```text
//! record_count ─► get_attendance ─┬─ count matches ───────────────┐
//!                                 └─ mismatch: re-fetch (bounded) ─┤
//!                                                                  ▼
//!                        format ─► per-device sink ─► conditional clear
//!                                                                  │
//!                        refresh model name (best effort) ◄────────┘
//!                                  │
//!                        clock check (optional, flags battery)
//! ```
//!
//! ## Clearing
//! Device storage is cleared only after the records were written to the
//! device sink, and only when `clear` is set and either:
//! - every record formatted and the fetched count matched, or
//! - `force_clear` is set.
//!
//! A count mismatch that survives the re-fetches is logged and the fetched
//! records are kept. Writing the global file is left to the caller, once per
//! run.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::FleetConfig;
use crate::core::{DeviceSession, FleetReport};
use crate::device::{format_attendances, Attendance, Clock, RawAttendance};
use crate::error::DeviceError;
use crate::operations::time_sync::check_and_correct;
use crate::operations::DeviceOperation;
use crate::storage::{AttendanceSink, SinkTarget};

/// Result of fetching one device.
#[derive(Debug, Clone)]
pub struct AttendanceOutcome {
    /// Records that formatted, already written to the device sink.
    pub records: Vec<Attendance>,
    /// Records that could not be formatted.
    pub rejected: Vec<RawAttendance>,
    /// Count reported by the device.
    pub expected: usize,
    /// Fetched count still differed from `expected` after every re-fetch.
    pub count_mismatch: bool,
    /// Device storage was cleared.
    pub cleared: bool,
    /// Model name after the refresh attempt.
    pub model_name: String,
    /// Clock check result: `Some(false)` when the device clock had drifted,
    /// `None` when the check was disabled or could not complete.
    pub battery_ok: Option<bool>,
}

impl FleetReport<AttendanceOutcome> {
    /// Records fetched across every successful device.
    pub fn total_records(&self) -> usize {
        self.successes().map(|(_, out)| out.records.len()).sum()
    }
}

/// Fleet operation: download attendance records.
pub struct AttendanceFetch {
    sink: Arc<dyn AttendanceSink>,
    clock: Arc<dyn Clock>,
    clear: bool,
    force_clear: bool,
    fetch_retries: u32,
    sync_time: bool,
    tolerance_minutes: i64,
}

impl AttendanceFetch {
    /// Takes clearing, re-fetch and clock-check settings from `cfg`.
    pub fn new(sink: Arc<dyn AttendanceSink>, clock: Arc<dyn Clock>, cfg: &FleetConfig) -> Self {
        Self {
            sink,
            clock,
            clear: cfg.clear_attendance,
            force_clear: cfg.clearing_forced(),
            fetch_retries: cfg.attendance_fetch_retries,
            sync_time: cfg.sync_time_after_fetch,
            tolerance_minutes: cfg.time_tolerance_minutes,
        }
    }

    /// Overrides the one-shot force-clear flag.
    pub fn with_force_clear(mut self, force: bool) -> Self {
        self.force_clear = force;
        self
    }

    async fn fetch_checked(&self, session: &mut DeviceSession) -> Result<(Vec<RawAttendance>, usize, bool), DeviceError> {
        let expected = session.record_count().await?;
        let mut records = session.get_attendance().await?;

        let mut refetches = 0;
        while records.len() != expected && refetches < self.fetch_retries {
            refetches += 1;
            warn!(
                ip = %session.device().ip,
                expected,
                fetched = records.len(),
                attempt = refetches,
                "attendance count mismatch, fetching again"
            );
            records = session.get_attendance().await?;
        }

        let mismatch = records.len() != expected;
        if mismatch {
            let err = DeviceError::ObtainAttendances {
                ip: session.device().ip.clone(),
                expected,
                fetched: records.len(),
            };
            error!(error = %err, refetches, "keeping partial attendance data");
        }
        Ok((records, expected, mismatch))
    }
}

#[async_trait]
impl DeviceOperation for AttendanceFetch {
    type Output = AttendanceOutcome;

    fn name(&self) -> &str {
        "attendance"
    }

    async fn execute(&self, session: &mut DeviceSession) -> Result<AttendanceOutcome, DeviceError> {
        let (raw, expected, count_mismatch) = self.fetch_checked(session).await?;

        let (records, rejected) = format_attendances(&raw, &session.device().id);
        if !rejected.is_empty() {
            warn!(ip = %session.device().ip, rejected = rejected.len(), "records failed to format");
        }

        self.sink
            .append(&records, SinkTarget::Device(session.device()))
            .await?;

        let clean = rejected.is_empty() && !count_mismatch;
        let cleared = if self.clear && (clean || self.force_clear) {
            match session.clear_attendance().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(ip = %session.device().ip, error = %e, "clearing attendance failed");
                    false
                }
            }
        } else {
            if self.clear {
                debug!(ip = %session.device().ip, "attendance kept on device");
            }
            false
        };

        match session.device_name().await {
            Ok(name) if !name.trim().is_empty() => session.device_mut().model_name = name.trim().to_string(),
            Ok(_) => {}
            Err(e) => debug!(ip = %session.device().ip, error = %e, "model name refresh skipped"),
        }

        let battery_ok = if self.sync_time {
            match check_and_correct(session, self.clock.as_ref(), self.tolerance_minutes).await {
                Ok(_) => Some(true),
                Err(e) if e.is_battery_failing() => {
                    warn!(error = %e, "device clock drifted");
                    Some(false)
                }
                Err(e) => {
                    warn!(ip = %session.device().ip, error = %e, "clock check failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(AttendanceOutcome {
            records,
            rejected,
            expected,
            count_mismatch,
            cleared,
            model_name: session.device().model_name.clone(),
            battery_ok,
        })
    }
}
