//! # Time synchronization.
//!
//! Reads the device clock, compares it to the local clock and writes the local
//! time back. The write happens on every reachable device; the comparison only
//! decides whether the device is reported as drifting ("battery failing").
//!
//! A clock is outdated when any of these differ:
//! - the hour,
//! - the minute, by `tolerance_minutes` or more,
//! - the day, month or year.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::core::DeviceSession;
use crate::device::Clock;
use crate::error::DeviceError;
use crate::operations::DeviceOperation;

/// Device and local time observed during a successful sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSyncOutcome {
    pub device_time: NaiveDateTime,
    pub local_time: NaiveDateTime,
}

/// Whether `device` has drifted from `local`.
pub fn is_outdated(device: NaiveDateTime, local: NaiveDateTime, tolerance_minutes: i64) -> bool {
    let minute_skew = (i64::from(device.minute()) - i64::from(local.minute())).abs();
    device.hour() != local.hour()
        || minute_skew >= tolerance_minutes
        || device.date() != local.date()
}

/// Reads, compares and corrects the clock of a connected device.
///
/// Returns [`DeviceError::OutdatedTime`] when the clock had drifted, whether
/// or not the correction succeeded.
pub(crate) async fn check_and_correct(
    session: &mut DeviceSession,
    clock: &dyn Clock,
    tolerance_minutes: i64,
) -> Result<TimeSyncOutcome, DeviceError> {
    let device_time = session.get_time().await?;
    let local_time = clock.now();
    let outdated = is_outdated(device_time, local_time, tolerance_minutes);
    debug!(ip = %session.device().ip, %device_time, %local_time, outdated, "device clock read");

    let written = session.set_time(local_time).await;

    if outdated {
        if let Err(e) = &written {
            warn!(ip = %session.device().ip, error = %e, "could not correct outdated clock");
        }
        let d = session.device();
        return Err(DeviceError::OutdatedTime {
            model: d.model_name.clone(),
            point: d.point.clone(),
            ip: d.ip.clone(),
            device_time,
            local_time,
            corrected: written.is_ok(),
        });
    }
    written?;
    Ok(TimeSyncOutcome {
        device_time,
        local_time,
    })
}

/// Fleet operation: synchronize device clocks.
pub struct TimeSync {
    clock: Arc<dyn Clock>,
    tolerance_minutes: i64,
}

impl TimeSync {
    pub fn new(clock: Arc<dyn Clock>, tolerance_minutes: i64) -> Self {
        Self {
            clock,
            tolerance_minutes,
        }
    }
}

#[async_trait]
impl DeviceOperation for TimeSync {
    type Output = TimeSyncOutcome;

    fn name(&self) -> &str {
        "time-sync"
    }

    async fn execute(&self, session: &mut DeviceSession) -> Result<TimeSyncOutcome, DeviceError> {
        check_and_correct(session, self.clock.as_ref(), self.tolerance_minutes).await
    }
}
