//! # Protocol-layer capability.
//!
//! The binary clock protocol is not implemented here. The orchestrator only
//! needs two seams:
//!
//! - [`Connector`] opens a connection to `ip:port` over a given transport;
//! - [`DeviceLink`] is the live connection, owned by exactly one
//!   [`DeviceSession`](crate::DeviceSession) at a time.
//!
//! Every call is fallible with [`LinkError`]. Implementations should not
//! retry internally; retries and timeouts are applied by the session.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::device::model::{Communication, DeviceInfo, RawAttendance};
use crate::error::LinkError;

/// Live connection to one device.
#[async_trait]
pub trait DeviceLink: Send + 'static {
    /// Closes the connection. Called at most once per link by the session.
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Reads the device clock.
    async fn get_time(&mut self) -> Result<NaiveDateTime, LinkError>;

    /// Writes the device clock.
    async fn set_time(&mut self, time: NaiveDateTime) -> Result<(), LinkError>;

    /// Downloads every stored attendance record.
    async fn get_attendance(&mut self) -> Result<Vec<RawAttendance>, LinkError>;

    /// Number of attendance records the device reports holding.
    async fn record_count(&mut self) -> Result<usize, LinkError>;

    /// Deletes stored attendance records.
    async fn clear_attendance(&mut self) -> Result<(), LinkError>;

    /// Reboots the device. The link is unusable afterwards.
    async fn restart(&mut self) -> Result<(), LinkError>;

    /// Liveness check over the open connection.
    async fn ping(&mut self) -> Result<bool, LinkError>;

    /// Serial number, platform and firmware version.
    async fn device_info(&mut self) -> Result<DeviceInfo, LinkError>;

    /// Model name as reported by the device.
    async fn device_name(&mut self) -> Result<String, LinkError>;
}

/// Opens [`DeviceLink`]s.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        ip: &str,
        port: u16,
        transport: Communication,
    ) -> Result<Box<dyn DeviceLink>, LinkError>;
}
