//! Devices, punches and the protocol seam.
//!
//! - [`Device`], [`Attendance`], [`RawAttendance`], [`DeviceInfo`] data model
//! - [`Connector`] / [`DeviceLink`] capability provided by the protocol layer
//! - [`Clock`] local time source

mod clock;
mod link;
mod model;

pub use clock::{Clock, FixedClock, SystemClock};
pub use link::{Connector, DeviceLink};
pub use model::{
    format_attendances, Attendance, AttendanceStatus, Communication, Device, DeviceInfo,
    RawAttendance, ATTENDANCE_TIME_FORMAT,
};
