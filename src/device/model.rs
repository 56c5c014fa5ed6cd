//! # Device and attendance data model.
//!
//! - [`Device`]: one roster entry, keyed by IP
//! - [`RawAttendance`]: a punch as handed over by the protocol layer
//! - [`Attendance`]: a validated, formatted punch ready for the sinks
//! - [`DeviceInfo`]: extended information gathered by the probe

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Timestamp format used in attendance files (`21/07/2023 05:28`).
pub const ATTENDANCE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Transport used to talk to a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Communication {
    #[default]
    Tcp,
    Udp,
}

impl FromStr for Communication {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Communication::Tcp),
            "udp" => Ok(Communication::Udp),
            other => Err(format!("unknown communication `{other}`")),
        }
    }
}

impl fmt::Display for Communication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Communication::Tcp => f.write_str("TCP"),
            Communication::Udp => f.write_str("UDP"),
        }
    }
}

/// One networked time clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Unique key within a fleet run.
    pub ip: String,
    /// May be refreshed from the device after connecting.
    pub model_name: String,
    /// Punch point (site/door) the clock is installed at.
    pub point: String,
    pub district: String,
    /// Identifier written into every attendance line.
    pub id: String,
    pub communication: Communication,
    /// Cleared when the clock drifts beyond tolerance.
    pub battery_ok: bool,
    pub active: bool,
}

impl Device {
    /// Creates an active TCP device with a healthy battery.
    pub fn new(ip: impl Into<String>, model_name: impl Into<String>, point: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            model_name: model_name.into(),
            point: point.into(),
            district: String::new(),
            id: String::new(),
            communication: Communication::Tcp,
            battery_ok: true,
            active: true,
        }
    }

    /// Sets the district.
    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = district.into();
        self
    }

    /// Sets the device id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the transport.
    pub fn with_communication(mut self, communication: Communication) -> Self {
        self.communication = communication;
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Punch kind as encoded by the device firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AttendanceStatus {
    CheckIn,
    CheckOut,
    BreakOut,
    BreakIn,
    OvertimeIn,
    OvertimeOut,
    Other(u8),
}

impl AttendanceStatus {
    /// Numeric code written to attendance files.
    pub fn code(&self) -> u8 {
        match self {
            AttendanceStatus::CheckIn => 0,
            AttendanceStatus::CheckOut => 1,
            AttendanceStatus::BreakOut => 2,
            AttendanceStatus::BreakIn => 3,
            AttendanceStatus::OvertimeIn => 4,
            AttendanceStatus::OvertimeOut => 5,
            AttendanceStatus::Other(c) => *c,
        }
    }
}

impl From<u8> for AttendanceStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => AttendanceStatus::CheckIn,
            1 => AttendanceStatus::CheckOut,
            2 => AttendanceStatus::BreakOut,
            3 => AttendanceStatus::BreakIn,
            4 => AttendanceStatus::OvertimeIn,
            5 => AttendanceStatus::OvertimeOut,
            c => AttendanceStatus::Other(c),
        }
    }
}

/// A punch exactly as returned by the protocol layer.
///
/// `timestamp` is `None` when the device returned a date that could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAttendance {
    pub user_id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub status: u8,
}

/// A validated punch tagged with the id of the device that recorded it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attendance {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub device_id: String,
    pub status: AttendanceStatus,
}

impl Attendance {
    /// Validates a raw record. Returns `None` for records that cannot be written.
    pub fn from_raw(raw: &RawAttendance, device_id: &str) -> Option<Self> {
        let user_id = raw.user_id.trim();
        if user_id.is_empty() {
            return None;
        }
        Some(Self {
            user_id: user_id.to_string(),
            timestamp: raw.timestamp?,
            device_id: device_id.to_string(),
            status: AttendanceStatus::from(raw.status),
        })
    }

    /// `"{user_id} {dd/mm/YYYY HH:MM} {device_id} {status}"`
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.user_id,
            self.timestamp.format(ATTENDANCE_TIME_FORMAT),
            self.device_id,
            self.status.code()
        )
    }
}

/// Splits raw records into formatted attendances and records that failed to format.
pub fn format_attendances(
    raw: &[RawAttendance],
    device_id: &str,
) -> (Vec<Attendance>, Vec<RawAttendance>) {
    let mut ok = Vec::with_capacity(raw.len());
    let mut bad = Vec::new();
    for r in raw {
        match Attendance::from_raw(r, device_id) {
            Some(a) => ok.push(a),
            None => bad.push(r.clone()),
        }
    }
    (ok, bad)
}

/// Extended device information gathered by the probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub platform: String,
    pub firmware_version: String,
    /// Records currently stored on the device, when known.
    pub attendance_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_line_format() {
        let a = Attendance {
            user_id: "1042".into(),
            timestamp: at(5, 28),
            device_id: "17".into(),
            status: AttendanceStatus::CheckOut,
        };
        assert_eq!(a.to_line(), "1042 21/07/2023 05:28 17 1");
    }

    #[test]
    fn test_format_splits_bad_records() {
        let raw = vec![
            RawAttendance { user_id: "1".into(), timestamp: Some(at(8, 0)), status: 0 },
            RawAttendance { user_id: "2".into(), timestamp: None, status: 0 },
            RawAttendance { user_id: "  ".into(), timestamp: Some(at(9, 0)), status: 1 },
        ];
        let (ok, bad) = format_attendances(&raw, "D1");
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].device_id, "D1");
        assert_eq!(bad.len(), 2);
    }

    #[test]
    fn test_status_roundtrips_unknown_codes() {
        assert_eq!(AttendanceStatus::from(15), AttendanceStatus::Other(15));
        assert_eq!(AttendanceStatus::from(15).code(), 15);
        assert_eq!(AttendanceStatus::from(4), AttendanceStatus::OvertimeIn);
    }

    #[test]
    fn test_communication_parse_is_case_insensitive() {
        assert_eq!("udp".parse::<Communication>().unwrap(), Communication::Udp);
        assert_eq!(" TCP ".parse::<Communication>().unwrap(), Communication::Tcp);
        assert!("serial".parse::<Communication>().is_err());
    }
}
