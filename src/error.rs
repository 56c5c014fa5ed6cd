//! Error types used by the fleet runtime, device sessions and collaborators.
//!
//! The split mirrors the failure-isolation contract of a fleet run:
//!
//! - [`FleetError`]: misconfiguration or programmer errors; the only kind that
//!   may escape [`FleetRunner::run`](crate::FleetRunner::run).
//! - [`DeviceError`]: everything that can go wrong for one device. These are
//!   caught at the worker boundary and turned into
//!   [`OperationResult`](crate::OperationResult) entries.
//! - [`LinkError`]: failures reported by the protocol layer.
//! - [`RetryExhausted`]: a retried operation ran out of attempts.
//! - [`RegistryError`], [`SinkError`]: roster and attendance storage failures.
//!
//! Every enum provides `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` helpers.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Code attached to unclassified device failures (including caught panics).
pub const UNCLASSIFIED_ERROR_CODE: u32 = 3000;

/// # Errors produced by the fleet runtime itself.
///
/// These never describe a single device's failure; partial device failure is
/// reported through the aggregate, not through this type.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FleetError {
    /// A configuration value is out of range.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("config read error for {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The same device IP was supplied twice to one run.
    #[error("device {ip} listed more than once in a single fleet run")]
    DuplicateDevice {
        /// Duplicated IP.
        ip: String,
    },

    /// The device roster could not be loaded.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A fleet was built outside a tokio runtime.
    #[error("fleet must be built inside a tokio runtime")]
    NoRuntime,
}

impl FleetError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use clockfleet::FleetError;
    ///
    /// let err = FleetError::DuplicateDevice { ip: "10.0.0.1".into() };
    /// assert_eq!(err.as_label(), "fleet_duplicate_device");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FleetError::InvalidConfig { .. } => "fleet_invalid_config",
            FleetError::ConfigParse(_) => "fleet_config_parse",
            FleetError::ConfigRead { .. } => "fleet_config_read",
            FleetError::DuplicateDevice { .. } => "fleet_duplicate_device",
            FleetError::Registry(_) => "fleet_registry",
            FleetError::NoRuntime => "fleet_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors raised by the protocol layer for one call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Transport-level failure (refused, reset, unreachable).
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete within the configured timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The device answered with something the protocol layer could not use.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device firmware does not support the requested command.
    #[error("unsupported command: {0}")]
    Unsupported(&'static str),
}

impl LinkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LinkError::Network(_) => "link_network",
            LinkError::Timeout { .. } => "link_timeout",
            LinkError::Protocol(_) => "link_protocol",
            LinkError::Unsupported(_) => "link_unsupported",
        }
    }

    /// Indicates whether another attempt could plausibly succeed.
    ///
    /// # Example
    /// ```
    /// use clockfleet::LinkError;
    ///
    /// assert!(LinkError::Network("refused".into()).is_retryable());
    /// assert!(!LinkError::Unsupported("restart").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::Network(_) | LinkError::Timeout { .. })
    }
}

/// # A retried operation failed on every attempt.
///
/// Wraps the error of the last attempt.
#[derive(Error, Debug)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct RetryExhausted<E> {
    /// How many times the operation was invoked.
    pub attempts: u32,
    /// Error returned by the final attempt.
    pub last: E,
}

/// # Errors produced while operating on a single device.
///
/// None of these cross the worker boundary of a fleet run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Connecting failed on every allowed attempt.
    #[error("connection failed: {model} at {point} ({ip}) after {attempts} attempt(s): {reason}")]
    ConnectionFailed {
        model: String,
        point: String,
        ip: String,
        attempts: u32,
        reason: String,
    },

    /// Device clock drifted beyond tolerance; the backup battery is suspect.
    #[error(
        "outdated time on {model} at {point} ({ip}): device={device_time} local={local_time} corrected={corrected}"
    )]
    OutdatedTime {
        model: String,
        point: String,
        ip: String,
        device_time: NaiveDateTime,
        local_time: NaiveDateTime,
        /// Whether writing the local time back to the device succeeded.
        corrected: bool,
    },

    /// Fetched record count never matched the device-reported count.
    #[error("attendance count mismatch on {ip}: device reports {expected}, fetched {fetched}")]
    ObtainAttendances {
        ip: String,
        expected: usize,
        fetched: usize,
    },

    /// A protocol call failed while connected.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// A protocol call was attempted on a session that holds no link.
    #[error("session for {ip} is not connected")]
    NotConnected { ip: String },

    /// Writing fetched records failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Unclassified failure, carrying a numeric code.
    #[error("error {code}: {message}")]
    Base { code: u32, message: String },
}

impl DeviceError {
    /// Wraps an arbitrary message as an unclassified error.
    pub fn unclassified(message: impl Into<String>) -> Self {
        DeviceError::Base {
            code: UNCLASSIFIED_ERROR_CODE,
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeviceError::ConnectionFailed { .. } => "device_connection_failed",
            DeviceError::OutdatedTime { .. } => "device_outdated_time",
            DeviceError::ObtainAttendances { .. } => "device_obtain_attendances",
            DeviceError::Link(_) => "device_link",
            DeviceError::NotConnected { .. } => "device_not_connected",
            DeviceError::Sink(_) => "device_sink",
            DeviceError::Base { .. } => "device_unclassified",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True when the device could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, DeviceError::ConnectionFailed { .. })
    }

    /// True when the device was reachable but its clock could not be trusted.
    pub fn is_battery_failing(&self) -> bool {
        matches!(self, DeviceError::OutdatedTime { .. })
    }
}

/// # Errors raised by a [`DeviceRegistry`](crate::DeviceRegistry).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("roster io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A roster line does not have the expected shape.
    #[error("malformed roster line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// No roster entry has this IP.
    #[error("unknown device {ip}")]
    UnknownDevice { ip: String },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Io { .. } => "registry_io",
            RegistryError::Malformed { .. } => "registry_malformed",
            RegistryError::UnknownDevice { .. } => "registry_unknown_device",
        }
    }
}

/// # Errors raised by an [`AttendanceSink`](crate::AttendanceSink).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("attendance write failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_classification() {
        let err = DeviceError::ConnectionFailed {
            model: "MB160".into(),
            point: "Gate".into(),
            ip: "10.0.0.7".into(),
            attempts: 3,
            reason: "refused".into(),
        };
        assert!(err.is_connection_failure());
        assert!(!err.is_battery_failing());
        assert_eq!(err.as_label(), "device_connection_failed");
    }

    #[test]
    fn test_unclassified_uses_base_code() {
        match DeviceError::unclassified("boom") {
            DeviceError::Base { code, message } => {
                assert_eq!(code, UNCLASSIFIED_ERROR_CODE);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_retry_exhausted_message_wraps_last_error() {
        let err = RetryExhausted {
            attempts: 3,
            last: LinkError::Network("refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempt(s): network error: refused"
        );
    }
}
