//! # Fleet configuration.
//!
//! [`FleetConfig`] centralizes every knob the orchestrator consumes. It is
//! passed into [`FleetBuilder`](crate::FleetBuilder) once; nothing reads
//! configuration from global state.
//!
//! ## Sources
//! - `FleetConfig::default()`
//! - `FleetConfig::from_toml_str(..)` / `FleetConfig::load(path)`; missing keys
//!   fall back to the defaults.
//!
//! ## Sentinel values
//! - `timeout_secs = 0` → no per-call timeout
//!
//! ## Example
//! ```rust
//! use clockfleet::FleetConfig;
//!
//! let cfg = FleetConfig::from_toml_str(r#"
//!     retry_connection = 5
//!     pool_size = 16
//!     clear_attendance = true
//! "#).unwrap();
//!
//! assert_eq!(cfg.retry_connection, 5);
//! assert_eq!(cfg.port, 4370);
//! assert!(cfg.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::FleetError;
use crate::policies::{BackoffPolicy, JitterPolicy, RetryPolicy};

/// Default device port of the clock protocol.
pub const DEFAULT_PORT: u16 = 4370;

/// Configuration consumed by the fleet runtime and the operation managers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Device port.
    pub port: u16,

    /// Maximum connection attempts per device (`>= 1`).
    pub retry_connection: u32,

    /// Maximum number of devices processed concurrently (`>= 1`).
    ///
    /// Bounds simultaneously open device connections.
    pub pool_size: usize,

    /// Per network call timeout in seconds (`0` = none).
    pub timeout_secs: u64,

    /// Delay after the first failed connection attempt, in milliseconds.
    pub retry_delay_ms: u64,

    /// Growth factor for consecutive retry delays.
    pub retry_backoff_factor: f64,

    /// Upper bound for retry delays, in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Randomization applied to retry delays.
    pub retry_jitter: JitterPolicy,

    /// Clear on-device attendance storage after a clean fetch.
    pub clear_attendance: bool,

    /// Clear even when some records failed to format. One-shot: the
    /// attendance manager resets it after a run.
    pub force_clear_attendance: bool,

    /// Re-fetches allowed when the fetched count differs from the
    /// device-reported record count.
    pub attendance_fetch_retries: u32,

    /// Check (and correct) the device clock after fetching attendance.
    pub sync_time_after_fetch: bool,

    /// Minute skew at which a device clock is considered outdated.
    pub time_tolerance_minutes: i64,

    /// Capacity of the event bus ring buffer (clamped to at least 1).
    pub bus_capacity: usize,
}

impl Default for FleetConfig {
    /// Default configuration:
    ///
    /// - `port = 4370`, `retry_connection = 3`, `timeout_secs = 15`
    /// - `pool_size` = number of CPUs
    /// - 1s constant retry delay, no jitter
    /// - no clearing, 3 fetch re-tries, time check after fetch
    /// - 5 minute clock tolerance, bus capacity 1024
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            retry_connection: 3,
            pool_size: num_cpus::get().max(1),
            timeout_secs: 15,
            retry_delay_ms: 1_000,
            retry_backoff_factor: 1.0,
            retry_max_delay_ms: 10_000,
            retry_jitter: JitterPolicy::None,
            clear_attendance: false,
            force_clear_attendance: false,
            attendance_fetch_retries: 3,
            sync_time_after_fetch: true,
            time_tolerance_minutes: 5,
            bus_capacity: 1024,
        }
    }
}

impl FleetConfig {
    /// Parses a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, FleetError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FleetError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FleetError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Rejects values that would make a fleet run meaningless.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.pool_size == 0 {
            return Err(FleetError::InvalidConfig {
                field: "pool_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.retry_connection == 0 {
            return Err(FleetError::InvalidConfig {
                field: "retry_connection",
                reason: "must be at least 1".into(),
            });
        }
        if !self.retry_backoff_factor.is_finite() || self.retry_backoff_factor < 0.0 {
            return Err(FleetError::InvalidConfig {
                field: "retry_backoff_factor",
                reason: format!("{} is not a usable factor", self.retry_backoff_factor),
            });
        }
        if self.time_tolerance_minutes < 1 {
            return Err(FleetError::InvalidConfig {
                field: "time_tolerance_minutes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Per-call timeout as an `Option`.
    ///
    /// - `None` → calls may block until the protocol layer gives up
    /// - `Some(d)` → every connect attempt and protocol call is bounded by `d`
    #[inline]
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    /// Backoff between connection attempts.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(self.retry_delay_ms),
            max: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_delay_ms)),
            factor: self.retry_backoff_factor,
            jitter: self.retry_jitter,
        }
    }

    /// Retry policy used around the connect primitive.
    pub fn connect_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_connection, self.backoff())
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Whether clearing proceeds regardless of formatting errors.
    #[inline]
    pub fn clearing_forced(&self) -> bool {
        self.force_clear_attendance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = FleetConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.call_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(cfg.connect_retry().max_attempts(), 3);
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let cfg = FleetConfig {
            pool_size: 0,
            ..FleetConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "fleet_invalid_config");
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn test_tolerance_below_one_minute_rejected() {
        for minutes in [0, -3] {
            let cfg = FleetConfig {
                time_tolerance_minutes: minutes,
                ..FleetConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("time_tolerance_minutes"));
        }
        let one = FleetConfig {
            time_tolerance_minutes: 1,
            ..FleetConfig::default()
        };
        assert!(one.validate().is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let cfg = FleetConfig {
            retry_connection: 0,
            ..FleetConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let cfg = FleetConfig {
            timeout_secs: 0,
            ..FleetConfig::default()
        };
        assert_eq!(cfg.call_timeout(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = FleetConfig::from_toml_str(
            r#"
            pool_size = 4
            force_clear_attendance = true
            retry_jitter = "full"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pool_size, 4);
        assert!(cfg.clearing_forced());
        assert_eq!(cfg.retry_jitter, JitterPolicy::Full);
        assert_eq!(cfg.retry_connection, 3);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = FleetConfig::from_toml_str("pool_size = \"many\"").unwrap_err();
        assert_eq!(err.as_label(), "fleet_config_parse");
    }

    #[test]
    fn test_backoff_max_never_below_first() {
        let cfg = FleetConfig {
            retry_delay_ms: 2_000,
            retry_max_delay_ms: 500,
            ..FleetConfig::default()
        };
        assert_eq!(cfg.backoff().next(0), Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, "retry_connection = 7\n").unwrap();
        let cfg = FleetConfig::load(&path).unwrap();
        assert_eq!(cfg.retry_connection, 7);
    }
}
