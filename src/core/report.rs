//! # Per-device outcomes and the fleet aggregate.
//!
//! A run produces exactly one [`OperationResult`] per input device, keyed by
//! IP inside a [`FleetReport`]. Partial failure is the normal case: a report
//! with unreachable devices is still a complete run.

use std::collections::HashMap;

use crate::error::DeviceError;

/// Terminal outcome of one device in one fleet run.
#[derive(Debug)]
pub enum OperationResult<T> {
    /// The operation completed and produced a payload.
    Success(T),
    /// The device could not be reached after every connect attempt.
    ConnectionFailed(DeviceError),
    /// The device was reached but the operation failed.
    OperationError(DeviceError),
    /// The run was cancelled before this device got a worker slot.
    Cancelled,
}

impl<T> OperationResult<T> {
    /// Classifies the result of a session scope.
    pub fn from_outcome(outcome: Result<T, DeviceError>) -> Self {
        match outcome {
            Ok(v) => OperationResult::Success(v),
            Err(e) if e.is_connection_failure() => OperationResult::ConnectionFailed(e),
            Err(e) => OperationResult::OperationError(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    /// "Connection failed" flag.
    pub fn connection_failed(&self) -> bool {
        matches!(self, OperationResult::ConnectionFailed(_))
    }

    /// "Battery failing" flag: reachable, but its clock could not be trusted.
    pub fn battery_failing(&self) -> bool {
        matches!(self, OperationResult::OperationError(e) if e.is_battery_failing())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationResult::Cancelled)
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            OperationResult::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DeviceError> {
        match self {
            OperationResult::ConnectionFailed(e) | OperationResult::OperationError(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationResult::Success(_) => "success",
            OperationResult::ConnectionFailed(_) => "connection_failed",
            OperationResult::OperationError(_) => "operation_error",
            OperationResult::Cancelled => "cancelled",
        }
    }
}

/// Aggregate of one fleet run, keyed by device IP.
#[derive(Debug)]
pub struct FleetReport<T> {
    operation: String,
    results: HashMap<String, OperationResult<T>>,
}

impl<T> FleetReport<T> {
    pub(crate) fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            results: HashMap::new(),
        }
    }

    /// Records the outcome for `ip`. The first entry for an IP wins.
    pub(crate) fn record(&mut self, ip: String, result: OperationResult<T>) -> bool {
        if self.results.contains_key(&ip) {
            return false;
        }
        self.results.insert(ip, result);
        true
    }

    /// Name of the operation that produced this report.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn get(&self, ip: &str) -> Option<&OperationResult<T>> {
        self.results.get(ip)
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.results.contains_key(ip)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationResult<T>)> {
        self.results.iter().map(|(ip, r)| (ip.as_str(), r))
    }

    /// Successful payloads keyed by IP.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.iter().filter_map(|(ip, r)| r.payload().map(|p| (ip, p)))
    }

    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    /// IPs whose entry is not a success, sorted.
    pub fn failed_ips(&self) -> Vec<String> {
        let mut ips: Vec<String> = self
            .results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(ip, _)| ip.clone())
            .collect();
        ips.sort();
        ips
    }

    /// IPs flagged "battery failing", sorted.
    pub fn battery_failing_ips(&self) -> Vec<String> {
        let mut ips: Vec<String> = self
            .results
            .iter()
            .filter(|(_, r)| r.battery_failing())
            .map(|(ip, _)| ip.clone())
            .collect();
        ips.sort();
        ips
    }

    pub fn into_results(self) -> HashMap<String, OperationResult<T>> {
        self.results
    }
}
