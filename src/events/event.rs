//! # Runtime events emitted by the fleet runner and device sessions.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Fleet events**: a run starting, finishing or being cancelled
//! - **Connection events**: connect attempts, retries, timeouts, disconnects
//! - **Device outcome events**: the terminal result recorded for one device
//! - **Subscriber events**: overflow and panics inside event subscribers
//!
//! The [`Event`] struct carries the metadata: device IP, operation name,
//! attempt, delays and progress counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use clockfleet::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ConnectRetryScheduled)
//!     .with_device("10.0.0.7")
//!     .with_reason("connection refused")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.kind, EventKind::ConnectRetryScheduled);
//! assert_eq!(ev.device.as_deref(), Some("10.0.0.7"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Fleet events ===
    /// A fleet run was accepted and is about to schedule workers.
    ///
    /// Sets:
    /// - `operation`: operation name
    /// - `total`: number of devices in the run
    FleetStarted,

    /// Every worker of the run has been joined.
    ///
    /// Sets:
    /// - `operation`, `processed`, `total`
    FleetFinished,

    /// The fleet cancellation token fired; pending devices will not be scheduled.
    ///
    /// Sets:
    /// - `operation`
    FleetCancelled,

    // === Connection events ===
    /// A connect attempt is starting.
    ///
    /// Sets:
    /// - `device`, `attempt`
    DeviceConnecting,

    /// The session holds a live link.
    ///
    /// Sets:
    /// - `device`, `attempt`
    DeviceConnected,

    /// A connect attempt failed and another one is scheduled.
    ///
    /// Sets:
    /// - `device`, `attempt` (the failed one), `delay_ms`, `reason`
    ConnectRetryScheduled,

    /// A protocol call or connect attempt exceeded the per-call timeout.
    ///
    /// Sets:
    /// - `device`, `timeout_ms`, `reason` (call name)
    TimeoutHit,

    /// The session released its link.
    ///
    /// Sets:
    /// - `device`
    DeviceDisconnected,

    // === Device outcome events ===
    /// The operation succeeded for this device.
    ///
    /// Sets:
    /// - `device`, `operation`, `processed`, `total`
    DeviceSucceeded,

    /// The device could not be reached after all connect attempts.
    ///
    /// Sets:
    /// - `device`, `operation`, `reason`, `processed`, `total`
    DeviceConnectionFailed,

    /// The device was reached but the operation failed.
    ///
    /// Sets:
    /// - `device`, `operation`, `reason`, `processed`, `total`
    DeviceFailed,

    /// The device was never scheduled because the run was cancelled.
    ///
    /// Sets:
    /// - `device`, `operation`
    DeviceSkipped,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Device IP, if applicable.
    pub device: Option<Arc<str>>,
    /// Fleet operation name, if applicable.
    pub operation: Option<Arc<str>>,
    /// Subscriber name for subscriber events.
    pub subscriber: Option<&'static str>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Devices processed so far in the run.
    pub processed: Option<usize>,
    /// Devices in the run.
    pub total: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            device: None,
            operation: None,
            subscriber: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            processed: None,
            total: None,
        }
    }

    #[inline]
    pub fn with_device(mut self, ip: impl Into<Arc<str>>) -> Self {
        self.device = Some(ip.into());
        self
    }

    #[inline]
    pub fn with_operation(mut self, name: impl Into<Arc<str>>) -> Self {
        self.operation = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches progress counters.
    #[inline]
    pub fn with_progress(mut self, processed: usize, total: usize) -> Self {
        self.processed = Some(processed);
        self.total = Some(total);
        self
    }

    /// Attaches the device total only.
    #[inline]
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for the per-device terminal outcome kinds.
    #[inline]
    pub fn is_device_outcome(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DeviceSucceeded
                | EventKind::DeviceConnectionFailed
                | EventKind::DeviceFailed
                | EventKind::DeviceSkipped
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
