//! # LogWriter: renders fleet events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO fleet started operation="attendance" total=12
//! WARN connect retry scheduled ip="10.0.0.7" attempt=1 delay_ms=1000 reason="network error: refused"
//! INFO device done ip="10.0.0.3" operation="attendance" processed=1 total=12
//! WARN device unreachable ip="10.0.0.7" operation="attendance" processed=2 total=12
//! INFO fleet finished operation="attendance" processed=12 total=12
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let ip = e.device.as_deref().unwrap_or("-");
        let op = e.operation.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::FleetStarted => {
                info!(operation = op, total = e.total, "fleet started");
            }
            EventKind::FleetFinished => {
                info!(operation = op, processed = e.processed, total = e.total, "fleet finished");
            }
            EventKind::FleetCancelled => {
                warn!(operation = op, "fleet cancelled");
            }
            EventKind::DeviceConnecting => {
                debug!(ip, attempt = e.attempt, "connecting");
            }
            EventKind::DeviceConnected => {
                debug!(ip, attempt = e.attempt, "connected");
            }
            EventKind::ConnectRetryScheduled => {
                warn!(ip, attempt = e.attempt, delay_ms = e.delay_ms, reason, "connect retry scheduled");
            }
            EventKind::TimeoutHit => {
                warn!(ip, timeout_ms = e.timeout_ms, call = reason, "timeout");
            }
            EventKind::DeviceDisconnected => {
                debug!(ip, "disconnected");
            }
            EventKind::DeviceSucceeded => {
                info!(ip, operation = op, processed = e.processed, total = e.total, "device done");
            }
            EventKind::DeviceConnectionFailed => {
                warn!(ip, operation = op, processed = e.processed, total = e.total, reason, "device unreachable");
            }
            EventKind::DeviceFailed => {
                warn!(ip, operation = op, processed = e.processed, total = e.total, reason, "device failed");
            }
            EventKind::DeviceSkipped => {
                debug!(ip, operation = op, "device skipped");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = e.subscriber, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = e.subscriber, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
