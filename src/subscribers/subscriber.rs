//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! (progress bars, audit logs, metrics) into a fleet.
//!
//! Each subscriber gets:
//! - a dedicated worker task,
//! - a bounded queue (capacity via [`Subscribe::queue_capacity`]),
//! - panic isolation (panics are reported as `EventKind::SubscriberPanicked`).
//!
//! ## Overflow behavior
//! When the queue is full the new event is dropped for this subscriber only and
//! `EventKind::SubscriberOverflow` is published. Other subscribers are unaffected.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use clockfleet::{Subscribe, Event, EventKind};
//!
//! struct Unreachable;
//!
//! #[async_trait]
//! impl Subscribe for Unreachable {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::DeviceConnectionFailed) {
//!             // notify someone about ev.device
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "unreachable" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for fleet observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity, clamped to at least 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
