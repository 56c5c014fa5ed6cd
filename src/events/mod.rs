//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `FleetRunner` (fleet and outcome events), `DeviceSession`
//!   (connection events), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the fan-out listener spawned by `Fleet`, which forwards
//!   every event to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
