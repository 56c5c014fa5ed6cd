//! # Event subscribers.
//!
//! ```text
//!   FleetRunner / DeviceSession ── publish(Event) ──► Bus ──► listener
//!                                                               │
//!                                                         SubscriberSet
//!                                                    ┌──────────┼──────────┐
//!                                                    ▼          ▼          ▼
//!                                                LogWriter   Custom ...  Custom ...
//! ```
//!
//! - [`Subscribe`] trait for custom handlers
//! - [`SubscriberSet`] per-subscriber queues and workers
//! - [`LogWriter`] built-in subscriber that logs through `tracing`

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
