//! Retry policies.
//!
//! This module groups the knobs that control **how often** a device call is
//! retried and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]   bounded attempts around one fallible async call
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization to avoid synchronized reconnect storms
//!
//! ## Quick wiring
//! ```text
//! FleetConfig { retry_connection, retry_delay_ms, retry_backoff_factor, ... }
//!      └─► RetryPolicy::new(retry_connection, BackoffPolicy{..})
//!           └─► DeviceSession::connect() retries the connector with it
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 3 attempts.
//! - `BackoffPolicy::default()` → 1s constant, no jitter.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryAttempt, RetryPolicy};
