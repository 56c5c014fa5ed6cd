//! Runtime core: sessions, the fleet runner and its bookkeeping.
//!
//! - [`session`]: per-device connect → operate → disconnect lifecycle;
//! - [`runner`]: bounded-parallel execution of one operation over a fleet;
//! - [`state`]: progress counters shared by the workers of a run;
//! - [`report`]: per-device outcomes and the aggregate returned to callers;
//! - [`builder`]: assembles a [`Fleet`] from its collaborators;
//! - [`fleet`]: owns the collaborators and hands out operation managers.
//!
//! ```text
//!   Fleet ──► Manager ──► FleetRunner::run(devices, op)
//!                              │
//!                  ┌───────────┼───────────┐   (≤ pool_size at once)
//!                  ▼           ▼           ▼
//!             worker(A)    worker(B)    worker(C)
//!             DeviceSession::with_connection(op.execute)
//!                  │           │           │
//!                  └─── join loop: report + SharedState + progress ───► FleetReport
//! ```

use std::any::Any;

pub(crate) mod builder;
pub(crate) mod fleet;
pub(crate) mod report;
pub(crate) mod runner;
pub(crate) mod session;
pub(crate) mod state;

pub use builder::FleetBuilder;
pub use fleet::Fleet;
pub use report::{FleetReport, OperationResult};
pub use runner::{FleetRunner, Progress, ProgressCallback};
pub use session::{DeviceSession, SessionState};
pub use state::{ProgressSnapshot, SharedState};

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
