//! # Fleet: entry point that wires collaborators to the operation managers.
//!
//! A [`Fleet`] owns the validated configuration, the protocol connector, the
//! device roster, the attendance sink and the event bus. It does not run
//! anything itself: each call to [`Fleet::time_sync`], [`Fleet::attendance`],
//! [`Fleet::restart`] or [`Fleet::probe`] hands out a manager with its own
//! [`FleetRunner`] and progress counters.
//!
//! ## Event flow
//! ```text
//! FleetRunner / DeviceSession ── publish ──► Bus ──► listener task ──► SubscriberSet
//!                                             │
//!                                             └──► Fleet::subscribe() receivers
//! ```
//!
//! The listener is started by [`FleetBuilder::build`](crate::FleetBuilder::build)
//! and aborted when the fleet is dropped.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use clockfleet::{Connector, Fleet, FleetConfig, FileRegistry, LogWriter, Subscribe};
//!
//! async fn nightly(connector: Arc<dyn Connector>) -> Result<(), clockfleet::FleetError> {
//!     let fleet = Fleet::builder(
//!         FleetConfig::load("clockfleet.toml")?,
//!         connector,
//!         Arc::new(FileRegistry::new("devices.txt")),
//!     )
//!     .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
//!     .build()?;
//!
//!     let run = fleet.attendance().run_all_active().await?;
//!     println!("{} records, retry {:?}", run.total_records(), run.report.failed_ips());
//!     if let Some(e) = &run.global_error {
//!         eprintln!("global file not written: {e}");
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::FleetConfig;
use crate::device::{Clock, Connector};
use crate::events::{Bus, Event};
use crate::managers::{AttendanceManager, ProbeManager, RestartManager, TimeSyncManager};
use crate::storage::{AttendanceSink, DeviceRegistry};
use crate::subscribers::SubscriberSet;

use super::builder::FleetBuilder;
use super::runner::FleetRunner;

/// Configured fleet of time clocks.
pub struct Fleet {
    cfg: Arc<FleetConfig>,
    connector: Arc<dyn Connector>,
    registry: Arc<dyn DeviceRegistry>,
    sink: Arc<dyn AttendanceSink>,
    clock: Arc<dyn Clock>,
    bus: Bus,
    force_clear: Arc<AtomicBool>,
    listener: JoinHandle<()>,
}

impl Fleet {
    /// Starts a [`FleetBuilder`].
    pub fn builder(
        cfg: FleetConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<dyn DeviceRegistry>,
    ) -> FleetBuilder {
        FleetBuilder::new(cfg, connector, registry)
    }

    pub(crate) fn new_internal(
        cfg: FleetConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<dyn DeviceRegistry>,
        sink: Arc<dyn AttendanceSink>,
        clock: Arc<dyn Clock>,
        bus: Bus,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        let listener = subscriber_listener(&bus, subs);
        let force_clear = Arc::new(AtomicBool::new(cfg.clearing_forced()));
        Self {
            cfg: Arc::new(cfg),
            connector,
            registry,
            sink,
            clock,
            bus,
            force_clear,
            listener,
        }
    }

    pub fn config(&self) -> &Arc<FleetConfig> {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<dyn DeviceRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<dyn AttendanceSink> {
        &self.sink
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Receives every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Arms or disarms the one-shot force clear for the next attendance run.
    pub fn set_force_clear(&self, force: bool) {
        self.force_clear.store(force, Ordering::SeqCst);
        info!(force, "force clear updated");
    }

    /// Whether the next attendance run clears regardless of formatting errors.
    pub fn force_clear_pending(&self) -> bool {
        self.force_clear.load(Ordering::SeqCst)
    }

    /// A bare runner for custom [`DeviceOperation`](crate::DeviceOperation)s.
    pub fn runner(&self) -> FleetRunner {
        FleetRunner::new(Arc::clone(&self.cfg), Arc::clone(&self.connector), self.bus.clone())
    }

    pub fn time_sync(&self) -> TimeSyncManager {
        TimeSyncManager::new(self)
    }

    pub fn attendance(&self) -> AttendanceManager {
        AttendanceManager::new(self, Arc::clone(&self.force_clear))
    }

    pub fn restart(&self) -> RestartManager {
        RestartManager::new(self)
    }

    pub fn probe(&self) -> ProbeManager {
        ProbeManager::new(self)
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
