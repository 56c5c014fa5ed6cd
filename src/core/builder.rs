use std::sync::Arc;

use crate::{
    config::FleetConfig,
    device::{Clock, Connector, SystemClock},
    error::FleetError,
    events::Bus,
    storage::{AttendanceSink, DeviceRegistry, FileSink},
    subscribers::{Subscribe, SubscriberSet},
};

use super::fleet::Fleet;

/// Builder for a [`Fleet`] and its collaborators.
pub struct FleetBuilder {
    cfg: FleetConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<dyn DeviceRegistry>,
    sink: Option<Arc<dyn AttendanceSink>>,
    clock: Arc<dyn Clock>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl FleetBuilder {
    /// Creates a builder around the protocol layer and the device roster.
    pub fn new(cfg: FleetConfig, connector: Arc<dyn Connector>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            cfg,
            connector,
            registry,
            sink: None,
            clock: Arc::new(SystemClock),
            subscribers: Vec::new(),
        }
    }

    /// Sets where attendance records are written.
    ///
    /// Defaults to a [`FileSink`] rooted at the working directory.
    pub fn with_sink(mut self, sink: Arc<dyn AttendanceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the local clock used by time sync and file naming.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (connection attempts, device
    /// outcomes, fleet start/finish) through dedicated workers with bounded
    /// queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and starts the event fan-out.
    ///
    /// The fan-out tasks run on the current tokio runtime; without one this
    /// returns [`FleetError::NoRuntime`].
    pub fn build(self) -> Result<Fleet, FleetError> {
        self.cfg.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(FleetError::NoRuntime);
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let clock = Arc::clone(&self.clock);
        let sink = self.sink.unwrap_or_else(|| {
            Arc::new(FileSink::new(".").with_clock(clock)) as Arc<dyn AttendanceSink>
        });

        Ok(Fleet::new_internal(
            self.cfg,
            self.connector,
            self.registry,
            sink,
            self.clock,
            bus,
            subs,
        ))
    }
}
