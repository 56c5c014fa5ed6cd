use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{Fleet, FleetReport, Progress, SharedState};
use crate::device::DeviceInfo;
use crate::error::FleetError;
use crate::operations::Probe;

use super::base::ManagerBase;

/// Checks reachability and collects device information.
///
/// Unreachable devices appear in the report as connection failures.
pub struct ProbeManager {
    base: ManagerBase,
}

impl ProbeManager {
    pub(crate) fn new(fleet: &Fleet) -> Self {
        Self {
            base: ManagerBase::new(fleet),
        }
    }

    /// Sets the per-device progress callback.
    pub fn with_progress(mut self, cb: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.base.set_progress(Arc::new(cb));
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.base.cancel_token()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        self.base.state()
    }

    pub async fn run(&mut self, ips: &[String]) -> Result<FleetReport<DeviceInfo>, FleetError> {
        self.base.run(Some(ips), Arc::new(Probe)).await
    }

    pub async fn run_all_active(&mut self) -> Result<FleetReport<DeviceInfo>, FleetError> {
        self.base.run(None, Arc::new(Probe)).await
    }
}
