use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{Fleet, FleetReport, OperationResult, Progress, SharedState};
use crate::error::FleetError;
use crate::operations::{TimeSync, TimeSyncOutcome};

use super::base::{persist_battery, ManagerBase};

/// Synchronizes device clocks and records battery health in the roster.
///
/// After the run every device that answered is written back: `battery_ok =
/// false` when its clock had drifted, `true` when it was within tolerance.
/// Unreachable devices keep their previous flag.
pub struct TimeSyncManager {
    base: ManagerBase,
    op: Arc<TimeSync>,
}

impl TimeSyncManager {
    pub(crate) fn new(fleet: &Fleet) -> Self {
        Self {
            base: ManagerBase::new(fleet),
            op: Arc::new(TimeSync::new(
                Arc::clone(fleet.clock()),
                fleet.config().time_tolerance_minutes,
            )),
        }
    }

    /// Sets the per-device progress callback.
    pub fn with_progress(mut self, cb: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.base.set_progress(Arc::new(cb));
        self
    }

    /// Token that stops devices still waiting for a worker slot.
    pub fn cancel_token(&self) -> CancellationToken {
        self.base.cancel_token()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        self.base.state()
    }

    /// Syncs the selected active devices.
    pub async fn run(&mut self, ips: &[String]) -> Result<FleetReport<TimeSyncOutcome>, FleetError> {
        self.run_on(Some(ips)).await
    }

    /// Syncs every active device.
    pub async fn run_all_active(&mut self) -> Result<FleetReport<TimeSyncOutcome>, FleetError> {
        self.run_on(None).await
    }

    async fn run_on(
        &mut self,
        selection: Option<&[String]>,
    ) -> Result<FleetReport<TimeSyncOutcome>, FleetError> {
        let report = self.base.run(selection, Arc::clone(&self.op)).await?;

        let updates = report
            .iter()
            .filter_map(|(ip, result)| match result {
                OperationResult::Success(_) => Some((ip.to_string(), true)),
                r if r.battery_failing() => Some((ip.to_string(), false)),
                _ => None,
            })
            .collect();
        persist_battery(self.base.registry().as_ref(), updates).await;
        Ok(report)
    }
}
