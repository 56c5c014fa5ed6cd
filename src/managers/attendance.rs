use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::FleetConfig;
use crate::core::{Fleet, FleetReport, Progress, SharedState};
use crate::device::Clock;
use crate::error::{FleetError, SinkError};
use crate::operations::{AttendanceFetch, AttendanceOutcome};
use crate::storage::{AttendanceSink, SinkTarget};

use super::base::{persist_battery, ManagerBase};

/// Outcome of one attendance run.
///
/// The report is always returned once devices were processed; a failed write
/// of the global file is carried next to it, since device storage may
/// already have been cleared.
#[derive(Debug)]
pub struct AttendanceRun {
    /// Per-device outcomes.
    pub report: FleetReport<AttendanceOutcome>,
    /// Set when the global attendance file could not be written.
    pub global_error: Option<SinkError>,
}

impl AttendanceRun {
    /// Records fetched across every successful device.
    pub fn total_records(&self) -> usize {
        self.report.total_records()
    }

    /// Whether every fetched record also reached the global file.
    pub fn global_written(&self) -> bool {
        self.global_error.is_none()
    }
}

/// Downloads attendance from the fleet.
///
/// Per-device files are written by the workers. After the run the manager:
/// 1. appends every fetched record to the global file in one call,
/// 2. writes battery flags back when the post-fetch clock check is enabled,
/// 3. disarms the fleet's one-shot force clear if it was used.
pub struct AttendanceManager {
    base: ManagerBase,
    cfg: Arc<FleetConfig>,
    sink: Arc<dyn AttendanceSink>,
    clock: Arc<dyn Clock>,
    force_clear: Arc<AtomicBool>,
}

impl AttendanceManager {
    pub(crate) fn new(fleet: &Fleet, force_clear: Arc<AtomicBool>) -> Self {
        Self {
            base: ManagerBase::new(fleet),
            cfg: Arc::clone(fleet.config()),
            sink: Arc::clone(fleet.sink()),
            clock: Arc::clone(fleet.clock()),
            force_clear,
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

    /// Fetches from the selected active devices.
    pub async fn run(&mut self, ips: &[String]) -> Result<AttendanceRun, FleetError> {
        self.run_on(Some(ips)).await
    }

    /// Fetches from every active device.
    pub async fn run_all_active(&mut self) -> Result<AttendanceRun, FleetError> {
        self.run_on(None).await
    }

    async fn run_on(
        &mut self,
        selection: Option<&[String]>,
    ) -> Result<AttendanceRun, FleetError> {
        let forced = self.force_clear.load(Ordering::SeqCst);
        let op = AttendanceFetch::new(Arc::clone(&self.sink), Arc::clone(&self.clock), &self.cfg)
            .with_force_clear(forced);
        let report = self.base.run(selection, Arc::new(op)).await?;

        if forced {
            self.force_clear.store(false, Ordering::SeqCst);
            info!("force clear used, back to conditional clearing");
        }

        if self.cfg.sync_time_after_fetch {
            let updates = report
                .successes()
                .filter_map(|(ip, out)| out.battery_ok.map(|ok| (ip.to_string(), ok)))
                .collect();
            persist_battery(self.base.registry().as_ref(), updates).await;
        }

        let all: Vec<_> = report
            .successes()
            .flat_map(|(_, out)| out.records.iter().cloned())
            .collect();
        let mut global_error = None;
        if !all.is_empty() {
            if let Err(e) = self.sink.append(&all, SinkTarget::Global).await {
                error!(error = %e, records = all.len(), "global attendance file not written");
                global_error = Some(e);
            }
        }
        info!(
            devices = report.success_count(),
            records = report.total_records(),
            "attendance collected"
        );
        Ok(AttendanceRun {
            report,
            global_error,
        })
    }
}
