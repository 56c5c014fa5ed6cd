//! Device selection and run plumbing shared by the managers.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{Fleet, FleetReport, FleetRunner, ProgressCallback, SharedState};
use crate::device::Device;
use crate::error::FleetError;
use crate::operations::DeviceOperation;
use crate::storage::DeviceRegistry;

/// Picks the active devices named by `selection`.
///
/// Repeated IPs collapse to one device; IPs that are unknown or inactive are
/// logged and skipped.
pub(crate) fn select_active(active: Vec<Device>, selection: &[String]) -> Vec<Device> {
    let wanted: HashSet<&str> = selection.iter().map(String::as_str).collect();
    let known: HashSet<&str> = active.iter().map(|d| d.ip.as_str()).collect();
    for ip in wanted.iter().filter(|ip| !known.contains(*ip)) {
        warn!(ip = %ip, "selected device is unknown or inactive, skipping");
    }

    let mut seen = HashSet::with_capacity(wanted.len());
    active
        .into_iter()
        .filter(|d| wanted.contains(d.ip.as_str()) && seen.insert(d.ip.clone()))
        .collect()
}

/// Keeps the first roster entry per IP.
fn dedup(devices: Vec<Device>) -> Vec<Device> {
    let mut seen = HashSet::with_capacity(devices.len());
    devices
        .into_iter()
        .filter(|d| {
            let fresh = seen.insert(d.ip.clone());
            if !fresh {
                warn!(ip = %d.ip, "device listed twice in the roster, keeping the first entry");
            }
            fresh
        })
        .collect()
}

/// Runner, roster, progress and cancellation owned by one manager.
pub(crate) struct ManagerBase {
    runner: FleetRunner,
    registry: Arc<dyn DeviceRegistry>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl ManagerBase {
    pub(crate) fn new(fleet: &Fleet) -> Self {
        Self {
            runner: fleet.runner(),
            registry: Arc::clone(fleet.registry()),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<dyn DeviceRegistry> {
        &self.registry
    }

    pub(crate) fn state(&self) -> &Arc<SharedState> {
        self.runner.state()
    }

    pub(crate) fn set_progress(&mut self, cb: ProgressCallback) {
        self.progress = Some(cb);
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `op` on the active devices, restricted to `selection` when given.
    pub(crate) async fn run<O: DeviceOperation>(
        &mut self,
        selection: Option<&[String]>,
        op: Arc<O>,
    ) -> Result<FleetReport<O::Output>, FleetError> {
        let active = dedup(self.registry.list_active_devices().await?);
        let devices = match selection {
            Some(ips) => select_active(active, ips),
            None => active,
        };
        debug!(operation = op.name(), devices = devices.len(), "devices selected");

        self.runner
            .run(devices, op, self.progress.clone(), &self.cancel)
            .await
    }
}

/// Writes battery flags back to the roster. Failures are logged per device.
pub(crate) async fn persist_battery(registry: &dyn DeviceRegistry, updates: Vec<(String, bool)>) {
    for (ip, ok) in updates {
        match registry.update_battery_status(&ip, ok).await {
            Ok(()) if !ok => warn!(ip = %ip, "device marked as battery failing"),
            Ok(()) => {}
            Err(e) => warn!(ip = %ip, error = %e, "battery status not saved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Device> {
        vec![
            Device::new("10.0.0.1", "MB160", "A"),
            Device::new("10.0.0.3", "MB160", "C"),
        ]
    }

    #[test]
    fn test_selection_dedups_and_skips_unknown() {
        let picked = select_active(
            roster(),
            &["10.0.0.3".into(), "10.0.0.3".into(), "10.0.0.9".into()],
        );
        let ips: Vec<_> = picked.iter().map(|d| d.ip.as_str()).collect();
        assert_eq!(ips, vec!["10.0.0.3"]);
    }

    #[test]
    fn test_roster_duplicates_collapse() {
        let mut devices = roster();
        devices.push(Device::new("10.0.0.1", "iClock", "A2"));
        let kept = dedup(devices);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].point, "A");
    }
}
