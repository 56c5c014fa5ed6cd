//! # Fleet operation runner.
//!
//! [`FleetRunner::run`] applies one [`DeviceOperation`] to a list of devices
//! with bounded parallelism and returns a [`FleetReport`] with exactly one
//! entry per device.
//!
//! ## Flow
//! ```text
//! run(devices, op)
//!   ├─► reject duplicate IPs (FleetError::DuplicateDevice)
//!   ├─► SharedState::reset(total), publish FleetStarted
//!   ├─► spawn one worker per device into a JoinSet
//!   │     worker:
//!   │       ├─► select! { cancel → Cancelled, permit (pool_size) → continue }
//!   │       ├─► DeviceSession::with_connection(op.execute)
//!   │       └─► catch_unwind → OperationResult
//!   ├─► join loop (one iteration per finished worker):
//!   │       record result → SharedState::advance() → outcome event → progress callback
//!   ├─► fill entries for workers that were lost (aborted)
//!   └─► publish FleetFinished, return report
//! ```
//!
//! ## Rules
//! - A device failure never aborts other workers; it becomes an entry.
//! - Recording, counting and the progress callback all happen in the join
//!   loop, so `processed` advances by exactly one per callback.
//! - Cancellation stops devices that have not acquired a pool permit yet; they
//!   are recorded as [`OperationResult::Cancelled`] and do not advance
//!   progress. Workers holding a permit finish their device.
//! - No lock is held across a network call.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{select, sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::FleetConfig;
use crate::core::report::{FleetReport, OperationResult};
use crate::core::session::DeviceSession;
use crate::core::state::{ProgressSnapshot, SharedState};
use crate::device::{Connector, Device};
use crate::error::{DeviceError, FleetError};
use crate::events::{Bus, Event, EventKind};
use crate::operations::DeviceOperation;

/// Progress notification delivered once per processed device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    /// `floor(100 * processed / total)`.
    pub percent: u8,
    /// Device whose outcome triggered this notification.
    pub last_device_ip: String,
    pub processed: usize,
    pub total: usize,
}

/// Caller-supplied progress sink. Panics inside it are caught and logged.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Bounded-parallel executor of device operations.
pub struct FleetRunner {
    cfg: Arc<FleetConfig>,
    connector: Arc<dyn Connector>,
    bus: Bus,
    state: Arc<SharedState>,
}

impl FleetRunner {
    /// Creates a runner with its own [`SharedState`].
    pub fn new(cfg: Arc<FleetConfig>, connector: Arc<dyn Connector>, bus: Bus) -> Self {
        Self {
            cfg,
            connector,
            bus,
            state: Arc::new(SharedState::new()),
        }
    }

    /// Progress counters of the current or last run.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn config(&self) -> &FleetConfig {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs `op` on every device and waits for all of them.
    ///
    /// Only a duplicated IP fails the whole run; every per-device failure is
    /// an entry in the returned report.
    pub async fn run<O: DeviceOperation>(
        &mut self,
        devices: Vec<Device>,
        op: Arc<O>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<FleetReport<O::Output>, FleetError> {
        let mut seen = HashSet::with_capacity(devices.len());
        for d in &devices {
            if !seen.insert(d.ip.as_str()) {
                return Err(FleetError::DuplicateDevice { ip: d.ip.clone() });
            }
        }
        let ips: Vec<String> = devices.iter().map(|d| d.ip.clone()).collect();

        let total = devices.len();
        let op_name: Arc<str> = Arc::from(op.name());
        self.state.reset(total);
        self.bus.publish(
            Event::new(EventKind::FleetStarted)
                .with_operation(Arc::clone(&op_name))
                .with_total(total),
        );

        let permits = Arc::new(Semaphore::new(self.cfg.pool_size.max(1)));
        let mut set = JoinSet::new();
        for device in devices {
            set.spawn(worker(
                device,
                Arc::clone(&op),
                Arc::clone(&self.connector),
                Arc::clone(&self.cfg),
                self.bus.clone(),
                Arc::clone(&permits),
                cancel.clone(),
            ));
        }

        let mut report = FleetReport::new(op_name.as_ref());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((ip, result)) => self.finish_device(&mut report, &op_name, ip, result, &progress),
                Err(e) => error!(operation = %op_name, error = %e, "device worker lost"),
            }
        }

        for ip in ips {
            if !report.contains(&ip) {
                let err = DeviceError::unclassified("device worker terminated before reporting");
                self.finish_device(&mut report, &op_name, ip, OperationResult::OperationError(err), &progress);
            }
        }

        if cancel.is_cancelled() {
            self.bus
                .publish(Event::new(EventKind::FleetCancelled).with_operation(Arc::clone(&op_name)));
        }
        let snap = self.state.snapshot();
        self.bus.publish(
            Event::new(EventKind::FleetFinished)
                .with_operation(op_name)
                .with_progress(snap.processed, snap.total),
        );
        Ok(report)
    }

    fn finish_device<T>(
        &self,
        report: &mut FleetReport<T>,
        op_name: &Arc<str>,
        ip: String,
        result: OperationResult<T>,
        progress: &Option<ProgressCallback>,
    ) {
        if result.is_cancelled() {
            self.bus.publish(
                Event::new(EventKind::DeviceSkipped)
                    .with_device(ip.as_str())
                    .with_operation(Arc::clone(op_name)),
            );
            report.record(ip, result);
            return;
        }

        let kind = match &result {
            OperationResult::Success(_) => EventKind::DeviceSucceeded,
            OperationResult::ConnectionFailed(_) => EventKind::DeviceConnectionFailed,
            _ => EventKind::DeviceFailed,
        };
        let reason = result.error().map(|e| e.as_message());

        if !report.record(ip.clone(), result) {
            warn!(ip = %ip, "duplicate outcome ignored");
            return;
        }
        let snap = self.state.advance();

        let mut ev = Event::new(kind)
            .with_device(ip.as_str())
            .with_operation(Arc::clone(op_name))
            .with_progress(snap.processed, snap.total);
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);

        if let Some(cb) = progress {
            notify(cb, snap, ip);
        }
    }
}

fn notify(cb: &ProgressCallback, snap: ProgressSnapshot, ip: String) {
    let p = Progress {
        percent: snap.percent,
        last_device_ip: ip,
        processed: snap.processed,
        total: snap.total,
    };
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| cb(p))) {
        warn!(panic = %super::panic_message(panic.as_ref()), "progress callback panicked");
    }
}

async fn worker<O: DeviceOperation>(
    device: Device,
    op: Arc<O>,
    connector: Arc<dyn Connector>,
    cfg: Arc<FleetConfig>,
    bus: Bus,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> (String, OperationResult<O::Output>) {
    let ip = device.ip.clone();

    let _permit = select! {
        biased;
        _ = cancel.cancelled() => return (ip, OperationResult::Cancelled),
        res = permits.acquire_owned() => match res {
            Ok(permit) => permit,
            Err(_closed) => return (ip, OperationResult::Cancelled),
        },
    };

    let run = async move {
        let mut session = DeviceSession::new(device, connector, &cfg, bus);
        session
            .with_connection(move |s| async move { op.execute(s).await }.boxed())
            .await
    };

    let outcome = match AssertUnwindSafe(run).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => {
            let msg = super::panic_message(panic.as_ref());
            error!(ip = %ip, panic = %msg, "device worker panicked");
            Err(DeviceError::unclassified(format!("worker panicked: {msg}")))
        }
    };
    (ip, OperationResult::from_outcome(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::operations::OperationFn;
    use crate::testing::{MockConnector, Script};

    fn cfg(pool_size: usize) -> Arc<FleetConfig> {
        Arc::new(FleetConfig {
            pool_size,
            retry_connection: 2,
            retry_delay_ms: 0,
            timeout_secs: 5,
            ..FleetConfig::default()
        })
    }

    fn devices(ips: &[&str]) -> Vec<Device> {
        ips.iter().map(|ip| Device::new(*ip, "MB160", "Gate")).collect()
    }

    fn runner(mock: MockConnector, pool_size: usize) -> FleetRunner {
        FleetRunner::new(cfg(pool_size), Arc::new(mock), Bus::new(256))
    }

    /// Reads the device clock.
    struct ReadClock;

    #[async_trait]
    impl DeviceOperation for ReadClock {
        type Output = chrono::NaiveDateTime;

        fn name(&self) -> &str {
            "read-clock"
        }

        async fn execute(&self, session: &mut DeviceSession) -> Result<Self::Output, DeviceError> {
            session.get_time().await
        }
    }

    #[tokio::test]
    async fn test_one_entry_and_one_callback_per_device() {
        let ips = ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"];
        let mut mock = MockConnector::new();
        for ip in &ips {
            mock = mock.with_device(ip, Script::default());
        }
        mock = mock.with_device(
            "10.0.0.3",
            Script {
                unreachable: true,
                ..Script::default()
            },
        );
        let mut runner = runner(mock, 2);

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let cb: ProgressCallback = Arc::new(move |p: Progress| sink.lock().push(p));

        let report = runner
            .run(devices(&ips), Arc::new(ReadClock), Some(cb), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.len(), 5);
        assert!(report.get("10.0.0.3").unwrap().connection_failed());
        assert_eq!(report.success_count(), 4);
        assert_eq!(report.failed_ips(), vec!["10.0.0.3"]);

        let calls = calls.lock();
        let processed: Vec<usize> = calls.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![1, 2, 3, 4, 5]);
        assert!(calls.iter().all(|p| p.total == 5));
        assert_eq!(calls.last().unwrap().percent, 100);

        let mut reported: Vec<&str> = calls.iter().map(|p| p.last_device_ip.as_str()).collect();
        reported.sort();
        assert_eq!(reported, ips.to_vec());
        assert_eq!(runner.state().calculate_progress(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_device_times_out_while_others_finish() {
        let mock = MockConnector::new()
            .with_device("10.0.0.1", Script::default())
            .with_device(
                "10.0.0.2",
                Script {
                    hang: true,
                    ..Script::default()
                },
            )
            .with_device("10.0.0.3", Script::default());
        let cfg = Arc::new(FleetConfig {
            pool_size: 2,
            retry_connection: 1,
            timeout_secs: 3,
            ..FleetConfig::default()
        });
        let mut runner = FleetRunner::new(cfg, Arc::new(mock), Bus::new(64));

        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let cb: ProgressCallback = Arc::new(move |p: Progress| seen.lock().push(p.last_device_ip));

        let report = runner
            .run(
                devices(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]),
                Arc::new(ReadClock),
                Some(cb),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert!(report.get("10.0.0.1").unwrap().is_success());
        assert!(report.get("10.0.0.3").unwrap().is_success());
        let hung = report.get("10.0.0.2").unwrap();
        assert!(hung.connection_failed());
        assert_eq!(report.failed_ips(), vec!["10.0.0.2"]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last().map(String::as_str), Some("10.0.0.2"));
        assert_eq!(runner.state().calculate_progress(), 100);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let mut runner = runner(MockConnector::new(), 4);
        let report = runner
            .run(Vec::new(), Arc::new(ReadClock), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(runner.state().calculate_progress(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ip_rejected_before_any_connect() {
        let mock = Arc::new(MockConnector::new().with_device("10.0.0.1", Script::default()));
        let mut runner = FleetRunner::new(cfg(2), Arc::clone(&mock) as Arc<dyn Connector>, Bus::new(16));
        let err = runner
            .run(
                devices(&["10.0.0.1", "10.0.0.1"]),
                Arc::new(ReadClock),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "fleet_duplicate_device");
        assert_eq!(mock.stats("10.0.0.1").connects, 0);
    }

    #[tokio::test]
    async fn test_panicking_operation_is_isolated() {
        let mock = Arc::new(
            MockConnector::new()
                .with_device("10.0.0.1", Script::default())
                .with_device("10.0.0.2", Script::default()),
        );
        let mut runner = FleetRunner::new(cfg(2), Arc::clone(&mock) as Arc<dyn Connector>, Bus::new(64));

        let op = OperationFn::arc("maybe-panic", |s: &mut DeviceSession| {
            async move {
                if s.device().ip == "10.0.0.2" {
                    panic!("firmware surprise");
                }
                Ok(())
            }
            .boxed()
        });

        let report = runner
            .run(devices(&["10.0.0.1", "10.0.0.2"]), op, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.get("10.0.0.1").unwrap().is_success());
        match report.get("10.0.0.2").unwrap().error() {
            Some(DeviceError::Base { code, .. }) => {
                assert_eq!(*code, crate::error::UNCLASSIFIED_ERROR_CODE)
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(mock.stats("10.0.0.2").disconnects, 1);
    }

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DeviceOperation for Gauge {
        type Output = ();

        fn name(&self) -> &str {
            "gauge"
        }

        async fn execute(&self, _session: &mut DeviceSession) -> Result<(), DeviceError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_size_bounds_concurrency() {
        let ips: Vec<String> = (1..=8).map(|i| format!("10.0.1.{i}")).collect();
        let mut mock = MockConnector::new();
        for ip in &ips {
            mock = mock.with_device(ip, Script::default());
        }
        let mut runner = runner(mock, 3);
        let gauge = Gauge::default();
        let peak = Arc::clone(&gauge.peak);

        let refs: Vec<&str> = ips.iter().map(String::as_str).collect();
        let report = runner
            .run(devices(&refs), Arc::new(gauge), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.success_count(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_has_every_entry() {
        let mock = MockConnector::new()
            .with_device("10.0.0.1", Script::default())
            .with_device("10.0.0.2", Script::default());
        let mut runner = runner(mock, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let counted = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counted);
        let cb: ProgressCallback = Arc::new(move |_: Progress| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let report = runner
            .run(devices(&["10.0.0.1", "10.0.0.2"]), Arc::new(ReadClock), Some(cb), &cancel)
            .await
            .unwrap();

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, r)| r.is_cancelled()));
        assert_eq!(counted.load(Ordering::SeqCst), 0);
        assert_eq!(report.failed_ips().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_progress_callback_does_not_abort_run() {
        let mock = MockConnector::new()
            .with_device("10.0.0.1", Script::default())
            .with_device("10.0.0.2", Script::default());
        let mut runner = runner(mock, 2);
        let cb: ProgressCallback = Arc::new(|_: Progress| panic!("ui went away"));

        let report = runner
            .run(devices(&["10.0.0.1", "10.0.0.2"]), Arc::new(ReadClock), Some(cb), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.success_count(), 2);
    }
}
