//! Scripted protocol layer for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

use crate::device::{Communication, Connector, DeviceInfo, DeviceLink, RawAttendance};
use crate::error::LinkError;

/// Local "now" used by the fixed clock in tests.
pub(crate) fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .unwrap_or_default()
}

/// A raw punch with a valid timestamp.
pub(crate) fn punch(user: &str, minute: u32) -> RawAttendance {
    RawAttendance {
        user_id: user.to_string(),
        timestamp: NaiveDate::from_ymd_opt(2024, 6, 3).and_then(|d| d.and_hms_opt(8, minute, 0)),
        status: 0,
    }
}

/// Behaviour of one simulated device.
#[derive(Clone, Debug)]
pub(crate) struct Script {
    /// Connect fails this many times before succeeding.
    pub connect_failures: u32,
    /// Connect always fails.
    pub unreachable: bool,
    /// Connect never completes.
    pub hang: bool,
    pub device_time: NaiveDateTime,
    /// Successive `get_attendance` results; the last one repeats.
    pub fetches: VecDeque<Vec<RawAttendance>>,
    /// Reported record count. `None` means the length of the first fetch.
    pub record_count: Option<usize>,
    pub ping: bool,
    pub name: String,
    pub fail_set_time: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            connect_failures: 0,
            unreachable: false,
            hang: false,
            device_time: noon(),
            fetches: VecDeque::new(),
            record_count: None,
            ping: true,
            name: "MB160".to_string(),
            fail_set_time: false,
        }
    }
}

impl Script {
    pub fn with_fetches(mut self, fetches: Vec<Vec<RawAttendance>>) -> Self {
        self.fetches = fetches.into();
        self
    }
}

/// Call counters for one simulated device.
#[derive(Clone, Debug, Default)]
pub(crate) struct Stats {
    pub connects: u32,
    pub disconnects: u32,
    pub fetches: u32,
    pub clears: u32,
    pub restarts: u32,
    pub set_times: Vec<NaiveDateTime>,
}

#[derive(Default)]
struct Sim {
    script: Script,
    stats: Stats,
}

type Sims = Arc<Mutex<HashMap<String, Sim>>>;

/// Connector whose devices follow a [`Script`] keyed by IP.
#[derive(Default)]
pub(crate) struct MockConnector {
    sims: Sims,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a simulated device.
    pub fn with_device(self, ip: &str, script: Script) -> Self {
        self.sims.lock().insert(
            ip.to_string(),
            Sim {
                script,
                stats: Stats::default(),
            },
        );
        self
    }

    pub fn stats(&self, ip: &str) -> Stats {
        self.sims
            .lock()
            .get(ip)
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        ip: &str,
        _port: u16,
        _transport: Communication,
    ) -> Result<Box<dyn DeviceLink>, LinkError> {
        let hang = {
            let mut sims = self.sims.lock();
            let sim = sims
                .get_mut(ip)
                .ok_or_else(|| LinkError::Network(format!("no route to {ip}")))?;
            sim.stats.connects += 1;
            if sim.script.unreachable {
                return Err(LinkError::Network("connection refused".into()));
            }
            if sim.script.connect_failures > 0 {
                sim.script.connect_failures -= 1;
                return Err(LinkError::Network("connection reset".into()));
            }
            sim.script.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(MockLink {
            ip: ip.to_string(),
            sims: Arc::clone(&self.sims),
        }))
    }
}

struct MockLink {
    ip: String,
    sims: Sims,
}

impl MockLink {
    fn with<R>(&self, f: impl FnOnce(&mut Sim) -> R) -> Result<R, LinkError> {
        let mut sims = self.sims.lock();
        let sim = sims
            .get_mut(&self.ip)
            .ok_or_else(|| LinkError::Network("device vanished".into()))?;
        Ok(f(sim))
    }
}

#[async_trait]
impl DeviceLink for MockLink {
    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.with(|s| s.stats.disconnects += 1)
    }

    async fn get_time(&mut self) -> Result<NaiveDateTime, LinkError> {
        self.with(|s| s.script.device_time)
    }

    async fn set_time(&mut self, time: NaiveDateTime) -> Result<(), LinkError> {
        self.with(|s| {
            if s.script.fail_set_time {
                return Err(LinkError::Protocol("set_time rejected".into()));
            }
            s.stats.set_times.push(time);
            s.script.device_time = time;
            Ok(())
        })?
    }

    async fn get_attendance(&mut self) -> Result<Vec<RawAttendance>, LinkError> {
        self.with(|s| {
            s.stats.fetches += 1;
            if s.script.fetches.len() > 1 {
                s.script.fetches.pop_front().unwrap_or_default()
            } else {
                s.script.fetches.front().cloned().unwrap_or_default()
            }
        })
    }

    async fn record_count(&mut self) -> Result<usize, LinkError> {
        self.with(|s| {
            s.script
                .record_count
                .unwrap_or_else(|| s.script.fetches.front().map_or(0, Vec::len))
        })
    }

    async fn clear_attendance(&mut self) -> Result<(), LinkError> {
        self.with(|s| s.stats.clears += 1)
    }

    async fn restart(&mut self) -> Result<(), LinkError> {
        self.with(|s| s.stats.restarts += 1)
    }

    async fn ping(&mut self) -> Result<bool, LinkError> {
        self.with(|s| s.script.ping)
    }

    async fn device_info(&mut self) -> Result<DeviceInfo, LinkError> {
        let ip = self.ip.clone();
        self.with(|s| DeviceInfo {
            serial_number: format!("SN-{ip}"),
            platform: "ZMM220_TFT".to_string(),
            firmware_version: format!("{} Ver 6.60", s.script.name),
            attendance_count: None,
        })
    }

    async fn device_name(&mut self) -> Result<String, LinkError> {
        self.with(|s| s.script.name.clone())
    }
}
