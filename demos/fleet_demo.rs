//! # Example: fleet_demo
//!
//! Runs every fleet operation against simulated clocks:
//! - `10.0.0.4` never answers (connection failure after retries),
//! - `10.0.0.5` runs 12 minutes behind (battery failing),
//! - `10.0.0.6` is inactive in the roster and is never touched.
//!
//! ## Flow
//! ```text
//! roster (memory) ─► Fleet ─► probe ─► time sync ─► attendance ─► restart
//!                              │
//!                              └─► LogWriter renders every runtime event
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example fleet_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use clockfleet::{
    Communication, Connector, Device, DeviceInfo, DeviceLink, DeviceRegistry, Fleet, FleetConfig,
    LinkError, LogWriter, MemoryRegistry, MemorySink, Progress, RawAttendance, Subscribe,
};
use rand::Rng;
use tracing_subscriber::EnvFilter;

/// Clocks that answer after a short random delay.
struct SimulatedConnector;

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(
        &self,
        ip: &str,
        _port: u16,
        _transport: Communication,
    ) -> Result<Box<dyn DeviceLink>, LinkError> {
        latency().await;
        if ip == "10.0.0.4" {
            return Err(LinkError::Network("no route to host".into()));
        }
        let skew = if ip == "10.0.0.5" { -12 } else { 0 };
        Ok(Box::new(SimulatedClock {
            ip: ip.to_string(),
            skew_minutes: skew,
            punches: punches(ip),
        }))
    }
}

struct SimulatedClock {
    ip: String,
    skew_minutes: i64,
    punches: Vec<RawAttendance>,
}

async fn latency() {
    let ms = rand::rng().random_range(20..120);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn punches(ip: &str) -> Vec<RawAttendance> {
    let n = ip.bytes().last().map_or(1, |b| usize::from(b % 4) + 1);
    let now = Local::now().naive_local();
    (0..n)
        .map(|i| RawAttendance {
            user_id: format!("{}", 1000 + i),
            timestamp: Some(now - chrono::Duration::minutes(30 * i as i64)),
            status: (i % 2) as u8,
        })
        .collect()
}

#[async_trait]
impl DeviceLink for SimulatedClock {
    async fn disconnect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn get_time(&mut self) -> Result<NaiveDateTime, LinkError> {
        latency().await;
        Ok(Local::now().naive_local() + chrono::Duration::minutes(self.skew_minutes))
    }

    async fn set_time(&mut self, _time: NaiveDateTime) -> Result<(), LinkError> {
        latency().await;
        self.skew_minutes = 0;
        Ok(())
    }

    async fn get_attendance(&mut self) -> Result<Vec<RawAttendance>, LinkError> {
        latency().await;
        Ok(self.punches.clone())
    }

    async fn record_count(&mut self) -> Result<usize, LinkError> {
        Ok(self.punches.len())
    }

    async fn clear_attendance(&mut self) -> Result<(), LinkError> {
        self.punches.clear();
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn ping(&mut self) -> Result<bool, LinkError> {
        Ok(true)
    }

    async fn device_info(&mut self) -> Result<DeviceInfo, LinkError> {
        Ok(DeviceInfo {
            serial_number: format!("SIM-{}", self.ip.replace('.', "")),
            platform: "ZMM220_TFT".into(),
            firmware_version: "Ver 6.60 Apr 2020".into(),
            attendance_count: None,
        })
    }

    async fn device_name(&mut self) -> Result<String, LinkError> {
        Ok("MB160".into())
    }
}

fn roster() -> Vec<Device> {
    (1..=6)
        .map(|n| {
            Device::new(format!("10.0.0.{n}"), "MB160", format!("Gate {n}"))
                .with_district("Centro")
                .with_id(format!("{n}"))
                .with_active(n != 6)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = FleetConfig {
        pool_size: 3,
        retry_delay_ms: 200,
        timeout_secs: 2,
        clear_attendance: true,
        ..FleetConfig::default()
    };
    let registry = Arc::new(MemoryRegistry::new(roster()));
    let sink = Arc::new(MemorySink::new());

    let fleet = Fleet::builder(cfg, Arc::new(SimulatedConnector), Arc::clone(&registry) as _)
        .with_sink(Arc::clone(&sink) as _)
        .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
        .build()?;

    let probe = fleet.probe().run_all_active().await?;
    for (ip, info) in probe.successes() {
        println!("probe     {ip}: {} ({} records)", info.serial_number, info.attendance_count.unwrap_or(0));
    }

    let sync = fleet.time_sync().run_all_active().await?;
    println!("time sync battery failing: {:?}", sync.battery_failing_ips());

    let attendance = fleet
        .attendance()
        .with_progress(|p: Progress| println!("attendance {:>3}% {} ({}/{})", p.percent, p.last_device_ip, p.processed, p.total))
        .run_all_active()
        .await?;
    println!(
        "attendance {} records, global file holds {}, retry later: {:?}",
        attendance.total_records(),
        sink.global_records().len(),
        attendance.report.failed_ips()
    );
    if let Some(e) = &attendance.global_error {
        eprintln!("global attendance file not written: {e}");
    }

    let restart = fleet.restart().run(&["10.0.0.1".into(), "10.0.0.2".into()]).await?;
    println!("restarted {} devices", restart.success_count());

    for d in registry.list_devices().await? {
        println!("roster    {} battery_ok={} active={}", d.ip, d.battery_ok, d.active);
    }

    // let the LogWriter drain its queue
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
