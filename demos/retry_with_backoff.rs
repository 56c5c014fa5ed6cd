//! # Example: retry_with_backoff
//!
//! Shows how a device connection is retried under [`RetryPolicy`] and
//! [`BackoffPolicy`].
//!
//! The simulated clock refuses the first two connections. The session retries
//! with exponential backoff and jitter, publishing one `ConnectRetryScheduled`
//! event per failed attempt, and the probe succeeds on the third attempt.
//!
//! ## Flow
//! ```text
//! DeviceSession::connect()
//!   ├─► publish(DeviceConnecting, attempt=1)
//!   ├─► connector.connect() → Err("connection refused")
//!   ├─► publish(ConnectRetryScheduled{delay≈100ms})
//!   ├─► sleep(delay)
//!   ├─► attempt=2 → Err → ConnectRetryScheduled{delay≈200ms}
//!   ├─► attempt=3 → Ok
//!   └─► publish(DeviceConnected)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_backoff
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use clockfleet::{
    BackoffPolicy, Communication, Connector, Device, DeviceInfo, DeviceLink, EventKind, Fleet,
    FleetConfig, JitterPolicy, LinkError, MemoryRegistry, RawAttendance, RetryPolicy,
};

struct Flaky {
    attempts: AtomicU32,
}

#[async_trait]
impl Connector for Flaky {
    async fn connect(
        &self,
        _ip: &str,
        _port: u16,
        _transport: Communication,
    ) -> Result<Box<dyn DeviceLink>, LinkError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 {
            return Err(LinkError::Network(format!("connection refused #{n}")));
        }
        Ok(Box::new(Healthy))
    }
}

struct Healthy;

#[async_trait]
impl DeviceLink for Healthy {
    async fn disconnect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
    async fn get_time(&mut self) -> Result<NaiveDateTime, LinkError> {
        Ok(Local::now().naive_local())
    }
    async fn set_time(&mut self, _time: NaiveDateTime) -> Result<(), LinkError> {
        Ok(())
    }
    async fn get_attendance(&mut self) -> Result<Vec<RawAttendance>, LinkError> {
        Ok(Vec::new())
    }
    async fn record_count(&mut self) -> Result<usize, LinkError> {
        Ok(0)
    }
    async fn clear_attendance(&mut self) -> Result<(), LinkError> {
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
            serial_number: "SIM-1".into(),
            ..DeviceInfo::default()
        })
    }
    async fn device_name(&mut self) -> Result<String, LinkError> {
        Ok("MB160".into())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The policy on its own, around any fallible call.
    let policy = RetryPolicy::new(
        4,
        BackoffPolicy {
            first: Duration::from_millis(50),
            max: Duration::from_millis(400),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
    );
    let value = policy
        .run("warmup", |attempt| async move {
            if attempt < 2 {
                Err(format!("not yet ({attempt})"))
            } else {
                Ok(attempt)
            }
        })
        .await?;
    println!("warmup succeeded on attempt {value}");

    // The same policy drives DeviceSession::connect inside a fleet.
    let cfg = FleetConfig {
        retry_connection: 4,
        retry_delay_ms: 100,
        retry_backoff_factor: 2.0,
        retry_max_delay_ms: 1000,
        retry_jitter: JitterPolicy::Equal,
        ..FleetConfig::default()
    };
    let fleet = Fleet::builder(
        cfg,
        Arc::new(Flaky {
            attempts: AtomicU32::new(0),
        }),
        Arc::new(MemoryRegistry::new(vec![Device::new("10.0.0.1", "MB160", "Gate")])),
    )
    .build()?;

    let mut events = fleet.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            match ev.kind {
                EventKind::DeviceConnecting => println!("[connecting] attempt={:?}", ev.attempt),
                EventKind::ConnectRetryScheduled => {
                    println!("[retry] attempt={:?} delay_ms={:?} reason={:?}", ev.attempt, ev.delay_ms, ev.reason)
                }
                EventKind::DeviceConnected => println!("[connected] attempt={:?}", ev.attempt),
                EventKind::FleetFinished => break,
                _ => {}
            }
        }
    });

    let report = fleet.probe().run_all_active().await?;
    let _ = watcher.await;
    println!("probe ok: {}", report.get("10.0.0.1").is_some_and(|r| r.is_success()));
    Ok(())
}
