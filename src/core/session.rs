//! # Per-device connection lifecycle.
//!
//! A [`DeviceSession`] owns the only live [`DeviceLink`] to one device during
//! a run and guarantees it is released on every exit path.
//!
//! ## States
//! ```text
//!   Idle ──connect()──► Connecting ──ok──────► Connected ──disconnect()──► Disconnecting ──► Closed
//!                           │                      │ ▲
//!                           │                      └─┘ get_time(), set_time(), ...
//!                           └──retries exhausted──► Failed ──disconnect() (no-op)──► Closed
//! ```
//!
//! ## Rules
//! - `connect()` runs the connect primitive under the configured
//!   [`RetryPolicy`], each attempt bounded by the per-call timeout.
//! - Every protocol call is bounded by the same timeout; a timeout publishes
//!   `TimeoutHit` and surfaces as [`LinkError::Timeout`].
//! - A failing protocol call leaves the session `Connected`; the caller decides.
//! - `disconnect()` is idempotent: it releases the link at most once and is a
//!   no-op when nothing is connected.
//! - [`DeviceSession::with_connection`] is the scoped form: connect, run the
//!   body, always disconnect, even if the body panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time;
use tracing::{debug, warn};

use crate::config::FleetConfig;
use crate::device::{Connector, Device, DeviceInfo, DeviceLink, RawAttendance};
use crate::error::{DeviceError, LinkError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;

/// Lifecycle state of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Closed,
    Failed,
}

/// Scoped owner of one device connection.
pub struct DeviceSession {
    device: Device,
    connector: Arc<dyn Connector>,
    link: Option<Box<dyn DeviceLink>>,
    state: SessionState,
    port: u16,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    bus: Bus,
}

impl DeviceSession {
    pub fn new(device: Device, connector: Arc<dyn Connector>, cfg: &FleetConfig, bus: Bus) -> Self {
        Self {
            device,
            connector,
            link: None,
            state: SessionState::Idle,
            port: cfg.port,
            timeout: cfg.call_timeout(),
            retry: cfg.connect_retry(),
            bus,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Mutable access, e.g. to refresh `model_name` after connecting.
    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn into_device(self) -> Device {
        self.device
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Connects with retry. A no-op when already connected.
    ///
    /// Exhaustion moves the session to `Failed` and returns
    /// [`DeviceError::ConnectionFailed`].
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.link.is_some() {
            return Ok(());
        }
        self.state = SessionState::Connecting;

        let ip: Arc<str> = Arc::from(self.device.ip.as_str());
        let (port, transport, timeout) = (self.port, self.device.communication, self.timeout);
        let connector = &self.connector;
        let bus = &self.bus;

        let outcome = self
            .retry
            .run_observed(
                "connect",
                |attempt| {
                    let connector = Arc::clone(connector);
                    let ip = Arc::clone(&ip);
                    let bus = bus.clone();
                    async move {
                        bus.publish(
                            Event::new(EventKind::DeviceConnecting)
                                .with_device(Arc::clone(&ip))
                                .with_attempt(attempt),
                        );
                        let link = bounded(
                            connector.connect(&ip, port, transport),
                            timeout,
                            &bus,
                            &ip,
                            "connect",
                        )
                        .await?;
                        Ok::<_, LinkError>((link, attempt))
                    }
                },
                |failed| {
                    if let Some(delay) = failed.delay {
                        bus.publish(
                            Event::new(EventKind::ConnectRetryScheduled)
                                .with_device(Arc::clone(&ip))
                                .with_attempt(failed.attempt)
                                .with_delay(delay)
                                .with_reason(failed.error.to_string()),
                        );
                    }
                },
            )
            .await;

        match outcome {
            Ok((link, attempt)) => {
                self.link = Some(link);
                self.state = SessionState::Connected;
                self.bus.publish(
                    Event::new(EventKind::DeviceConnected)
                        .with_device(ip)
                        .with_attempt(attempt),
                );
                Ok(())
            }
            Err(exhausted) => {
                self.state = SessionState::Failed;
                Err(DeviceError::ConnectionFailed {
                    model: self.device.model_name.clone(),
                    point: self.device.point.clone(),
                    ip: self.device.ip.clone(),
                    attempts: exhausted.attempts,
                    reason: exhausted.last.to_string(),
                })
            }
        }
    }

    /// Releases the link if one is held. Safe to call any number of times.
    ///
    /// Disconnect failures are logged, never returned: the link is considered
    /// gone either way.
    pub async fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            if self.state != SessionState::Idle {
                self.state = SessionState::Closed;
            }
            return;
        };

        self.state = SessionState::Disconnecting;
        if let Err(e) = bounded(link.disconnect(), self.timeout, &self.bus, &self.device.ip, "disconnect").await {
            warn!(ip = %self.device.ip, error = %e, "disconnect failed");
        }
        self.state = SessionState::Closed;
        self.bus
            .publish(Event::new(EventKind::DeviceDisconnected).with_device(self.device.ip.as_str()));
    }

    /// Connects, runs `body`, then disconnects on every path.
    ///
    /// A panic inside `body` is caught and returned as an unclassified
    /// [`DeviceError::Base`].
    pub async fn with_connection<T, F>(&mut self, body: F) -> Result<T, DeviceError>
    where
        F: for<'s> FnOnce(&'s mut DeviceSession) -> BoxFuture<'s, Result<T, DeviceError>>,
    {
        if let Err(e) = self.connect().await {
            self.disconnect().await;
            return Err(e);
        }

        let outcome = AssertUnwindSafe(body(&mut *self)).catch_unwind().await;
        self.disconnect().await;

        match outcome {
            Ok(res) => res,
            Err(panic) => {
                let msg = super::panic_message(panic.as_ref());
                warn!(ip = %self.device.ip, panic = %msg, "operation panicked");
                Err(DeviceError::unclassified(format!("operation panicked: {msg}")))
            }
        }
    }

    async fn call<T, F>(&mut self, name: &'static str, f: F) -> Result<T, DeviceError>
    where
        F: for<'l> FnOnce(&'l mut Box<dyn DeviceLink>) -> BoxFuture<'l, Result<T, LinkError>>,
    {
        let link = self.link.as_mut().ok_or_else(|| DeviceError::NotConnected {
            ip: self.device.ip.clone(),
        })?;
        debug!(ip = %self.device.ip, call = name, "device call");
        Ok(bounded(f(link), self.timeout, &self.bus, &self.device.ip, name).await?)
    }

    pub async fn get_time(&mut self) -> Result<NaiveDateTime, DeviceError> {
        self.call("get_time", |l| l.get_time()).await
    }

    pub async fn set_time(&mut self, time: NaiveDateTime) -> Result<(), DeviceError> {
        self.call("set_time", move |l| l.set_time(time)).await
    }

    pub async fn get_attendance(&mut self) -> Result<Vec<RawAttendance>, DeviceError> {
        self.call("get_attendance", |l| l.get_attendance()).await
    }

    pub async fn record_count(&mut self) -> Result<usize, DeviceError> {
        self.call("record_count", |l| l.record_count()).await
    }

    pub async fn clear_attendance(&mut self) -> Result<(), DeviceError> {
        self.call("clear_attendance", |l| l.clear_attendance()).await
    }

    pub async fn restart(&mut self) -> Result<(), DeviceError> {
        self.call("restart", |l| l.restart()).await
    }

    pub async fn ping(&mut self) -> Result<bool, DeviceError> {
        self.call("ping", |l| l.ping()).await
    }

    pub async fn device_info(&mut self) -> Result<DeviceInfo, DeviceError> {
        self.call("device_info", |l| l.device_info()).await
    }

    pub async fn device_name(&mut self) -> Result<String, DeviceError> {
        self.call("device_name", |l| l.device_name()).await
    }
}

/// Applies the optional per-call timeout, publishing `TimeoutHit` on expiry.
async fn bounded<T, Fut>(
    fut: Fut,
    timeout: Option<Duration>,
    bus: &Bus,
    ip: &str,
    call: &'static str,
) -> Result<T, LinkError>
where
    Fut: Future<Output = Result<T, LinkError>>,
{
    let Some(dur) = timeout.filter(|d| !d.is_zero()) else {
        return fut.await;
    };
    match time::timeout(dur, fut).await {
        Ok(res) => res,
        Err(_elapsed) => {
            bus.publish(
                Event::new(EventKind::TimeoutHit)
                    .with_device(ip)
                    .with_timeout(dur)
                    .with_reason(call),
            );
            Err(LinkError::Timeout { timeout: dur })
        }
    }
}
