//! # Connectivity and info probe.
//!
//! ping → device info → record count. A device that connects but does not
//! answer the ping is reported as a connection failure, like one that never
//! connected.

use async_trait::async_trait;
use tracing::debug;

use crate::core::DeviceSession;
use crate::device::DeviceInfo;
use crate::error::DeviceError;
use crate::operations::DeviceOperation;

/// Fleet operation: check reachability and collect device information.
#[derive(Clone, Copy, Debug, Default)]
pub struct Probe;

#[async_trait]
impl DeviceOperation for Probe {
    type Output = DeviceInfo;

    fn name(&self) -> &str {
        "probe"
    }

    async fn execute(&self, session: &mut DeviceSession) -> Result<DeviceInfo, DeviceError> {
        if !session.ping().await? {
            let d = session.device();
            return Err(DeviceError::ConnectionFailed {
                model: d.model_name.clone(),
                point: d.point.clone(),
                ip: d.ip.clone(),
                attempts: 1,
                reason: "ping failed".into(),
            });
        }

        let mut info = session.device_info().await?;
        match session.record_count().await {
            Ok(n) => info.attendance_count = Some(n),
            Err(e) => debug!(ip = %session.device().ip, error = %e, "record count unavailable"),
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::FleetConfig;
    use crate::device::{Connector, Device};
    use crate::events::Bus;
    use crate::testing::{punch, MockConnector, Script};
    use futures::FutureExt;

    async fn probe(mock: &Arc<MockConnector>) -> Result<DeviceInfo, DeviceError> {
        let mut session = DeviceSession::new(
            Device::new("10.0.0.1", "MB160", "Gate"),
            Arc::clone(mock) as Arc<dyn Connector>,
            &FleetConfig::default(),
            Bus::new(64),
        );
        session
            .with_connection(|s| async move { Probe.execute(s).await }.boxed())
            .await
    }

    #[tokio::test]
    async fn test_probe_collects_info_and_count() {
        let mock = Arc::new(MockConnector::new().with_device(
            "10.0.0.1",
            Script::default().with_fetches(vec![vec![punch("1", 0), punch("2", 1)]]),
        ));
        let info = probe(&mock).await.unwrap();
        assert_eq!(info.serial_number, "SN-10.0.0.1");
        assert_eq!(info.attendance_count, Some(2));
    }

    #[tokio::test]
    async fn test_silent_device_is_connection_failure() {
        let mock = Arc::new(MockConnector::new().with_device(
            "10.0.0.1",
            Script {
                ping: false,
                ..Script::default()
            },
        ));
        let err = probe(&mock).await.unwrap_err();
        assert!(err.is_connection_failure());
        assert_eq!(mock.stats("10.0.0.1").disconnects, 1);
    }
}
