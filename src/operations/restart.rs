//! Device restart.

use async_trait::async_trait;

use crate::core::DeviceSession;
use crate::error::DeviceError;
use crate::operations::DeviceOperation;

/// Fleet operation: reboot every device.
///
/// The link is unusable after the command; the failed disconnect that
/// follows is logged by the session and does not affect the outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct Restart;

#[async_trait]
impl DeviceOperation for Restart {
    type Output = ();

    fn name(&self) -> &str {
        "restart"
    }

    async fn execute(&self, session: &mut DeviceSession) -> Result<(), DeviceError> {
        session.restart().await
    }
}
