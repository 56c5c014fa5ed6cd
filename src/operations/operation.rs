//! # Per-device operation abstraction.
//!
//! A [`DeviceOperation`] is what the [`FleetRunner`](crate::FleetRunner)
//! executes inside each device's connection scope. It receives a connected
//! [`DeviceSession`] and returns a payload or a [`DeviceError`]; it never
//! connects or disconnects itself.
//!
//! [`OperationFn`] wraps a closure so ad-hoc operations need no new type.
//!
//! ## Example
//! ```rust
//! use futures::FutureExt;
//! use clockfleet::{DeviceOperation, DeviceSession, OperationFn};
//!
//! let op = OperationFn::arc("read-name", |s: &mut DeviceSession| {
//!     async move { s.device_name().await }.boxed()
//! });
//! assert_eq!(op.name(), "read-name");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::core::DeviceSession;
use crate::error::DeviceError;

/// One action applied to one connected device.
#[async_trait]
pub trait DeviceOperation: Send + Sync + 'static {
    /// Payload recorded for a successful device.
    type Output: Send + 'static;

    /// Name used in events and logs.
    fn name(&self) -> &str;

    /// Runs against a connected session. The caller guarantees disconnect.
    async fn execute(&self, session: &mut DeviceSession) -> Result<Self::Output, DeviceError>;
}

/// Closure-backed operation.
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F, T> OperationFn<F>
where
    F: for<'s> Fn(&'s mut DeviceSession) -> BoxFuture<'s, Result<T, DeviceError>>
        + Send
        + Sync
        + 'static,
    T: Send + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the operation behind an `Arc`, ready for [`FleetRunner::run`](crate::FleetRunner::run).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, T> DeviceOperation for OperationFn<F>
where
    F: for<'s> Fn(&'s mut DeviceSession) -> BoxFuture<'s, Result<T, DeviceError>>
        + Send
        + Sync
        + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, session: &mut DeviceSession) -> Result<T, DeviceError> {
        (self.f)(session).await
    }
}
