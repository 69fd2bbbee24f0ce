use std::future::Future;

use async_trait::async_trait;
use pulsegate_core::{CommandKind, DeviceId};
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Information about one device, as surfaced by `GET {base}/devices` (§6.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub is_paused: bool,
}

/// Uniform interface to one or more remote control APIs (§4.5). Implemented
/// with a native `async fn` trait for static-dispatch call sites; object-safe
/// callers go through [`DynDeviceBackend`] via the blanket impl below — the
/// same static/dynamic split the teacher's provider crate uses for
/// `Provider`/`DynProvider`.
pub trait DeviceBackend: Send + Sync {
    /// Issue a single command. Does **not** attempt idempotency (§4.5): a
    /// retry at the queue layer may cause a command to fire twice on a
    /// transient network error, which is acceptable given the effect-based
    /// (not state-mutating) semantics of these devices.
    fn send(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
        intensity: u8,
        duration_ms: u32,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// List known devices. Used only at startup / on-demand refresh, never
    /// on the hot dispatch path (§4.5).
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceInfo>, DeviceError>> + Send;
}

/// Object-safe counterpart of [`DeviceBackend`], for callers that need a
/// `dyn` trait object (the dispatcher holds one of these).
#[async_trait]
pub trait DynDeviceBackend: Send + Sync {
    async fn send(&self, device_id: &DeviceId, kind: CommandKind, intensity: u8, duration_ms: u32) -> Result<(), DeviceError>;

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;
}

#[async_trait]
impl<T> DynDeviceBackend for T
where
    T: DeviceBackend,
{
    async fn send(&self, device_id: &DeviceId, kind: CommandKind, intensity: u8, duration_ms: u32) -> Result<(), DeviceError> {
        DeviceBackend::send(self, device_id, kind, intensity, duration_ms).await
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        DeviceBackend::list_devices(self).await
    }
}
