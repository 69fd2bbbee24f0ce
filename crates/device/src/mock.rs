use std::sync::Mutex;

use pulsegate_core::{CommandKind, DeviceId};

use crate::backend::{DeviceBackend, DeviceInfo};
use crate::error::DeviceError;

/// One recorded call to [`MockDeviceBackend::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub device_id: DeviceId,
    pub kind: CommandKind,
    pub intensity: u8,
    pub duration_ms: u32,
}

/// Deterministic in-memory [`DeviceBackend`] for dispatcher tests (§2:
/// analogous to the teacher's in-memory state-store test double). Can be
/// configured to fail the next N sends with a chosen error, to exercise the
/// dispatcher's retry policy without a real network.
#[derive(Debug, Default)]
pub struct MockDeviceBackend {
    sends: Mutex<Vec<RecordedSend>>,
    devices: Mutex<Vec<DeviceInfo>>,
    queued_failures: Mutex<Vec<DeviceError>>,
}

impl MockDeviceBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            devices: Mutex::new(devices),
            queued_failures: Mutex::new(Vec::new()),
        }
    }

    /// Queue errors to return from the next N calls to `send`, in order.
    pub fn queue_failures(&self, mut errors: Vec<DeviceError>) {
        let mut queue = self.queued_failures.lock().expect("mock backend mutex poisoned");
        errors.reverse();
        queue.extend(errors);
    }

    #[must_use]
    pub fn recorded_sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().expect("mock backend mutex poisoned").clone()
    }

    #[must_use]
    pub fn send_count(&self) -> usize {
        self.sends.lock().expect("mock backend mutex poisoned").len()
    }
}

impl DeviceBackend for MockDeviceBackend {
    async fn send(&self, device_id: &DeviceId, kind: CommandKind, intensity: u8, duration_ms: u32) -> Result<(), DeviceError> {
        let next_failure = {
            let mut queue = self.queued_failures.lock().expect("mock backend mutex poisoned");
            queue.pop()
        };

        self.sends.lock().expect("mock backend mutex poisoned").push(RecordedSend {
            device_id: device_id.clone(),
            kind,
            intensity,
            duration_ms,
        });

        match next_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(self.devices.lock().expect("mock backend mutex poisoned").clone())
    }
}
