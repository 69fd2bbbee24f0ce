//! Device Backend Adapter (§4.5, §6.2): a uniform `send`/`list_devices`
//! contract over one or more remote control APIs, with classified errors.

mod backend;
mod error;
mod mock;
mod rest;

pub use backend::{DeviceBackend, DeviceInfo, DynDeviceBackend};
pub use error::DeviceError;
pub use mock::{MockDeviceBackend, RecordedSend};
pub use rest::{RestDeviceBackend, RestDeviceBackendConfig};
