use std::time::Duration;

use async_trait::async_trait;
use pulsegate_core::{CommandKind, DeviceId};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{DeviceBackend, DeviceInfo};
use crate::error::DeviceError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`RestDeviceBackend`] (§4.5: "configurable base URL,
/// bearer-token authentication, request timeout").
#[derive(Debug, Clone)]
pub struct RestDeviceBackendConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub request_timeout: Duration,
}

impl RestDeviceBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlRequestBody {
    #[serde(rename = "type")]
    kind: &'static str,
    intensity: u8,
    duration: u32,
}

/// REST-over-HTTPS implementation of [`DeviceBackend`] (§4.5, §6.2).
#[derive(Debug, Clone)]
pub struct RestDeviceBackend {
    client: Client,
    config: RestDeviceBackendConfig,
}

impl RestDeviceBackend {
    /// Build a backend with its own `reqwest::Client`, configured with the
    /// per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: RestDeviceBackendConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn control_url(&self, device_id: &DeviceId) -> String {
        format!("{}/control/{}", self.config.base_url, device_id)
    }

    fn devices_url(&self) -> String {
        format!("{}/devices", self.config.base_url)
    }

    fn classify_transport_error(err: &reqwest::Error) -> DeviceError {
        if err.is_timeout() {
            DeviceError::Timeout
        } else {
            DeviceError::Network(err.to_string())
        }
    }

    fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> Option<DeviceError> {
        if status.is_success() {
            return None;
        }
        Some(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeviceError::Auth,
            StatusCode::TOO_MANY_REQUESTS => DeviceError::RateLimited { retry_after },
            s if s.is_server_error() => DeviceError::Server { status: s.as_u16() },
            s => DeviceError::Server { status: s.as_u16() },
        })
    }

    fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
        let header = response.headers().get(reqwest::header::RETRY_AFTER)?;
        let value = header.to_str().ok()?;
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        chrono::DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|target| {
                let now = chrono::Utc::now();
                let delta = target.with_timezone(&chrono::Utc) - now;
                Duration::from_millis(delta.num_milliseconds().max(0).unsigned_abs())
            })
    }
}

impl DeviceBackend for RestDeviceBackend {
    async fn send(&self, device_id: &DeviceId, kind: CommandKind, intensity: u8, duration_ms: u32) -> Result<(), DeviceError> {
        let body = ControlRequestBody {
            kind: wire_command_kind(kind),
            intensity,
            duration: duration_ms,
        };

        let response = self
            .client
            .post(self.control_url(device_id))
            .bearer_auth(&self.config.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;

        let retry_after = Self::parse_retry_after(&response);
        if let Some(err) = Self::classify_status(response.status(), retry_after) {
            warn!(device = %device_id, status = %response.status(), "device: command rejected");
            return Err(err);
        }

        debug!(device = %device_id, %kind, intensity, duration_ms, "device: command accepted");
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let response = self
            .client
            .get(self.devices_url())
            .bearer_auth(&self.config.bearer_token)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;

        if let Some(err) = Self::classify_status(response.status(), None) {
            return Err(err);
        }

        response
            .json::<Vec<DeviceInfo>>()
            .await
            .map_err(|e| DeviceError::UnexpectedResponse(e.to_string()))
    }
}

fn wire_command_kind(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Shock => "shock",
        CommandKind::Vibrate => "vibrate",
        CommandKind::Sound => "sound",
    }
}

#[async_trait]
impl crate::backend::DynDeviceBackend for RestDeviceBackend {
    async fn send(&self, device_id: &DeviceId, kind: CommandKind, intensity: u8, duration_ms: u32) -> Result<(), DeviceError> {
        DeviceBackend::send(self, device_id, kind, intensity, duration_ms).await
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        DeviceBackend::list_devices(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_url_is_well_formed() {
        let backend = RestDeviceBackend::new(RestDeviceBackendConfig::new("https://api.example.com", "tok")).unwrap();
        assert_eq!(backend.control_url(&DeviceId::new("d1")), "https://api.example.com/control/d1");
    }

    #[test]
    fn devices_url_is_well_formed() {
        let backend = RestDeviceBackend::new(RestDeviceBackendConfig::new("https://api.example.com", "tok")).unwrap();
        assert_eq!(backend.devices_url(), "https://api.example.com/devices");
    }

    #[test]
    fn wire_command_kind_matches_api_vocabulary() {
        assert_eq!(wire_command_kind(CommandKind::Shock), "shock");
        assert_eq!(wire_command_kind(CommandKind::Vibrate), "vibrate");
        assert_eq!(wire_command_kind(CommandKind::Sound), "sound");
    }

    #[test]
    fn classify_status_maps_auth_and_rate_limit() {
        assert!(matches!(
            RestDeviceBackend::classify_status(StatusCode::UNAUTHORIZED, None),
            Some(DeviceError::Auth)
        ));
        assert!(matches!(
            RestDeviceBackend::classify_status(StatusCode::TOO_MANY_REQUESTS, None),
            Some(DeviceError::RateLimited { .. })
        ));
        assert!(RestDeviceBackend::classify_status(StatusCode::OK, None).is_none());
    }
}
