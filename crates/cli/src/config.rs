use serde::Deserialize;

/// Top-level configuration for `pulsegate-cli`, loaded from a TOML file and
/// overridable by environment variables / CLI flags (`PULSEGATE_...`,
/// mirroring the teacher's `ACTEON_...` convention).
#[derive(Debug, Default, Deserialize)]
pub struct PulsegateConfig {
    #[serde(default)]
    pub safety: SafetyTomlConfig,
    #[serde(default)]
    pub queue: QueueTomlConfig,
    #[serde(default)]
    pub device: DeviceTomlConfig,
}

/// Safety Arbiter caps (§4.4). `None` fields fall back to
/// `pulsegate_safety::SafetyConfig::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct SafetyTomlConfig {
    pub max_intensity: Option<u8>,
    pub max_duration_ms: Option<u32>,
    pub max_commands_per_minute: Option<u32>,
}

/// Command Queue & Dispatcher sizing (§4.3).
#[derive(Debug, Default, Deserialize)]
pub struct QueueTomlConfig {
    pub worker_count: Option<usize>,
    pub queue_capacity: Option<usize>,
}

/// Device Backend Adapter connection details (§4.5). Only consulted when
/// running against the REST backend; the `simulate` command always uses the
/// in-memory mock regardless of this section.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceTomlConfig {
    pub base_url: Option<String>,
    pub bearer_token: Option<String>,
}

impl PulsegateConfig {
    /// Load from a TOML file at `path`, or fall back to defaults if the file
    /// does not exist (matching the teacher's `acteon-server` startup
    /// behavior: a missing config file is not an error).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if std::path::Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_owned(), e.to_string()))?;
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_owned(), e.to_string()))
        } else {
            tracing::info!(path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn safety_config(&self) -> pulsegate_safety::SafetyConfig {
        let mut cfg = pulsegate_safety::SafetyConfig::default();
        if let Some(v) = self.safety.max_intensity {
            cfg.max_intensity = v;
        }
        if let Some(v) = self.safety.max_duration_ms {
            cfg.max_duration_ms = v;
        }
        if let Some(v) = self.safety.max_commands_per_minute {
            cfg.max_commands_per_minute = v;
        }
        cfg
    }

    #[must_use]
    pub fn dispatcher_config(&self) -> pulsegate_queue::DispatcherConfig {
        let mut cfg = pulsegate_queue::DispatcherConfig::default();
        if let Some(v) = self.queue.worker_count {
            cfg.worker_count = v;
        }
        if let Some(v) = self.queue.queue_capacity {
            cfg.queue_capacity = v;
        }
        cfg
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    Read(String, String),
    #[error("could not parse config file {0} as TOML: {1}")]
    Parse(String, String),
}
