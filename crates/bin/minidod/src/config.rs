//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `minido.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use minido_adapter_transport_tcp::TransportConfig;
use minido_app::controller::ShadeTiming;
use minido_app::history_recorder::DEFAULT_COMMIT_DELAY;
use minido_app::registry::{ModuleProvisioning, RegistryConfig};
use minido_app::services::bus_service::DEFAULT_LEARN_INPUTS;
use minido_domain::device::{ChannelRef, Device, DeviceKind, Role};
use minido_domain::error::MinidoError;
use minido_domain::id::{Channel, DeviceId, InputId, ModuleId};
use minido_domain::output_module::DEFAULT_HISTORY_CAPACITY;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Bus connection and module state.
    pub bus: BusConfig,
    /// Shade motor timing, shared by every shade.
    pub shade: ShadeConfig,
    /// Configured devices.
    pub devices: Vec<DeviceConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// History older than this many days is purged at startup.
    pub retention_days: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Gateway address as `host:port`.
    pub address: String,
    pub reconnect_delay_secs: u64,
    /// `0` disables the keepalive.
    pub keepalive_secs: u64,
    /// Samples kept in memory per channel.
    pub history_capacity: usize,
    pub provisioning: ModuleProvisioning,
    /// Quiet period before buffered history is written.
    pub commit_delay_secs: u64,
    /// Input modules (`1..=16`) that receive learn-mode frames.
    pub learn_inputs: Vec<u8>,
    /// Events buffered per SSE subscriber.
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShadeConfig {
    pub settle_ms: u64,
    pub auto_stop_secs: u64,
}

/// One output channel as written in the config file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BindingConfig {
    pub module: u8,
    pub channel: u8,
}

/// A `[[devices]]` entry.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: DeviceKind,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    /// Floor-plan coordinates.
    pub posx: Option<i32>,
    pub posy: Option<i32>,
    pub power: Option<BindingConfig>,
    pub up: Option<BindingConfig>,
    pub down: Option<BindingConfig>,
}

fn default_kind() -> DeviceKind {
    DeviceKind::Switch
}

impl Config {
    /// Load configuration from `minido.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("minido.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MINIDO_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("MINIDO_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("MINIDO_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("MINIDO_BUS_ADDR") {
            self.bus.address = val;
        }
        if let Ok(val) = std::env::var("MINIDO_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("MINIDO_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.bus.history_capacity == 0 {
            return Err(ConfigError::Validation(
                "bus.history_capacity must be non-zero".to_string(),
            ));
        }
        self.learn_inputs()?;
        self.devices()?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            address: self.bus.address.clone(),
            reconnect_delay_secs: self.bus.reconnect_delay_secs,
            keepalive_secs: self.bus.keepalive_secs,
        }
    }

    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            history_capacity: self.bus.history_capacity,
            provisioning: self.bus.provisioning,
        }
    }

    #[must_use]
    pub fn commit_delay(&self) -> Duration {
        Duration::from_secs(self.bus.commit_delay_secs)
    }

    #[must_use]
    pub fn shade_timing(&self) -> ShadeTiming {
        ShadeTiming {
            settle: Duration::from_millis(self.shade.settle_ms),
            auto_stop: Duration::from_secs(self.shade.auto_stop_secs),
        }
    }

    /// Learn-mode targets as input ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an input outside `1..=16`.
    pub fn learn_inputs(&self) -> Result<Vec<InputId>, ConfigError> {
        self.bus
            .learn_inputs
            .iter()
            .map(|raw| {
                InputId::new(*raw).map_err(|err| {
                    ConfigError::Validation(format!("bus.learn_inputs: {err}"))
                })
            })
            .collect()
    }

    /// Every `[[devices]]` entry as a validated [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for duplicate ids, out-of-range
    /// bindings, or bindings missing for the device kind.
    pub fn devices(&self) -> Result<Vec<Device>, ConfigError> {
        let mut seen = BTreeSet::new();
        self.devices
            .iter()
            .map(|entry| {
                if !seen.insert(entry.id) {
                    return Err(ConfigError::Validation(format!(
                        "device id {} is declared more than once",
                        entry.id
                    )));
                }
                entry.to_device().map_err(|err| {
                    ConfigError::Validation(format!("device {}: {}", entry.id, describe(&err)))
                })
            })
            .collect()
    }
}

impl DeviceConfig {
    fn to_device(&self) -> Result<Device, MinidoError> {
        let mut builder = Device::builder()
            .id(DeviceId::new(self.id))
            .kind(self.kind)
            .name(self.name.clone())
            .floor(self.floor.clone())
            .room(self.room.clone())
            .description(self.description.clone())
            .position(self.posx, self.posy);
        for (role, binding) in [
            (Role::Power, self.power),
            (Role::Up, self.up),
            (Role::Down, self.down),
        ] {
            if let Some(binding) = binding {
                builder = builder.bind(role, binding.to_channel_ref()?);
            }
        }
        builder.build()
    }
}

impl BindingConfig {
    fn to_channel_ref(self) -> Result<ChannelRef, MinidoError> {
        Ok(ChannelRef::new(
            ModuleId::new(self.module)?,
            Channel::new(self.channel)?,
        ))
    }
}

fn describe(err: &MinidoError) -> String {
    match err {
        MinidoError::Validation(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:minido.db?mode=rwc".to_string(),
            retention_days: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=debug".to_string(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            address: transport.address,
            reconnect_delay_secs: transport.reconnect_delay_secs,
            keepalive_secs: transport.keepalive_secs,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            provisioning: ModuleProvisioning::default(),
            commit_delay_secs: DEFAULT_COMMIT_DELAY.as_secs(),
            learn_inputs: DEFAULT_LEARN_INPUTS.to_vec(),
            event_capacity: 256,
        }
    }
}

impl Default for ShadeConfig {
    fn default() -> Self {
        let timing = ShadeTiming::default();
        Self {
            settle_ms: u64::try_from(timing.settle.as_millis()).unwrap_or(300),
            auto_stop_secs: timing.auto_stop.as_secs(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
