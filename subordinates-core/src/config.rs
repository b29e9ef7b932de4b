//! Configuration loading with TOML support
//!
//! Configuration is read from a TOML file, overridden from the environment
//! and validated before use. Every section has defaults, so an empty file
//! (or no file) yields a usable configuration for a device running the
//! MQTT bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SubordinatesError, SubordinatesResult};

/// Complete configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// The message bus the controller is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageBus {
    Mqtt,
    Ubus,
    UnixSocket,
}

impl MessageBus {
    /// Only the MQTT bus can bridge to subordinates
    pub fn supports_bridging(&self) -> bool {
        matches!(self, MessageBus::Mqtt)
    }
}

impl fmt::Display for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBus::Mqtt => f.write_str("mqtt"),
            MessageBus::Ubus => f.write_str("ubus"),
            MessageBus::UnixSocket => f.write_str("unix-socket"),
        }
    }
}

impl FromStr for MessageBus {
    type Err = SubordinatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mqtt" => Ok(MessageBus::Mqtt),
            "ubus" => Ok(MessageBus::Ubus),
            "unix-socket" => Ok(MessageBus::UnixSocket),
            other => Err(SubordinatesError::configuration(
                "controller.bus",
                format!("Unknown message bus: {}", other),
            )),
        }
    }
}

/// Identity of the primary controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// The controller's own id, never reusable by a subordinate
    pub id: String,

    /// Active message bus
    pub bus: MessageBus,
}

/// Location of the JSON-backed configuration store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Where and how credential files are materialized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Root holding one directory per subordinate
    pub bridges_dir: PathBuf,

    /// Owner assigned to written files (best effort)
    pub owner_user: String,
    pub owner_group: String,

    pub file_mode: u32,
    pub dir_mode: u32,
}

/// The bridging service restarted after structural changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,

    /// Program and arguments; empty disables restarts
    pub restart_command: Vec<String>,

    #[serde(with = "humantime_serde")]
    pub restart_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            id: "0000000000000000".to_string(),
            bus: MessageBus::Mqtt,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/subordinates/store.json"),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            bridges_dir: PathBuf::from("/etc/fosquitto/bridges"),
            owner_user: "mosquitto".to_string(),
            owner_group: "mosquitto".to_string(),
            file_mode: 0o600,
            dir_mode: 0o777,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "fosquitto".to_string(),
            restart_command: vec!["/etc/init.d/fosquitto".to_string(), "restart".to_string()],
            restart_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SubordinatesResult<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            SubordinatesError::configuration(
                "file",
                format!("Failed to read {}: {}", path.as_ref().display(), e),
            )
        })?;

        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> SubordinatesResult<()> {
        if let Ok(id) = std::env::var("SUBORDINATES_CONTROLLER_ID") {
            self.controller.id = id;
        }
        if let Ok(bus) = std::env::var("SUBORDINATES_BUS") {
            self.controller.bus = bus.parse()?;
        }
        if let Ok(dir) = std::env::var("SUBORDINATES_BRIDGES_DIR") {
            self.credentials.bridges_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("SUBORDINATES_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("SUBORDINATES_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SubordinatesResult<()> {
        if self.controller.id.is_empty() {
            return Err(SubordinatesError::configuration(
                "controller.id",
                "Controller id cannot be empty",
            ));
        }

        if self.credentials.bridges_dir.as_os_str().is_empty() {
            return Err(SubordinatesError::configuration(
                "credentials.bridges_dir",
                "Bridges directory cannot be empty",
            ));
        }

        if self.credentials.file_mode > 0o777 || self.credentials.dir_mode > 0o777 {
            return Err(SubordinatesError::configuration(
                "credentials",
                "File and directory modes must be permission bits only",
            ));
        }

        if self.service.restart_timeout.is_zero() {
            return Err(SubordinatesError::configuration(
                "service.restart_timeout",
                "Restart timeout must be greater than zero",
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(SubordinatesError::configuration(
                    "logging.level",
                    format!("Invalid log level: {}", other),
                ))
            }
        }

        Ok(())
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller_id(mut self, id: impl Into<String>) -> Self {
        self.config.controller.id = id.into();
        self
    }

    pub fn bus(mut self, bus: MessageBus) -> Self {
        self.config.controller.bus = bus;
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.path = path.into();
        self
    }

    pub fn bridges_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.credentials.bridges_dir = dir.into();
        self
    }

    pub fn owner(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.config.credentials.owner_user = user.into();
        self.config.credentials.owner_group = group.into();
        self
    }

    pub fn restart_command(mut self, command: Vec<String>) -> Self {
        self.config.service.restart_command = command;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> SubordinatesResult<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
