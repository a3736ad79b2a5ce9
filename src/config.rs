//! Configuration loading and composition.
//!
//! Precedence: defaults (lowest), global config file, environment
//! variables (highest). Environment keys use the `CANOPY_` prefix with
//! `__` separating nested sections, e.g. `CANOPY_PROTOCOL__ACK_TIMEOUT_MS`.

use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the tab-tree engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanopyConfig {
    /// Intent/ack protocol timings
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timings for the intent/ack protocol and echo suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long to wait for a structural ack before proceeding (ms)
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// How long a managed-move mark suppresses echoed events (ms)
    #[serde(default = "default_managed_window_ms")]
    pub managed_window_ms: u64,

    /// How long an announced child placement waits to be claimed (ms)
    #[serde(default = "default_pending_child_ttl_ms")]
    pub pending_child_ttl_ms: u64,
}

fn default_ack_timeout_ms() -> u64 {
    500
}

fn default_managed_window_ms() -> u64 {
    5000
}

fn default_pending_child_ttl_ms() -> u64 {
    3000
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            managed_window_ms: default_managed_window_ms(),
            pending_child_ttl_ms: default_pending_child_ttl_ms(),
        }
    }
}

impl ProtocolConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn managed_window(&self) -> Duration {
        Duration::from_millis(self.managed_window_ms)
    }

    pub fn pending_child_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_child_ttl_ms)
    }
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<CanopyConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;
        if let Some(path) = Self::global_config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        let builder = add_environment(builder);

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<CanopyConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = builder.add_source(File::from(path.to_path_buf()));
        let builder = add_environment(builder);

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Create default configuration.
    pub fn default() -> CanopyConfig {
        CanopyConfig::default()
    }

    /// Platform config file path (~/.config/canopy/config.toml on Linux).
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "canopy", "canopy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = Config::builder()
        .set_default("protocol.ack_timeout_ms", default_ack_timeout_ms())?
        .set_default("protocol.managed_window_ms", default_managed_window_ms())?
        .set_default(
            "protocol.pending_child_ttl_ms",
            default_pending_child_ttl_ms(),
        )?;
    Ok(builder)
}

fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("CANOPY")
            .separator("__")
            .try_parsing(true),
    )
}
