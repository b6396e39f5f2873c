use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    connection::config::SupervisorConfig,
    socket_server::config::SocketServerConfig,
    station::{descriptor::StationDescriptor, registry::StationRegistry},
    station_manager::config::ManagerConfig,
    sync::config::SyncConfig,
};

/// Everything a running instance is configured with, as read from one TOML
/// file. Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub supervisor: SupervisorConfig,
    pub manager: ManagerConfig,
    pub server: SocketServerConfig,
    #[serde(rename = "station")]
    pub stations: Vec<StationDescriptor>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.tick_ms == 0 {
            bail!("sync.tick_ms must be positive");
        }
        if self.sync.event_capacity == 0 {
            bail!("sync.event_capacity must be positive");
        }
        if self.manager.command_buffer == 0 {
            bail!("manager.command_buffer must be positive");
        }
        self.registry().map(|_| ())
    }

    pub fn registry(&self) -> Result<StationRegistry> {
        StationRegistry::new(self.stations.clone())
    }
}
