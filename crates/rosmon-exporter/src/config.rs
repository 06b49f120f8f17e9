use anyhow::{bail, Context};
use rosmon_common::types::Device;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Deadline for connecting to a device and for each API command.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of devices scraped at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:9436".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    8
}

fn default_port() -> u16 {
    rosmon_api::DEFAULT_PORT
}

impl DeviceConfig {
    pub fn device(&self) -> Device {
        Device::new(&self.name, &self.address)
    }
}

impl ExporterConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file '{path}'"))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.devices.is_empty() {
            bail!("at least one device must be configured");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                bail!("device name must not be empty (address {})", device.address);
            }
            if !seen.insert(device.name.as_str()) {
                bail!("duplicate device name '{}'", device.name);
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(DeviceConfig::device).collect()
    }
}
