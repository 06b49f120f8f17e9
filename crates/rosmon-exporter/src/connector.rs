use crate::config::DeviceConfig;
use anyhow::Result;
use async_trait::async_trait;
use rosmon_api::Client;
use rosmon_collector::Connector;
use rosmon_common::types::Device;
use std::collections::HashMap;
use std::time::Duration;

/// Connects to devices over TCP with the credentials from the config file.
pub struct TcpConnector {
    devices: HashMap<String, DeviceConfig>,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(devices: &[DeviceConfig], timeout: Duration) -> Self {
        Self {
            devices: devices
                .iter()
                .map(|d| (d.name.clone(), d.clone()))
                .collect(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, device: &Device) -> Result<Box<dyn Client>> {
        let cfg = self
            .devices
            .get(&device.name)
            .ok_or_else(|| anyhow::anyhow!("no credentials configured for device '{}'", device.name))?;
        let client =
            rosmon_api::connect(&cfg.address, cfg.port, &cfg.user, &cfg.password, self.timeout).await?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_device_is_rejected_without_connecting() {
        let connector = TcpConnector::new(&[], Duration::from_secs(1));
        let err = connector
            .connect(&Device::new("ghost", "10.255.255.1"))
            .await
            .err()
            .expect("unknown device should fail");
        assert!(err.to_string().contains("no credentials configured"));
    }
}
