/// Device metadata lookup
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;

use crate::models::DeviceInfo;

/// Looks up display name and registered location of a device
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Unknown devices resolve to their own id at `(0, 0)`
    async fn lookup(&self, device_id: &str) -> DeviceInfo;
}

/// Registry backed by the configured device list
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    devices: HashMap<String, DeviceInfo>,
}

impl StaticRegistry {
    /// Keys are device EUIs; they are matched case-insensitively
    pub fn new(devices: HashMap<String, DeviceInfo>) -> Self {
        StaticRegistry {
            devices: devices
                .into_iter()
                .map(|(id, info)| (id.to_lowercase(), info))
                .collect(),
        }
    }
}

#[async_trait]
impl DeviceRegistry for StaticRegistry {
    async fn lookup(&self, device_id: &str) -> DeviceInfo {
        match self.devices.get(&device_id.to_lowercase()) {
            Some(info) => {
                info!("Device display name: {}", info.display_name);
                info.clone()
            }
            None => {
                debug!("Device {} not registered", device_id);
                DeviceInfo::unregistered(device_id)
            }
        }
    }
}
