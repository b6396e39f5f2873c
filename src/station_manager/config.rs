use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub command_buffer: usize,
    /// Upper bound on a soft-limit round trip to the device.
    pub limit_query_timeout_ms: u64,
}

impl ManagerConfig {
    pub fn limit_query_timeout(&self) -> Duration {
        Duration::from_millis(self.limit_query_timeout_ms)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            command_buffer: 100,
            limit_query_timeout_ms: 1000,
        }
    }
}
