use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub reconnect_cooldown_secs: u64,
    pub probe_timeout_ms: u64,
}

impl SupervisorConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.reconnect_cooldown_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_cooldown_secs: 300,
            probe_timeout_ms: 1000,
        }
    }
}
