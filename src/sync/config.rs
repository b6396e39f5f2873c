use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub tick_ms: u64,
    /// Events buffered per UI subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl SyncConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            event_capacity: 256,
        }
    }
}
