pub mod simulated;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axis::value::AxisValue;

/// Invoked on the transport's notifier thread with each new value of a
/// subscribed channel. Must return promptly and must not block.
pub type NotifyCallback = Arc<dyn Fn(AxisValue) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access to the remote hardware control layer.
#[async_trait::async_trait]
pub trait ChannelTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the channel currently answers.
    async fn probe(&self, channel: &str) -> anyhow::Result<bool>;

    async fn get(&self, channel: &str) -> anyhow::Result<AxisValue>;
    async fn put(&self, channel: &str, value: AxisValue) -> anyhow::Result<()>;

    async fn subscribe(
        &self,
        channel: &str,
        callback: NotifyCallback,
    ) -> anyhow::Result<SubscriptionId>;
    async fn unsubscribe(&self, id: SubscriptionId) -> anyhow::Result<()>;

    async fn get_f64(&self, channel: &str) -> anyhow::Result<f64> {
        self.get(channel)
            .await?
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("Channel {} does not hold a number", channel))
    }
}
