use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{ChannelTransport, NotifyCallback, SubscriptionId};
use crate::axis::value::AxisValue;

/// How a simulated motor travels after a setpoint write.
#[derive(Debug, Clone, Copy)]
pub struct MotionProfile {
    pub steps: u32,
    pub step_interval: Duration,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            steps: 10,
            step_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Default)]
struct Inner {
    values: RwLock<HashMap<String, AxisValue>>,
    unreachable: RwLock<HashSet<String>>,
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, NotifyCallback)>>>,
    writes: RwLock<Vec<(String, AxisValue)>>,
    probes: AtomicUsize,
}

impl Inner {
    fn inject(&self, channel: &str, value: AxisValue) {
        self.values.write().insert(channel.to_string(), value.clone());
        let callbacks: Vec<NotifyCallback> = self
            .subscribers
            .read()
            .get(channel)
            .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(value.clone());
        }
    }

    fn check_reachable(&self, channel: &str) -> anyhow::Result<()> {
        if self.unreachable.read().contains(channel) {
            return Err(anyhow::anyhow!("Channel {} is not reachable", channel));
        }
        Ok(())
    }
}

/// In-memory stand-in for the remote control layer. Records every write and
/// probe, and lets callers fire notifications from any thread.
pub struct SimulatedTransport {
    name: String,
    inner: Arc<Inner>,
    motion: Option<MotionProfile>,
    latency: Option<Duration>,
}

impl SimulatedTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Inner::default()),
            motion: None,
            latency: None,
        }
    }

    /// Setpoint writes ramp the matching readback channel in steps.
    pub fn with_motion(mut self, profile: MotionProfile) -> Self {
        self.motion = Some(profile);
        self
    }

    /// Delay applied to every `get`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_channel(self, channel: &str, value: impl Into<AxisValue>) -> Self {
        self.set_value(channel, value);
        self
    }

    pub fn set_value(&self, channel: &str, value: impl Into<AxisValue>) {
        self.inner
            .values
            .write()
            .insert(channel.to_string(), value.into());
    }

    pub fn value(&self, channel: &str) -> Option<AxisValue> {
        self.inner.values.read().get(channel).cloned()
    }

    pub fn set_reachable(&self, channel: &str, reachable: bool) {
        let mut unreachable = self.inner.unreachable.write();
        if reachable {
            unreachable.remove(channel);
        } else {
            unreachable.insert(channel.to_string());
        }
    }

    /// Store a new value and run every subscriber callback on the calling
    /// thread, as a hardware monitor would.
    pub fn inject(&self, channel: &str, value: impl Into<AxisValue>) {
        self.inner.inject(channel, value.into());
    }

    pub fn writes(&self) -> Vec<(String, AxisValue)> {
        self.inner.writes.read().clone()
    }

    pub fn writes_to(&self, channel: &str) -> Vec<AxisValue> {
        self.inner
            .writes
            .read()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn clear_writes(&self) {
        self.inner.writes.write().clear();
    }

    pub fn probe_count(&self) -> usize {
        self.inner.probes.load(Ordering::Relaxed)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscribers.read().values().map(Vec::len).sum()
    }

    fn readback_channel(&self, setpoint: &str) -> String {
        let suffixed = format!("{}.RBV", setpoint);
        if self.inner.values.read().contains_key(&suffixed) {
            suffixed
        } else {
            setpoint.to_string()
        }
    }

    fn start_motion(&self, profile: MotionProfile, setpoint: &str, target: f64) {
        let readback = self.readback_channel(setpoint);
        let inner = self.inner.clone();
        let start = inner
            .values
            .read()
            .get(&readback)
            .and_then(AxisValue::as_f64)
            .unwrap_or(target);
        if readback != setpoint {
            inner
                .values
                .write()
                .insert(setpoint.to_string(), AxisValue::Number(target));
        }

        debug!(
            "Simulating motion of {} from {} to {} in {} steps",
            readback, start, target, profile.steps
        );

        tokio::spawn(async move {
            let steps = profile.steps.max(1);
            for i in 1..=steps {
                tokio::time::sleep(profile.step_interval).await;
                let position = start + (target - start) * f64::from(i) / f64::from(steps);
                inner.inject(&readback, AxisValue::Number(position));
            }
        });
    }
}

#[async_trait::async_trait]
impl ChannelTransport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, channel: &str) -> anyhow::Result<bool> {
        self.inner.probes.fetch_add(1, Ordering::Relaxed);
        Ok(!self.inner.unreachable.read().contains(channel))
    }

    async fn get(&self, channel: &str) -> anyhow::Result<AxisValue> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.inner.check_reachable(channel)?;
        self.value(channel)
            .ok_or_else(|| anyhow::anyhow!("Unknown channel: {}", channel))
    }

    async fn put(&self, channel: &str, value: AxisValue) -> anyhow::Result<()> {
        self.inner.check_reachable(channel)?;
        debug!("put {} <- {}", channel, value);
        self.inner
            .writes
            .write()
            .push((channel.to_string(), value.clone()));

        let is_field = channel.contains('.');
        match (self.motion, value.as_f64()) {
            (Some(profile), Some(target)) if !is_field => {
                self.start_motion(profile, channel, target);
            }
            _ => {
                self.inner
                    .values
                    .write()
                    .insert(channel.to_string(), value);
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        callback: NotifyCallback,
    ) -> anyhow::Result<SubscriptionId> {
        self.inner.check_reachable(channel)?;
        let id = SubscriptionId::new();
        self.inner
            .subscribers
            .write()
            .entry(channel.to_string())
            .or_default()
            .push((id, callback));
        info!("Subscribed to {} ({})", channel, id);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> anyhow::Result<()> {
        let mut subscribers = self.inner.subscribers.write();
        for subs in subscribers.values_mut() {
            if let Some(pos) = subs.iter().position(|(sid, _)| *sid == id) {
                subs.remove(pos);
                return Ok(());
            }
        }
        Err(anyhow::anyhow!("Subscription not found: {}", id))
    }
}
