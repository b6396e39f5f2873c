pub mod address;
pub mod config;
pub mod limits;
pub mod sample;
pub mod value;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::{
    channel::ChannelTransport,
    error::{Advisory, LimitBound, Outcome},
};
use address::ChannelAddress;
use config::AxisConfig;
use limits::SoftLimits;
use sample::{AxisCell, AxisSample};
use value::{AxisKind, AxisValue};

pub const UNKNOWN_READBACK: &str = "Unknown";

/// One controllable remote quantity.
///
/// Moves are fire-and-forget: an accepted move writes the setpoint and
/// returns. `readback` and `moving` change only when the hardware notifies.
pub struct Axis {
    config: AxisConfig,
    limits: ArcSwap<SoftLimits>,
    cell: Arc<AxisCell>,
    transport: Arc<dyn ChannelTransport>,
    limit_query_timeout: Duration,
}

impl Axis {
    /// Build the axis without touching the remote layer.
    pub fn new(
        config: AxisConfig,
        transport: Arc<dyn ChannelTransport>,
        initial: Option<AxisValue>,
        limit_query_timeout: Duration,
    ) -> Self {
        let limits = config.limits.unwrap_or_default();
        // A monitored axis starts dirty so its first value gets published.
        let cell = AxisCell::new(initial, config.monitored);
        Self {
            config,
            limits: ArcSwap::from_pointee(limits),
            cell: Arc::new(cell),
            transport,
            limit_query_timeout,
        }
    }

    /// Build the axis and fetch its initial readback and soft limits.
    pub async fn connect(
        config: AxisConfig,
        transport: Arc<dyn ChannelTransport>,
        limit_query_timeout: Duration,
    ) -> Self {
        let initial = if config.monitored {
            let channel = config.address.readback();
            match transport.get(&channel).await {
                Ok(value) => Some(value.rounded(config.precision as u32)),
                Err(e) => {
                    warn!("Initial readback of {} failed: {}", config.name, e);
                    None
                }
            }
        } else {
            None
        };

        let axis = Self::new(config, transport, initial, limit_query_timeout);
        if axis.config.limited {
            if let Err(e) = axis.refresh_limits().await {
                warn!(
                    "Keeping configured limits for {}: {}",
                    axis.config.name, e
                );
            }
        }
        axis
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> AxisKind {
        self.config.kind
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.config.address
    }

    pub fn is_movable(&self) -> bool {
        self.config.movable
    }

    pub fn is_limited(&self) -> bool {
        self.config.limited
    }

    pub fn is_monitored(&self) -> bool {
        self.config.monitored
    }

    pub fn cell(&self) -> &Arc<AxisCell> {
        &self.cell
    }

    pub fn is_moving(&self) -> bool {
        self.cell.is_moving()
    }

    /// Latest value delivered by the hardware, possibly not yet published.
    pub fn readback(&self) -> Option<AxisValue> {
        self.cell.readback()
    }

    /// Latest value consumed by the synchronization loop.
    pub fn published(&self) -> Option<AxisValue> {
        self.cell.published()
    }

    /// Readback, moving flag and published value from one atomic load.
    pub fn sample(&self) -> AxisSample {
        self.cell.sample()
    }

    pub fn limits(&self) -> SoftLimits {
        **self.limits.load()
    }

    pub fn format(&self, value: Option<&AxisValue>) -> String {
        value
            .map(|v| v.format(self.config.precision))
            .unwrap_or_else(|| UNKNOWN_READBACK.to_string())
    }

    pub fn reference_at(&self, value: &AxisValue) -> Option<&str> {
        value.as_f64().and_then(|v| self.config.reference_at(v))
    }

    /// Issue a setpoint write if the axis accepts it.
    pub async fn move_to(
        &self,
        target: impl Into<AxisValue>,
        enforce_limits: bool,
    ) -> anyhow::Result<Outcome> {
        let target = target.into();

        if !self.config.movable {
            return Ok(self.advise(Advisory::NotMovable {
                axis: self.name().to_string(),
            }));
        }

        if self.is_moving() {
            // At most one outstanding move; repeats are dropped, not queued.
            debug!("Dropping move of {} to {}: still moving", self.name(), target);
            return Ok(Outcome::rejected(Advisory::Busy {
                axis: self.name().to_string(),
            }));
        }

        let target = match (self.config.kind.is_numeric(), target) {
            (true, AxisValue::Number(v)) => {
                if self.config.limited && enforce_limits {
                    let limits = self.current_limits().await;
                    if let Some(advisory) = self.check_limits(limits, v) {
                        return Ok(self.advise(advisory));
                    }
                }
                AxisValue::Number(v)
            }
            (true, AxisValue::Text(_)) => {
                return Ok(self.advise(Advisory::NotNumeric {
                    axis: self.name().to_string(),
                }));
            }
            (false, value) => AxisValue::Text(value.to_string()),
        };

        self.transport
            .put(self.address().setpoint(), target.clone())
            .await
            .with_context(|| format!("Failed to move {}", self.name()))?;
        info!("Moving {} to {}", self.name(), target);
        Ok(Outcome::Applied)
    }

    /// The device's band as of now, or the cached band if the device does
    /// not answer within the limit query timeout.
    async fn current_limits(&self) -> SoftLimits {
        match self.refresh_limits().await {
            Ok(limits) => limits,
            Err(e) => {
                let cached = self.limits();
                warn!(
                    "Checking {} against cached limits [{}, {}]: {:#}",
                    self.name(),
                    cached.low,
                    cached.high,
                    e
                );
                cached
            }
        }
    }

    fn check_limits(&self, limits: SoftLimits, target: f64) -> Option<Advisory> {
        if limits.contains(target) {
            return None;
        }
        let bound = if limits.is_below(target) {
            LimitBound::Low
        } else {
            LimitBound::High
        };
        Some(Advisory::LimitViolation {
            axis: self.name().to_string(),
            target,
            low: limits.low,
            high: limits.high,
            bound,
        })
    }

    /// Replace the soft-limit band locally and on the device.
    pub async fn set_limits(&self, low: f64, high: f64) -> anyhow::Result<Outcome> {
        if !self.config.limited {
            return Ok(self.advise(Advisory::NotLimited {
                axis: self.name().to_string(),
            }));
        }
        let limits = SoftLimits::new(low, high);
        if !limits.is_valid() {
            return Ok(self.advise(Advisory::InvalidLimits {
                axis: self.name().to_string(),
                low,
                high,
            }));
        }

        let address = self.address();
        self.transport
            .put(&address.high_limit(), AxisValue::Number(high))
            .await
            .with_context(|| format!("Failed to set high limit of {}", self.name()))?;
        self.transport
            .put(&address.low_limit(), AxisValue::Number(low))
            .await
            .with_context(|| format!("Failed to set low limit of {}", self.name()))?;

        self.limits.store(Arc::new(limits));
        info!("Limits of {} set to [{}, {}]", self.name(), low, high);
        Ok(Outcome::Applied)
    }

    /// Re-read the soft-limit band from the device, bounded by the limit
    /// query timeout.
    pub async fn refresh_limits(&self) -> anyhow::Result<SoftLimits> {
        let address = self.address();
        let query = async {
            let low = self.transport.get_f64(&address.low_limit()).await?;
            let high = self.transport.get_f64(&address.high_limit()).await?;
            anyhow::Ok(SoftLimits::new(low, high))
        };

        let limits = tokio::time::timeout(self.limit_query_timeout, query)
            .await
            .with_context(|| format!("Timed out reading limits of {}", self.name()))??;

        self.limits.store(Arc::new(limits));
        debug!(
            "Limits of {} refreshed to [{}, {}]",
            self.name(),
            limits.low,
            limits.high
        );
        Ok(limits)
    }

    /// Make the current position the device's zero.
    pub async fn set_as_offset(&self) -> anyhow::Result<Outcome> {
        if self.is_moving() {
            return Ok(self.advise(Advisory::Busy {
                axis: self.name().to_string(),
            }));
        }

        let address = self.address();
        let freeze = address.offset_freeze();
        let set = address.calibration_set();
        let sequence = [
            (freeze.as_str(), 0.0),
            (set.as_str(), 1.0),
            (address.setpoint(), 0.0),
            (set.as_str(), 0.0),
            (freeze.as_str(), 1.0),
        ];
        for (channel, value) in sequence {
            self.transport
                .put(channel, AxisValue::Number(value))
                .await
                .with_context(|| format!("Failed to zero {}", self.name()))?;
        }

        info!("Zeroed {}", self.name());
        Ok(Outcome::Applied)
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.transport
            .put(&self.address().stop(), AxisValue::Number(1.0))
            .await
            .with_context(|| format!("Failed to stop {}", self.name()))
    }

    /// Write the setpoint ignoring the moving flag. Used for stop channels.
    pub async fn trigger(&self, value: impl Into<AxisValue>) -> anyhow::Result<()> {
        self.transport
            .put(self.address().setpoint(), value.into())
            .await
            .with_context(|| format!("Failed to trigger {}", self.name()))
    }

    fn advise(&self, advisory: Advisory) -> Outcome {
        warn!("{}", advisory);
        Outcome::rejected(advisory)
    }
}

impl std::fmt::Debug for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Axis")
            .field("name", &self.config.name)
            .field("address", &self.config.address.base)
            .field("sample", &self.sample())
            .finish()
    }
}
