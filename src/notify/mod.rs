use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::{
    axis::{value::AxisValue, Axis},
    channel::{ChannelTransport, NotifyCallback, SubscriptionId},
    station::Station,
};

struct Subscription {
    station: String,
    axis: String,
    id: SubscriptionId,
}

/// Holds one hardware subscription per monitored axis.
///
/// The installed callbacks only ever touch the axis cell: they overwrite the
/// readback and mark it dirty. Subscriptions must be released with
/// [`NotificationBridge::cancel_all`] before the axes go away.
pub struct NotificationBridge {
    transport: Arc<dyn ChannelTransport>,
    subscriptions: Vec<Subscription>,
    cancelled: bool,
}

impl NotificationBridge {
    pub async fn install(
        stations: &[Arc<Station>],
        transport: Arc<dyn ChannelTransport>,
    ) -> anyhow::Result<Self> {
        let mut bridge = Self {
            transport,
            subscriptions: Vec::new(),
            cancelled: false,
        };

        for station in stations {
            for axis in station.axes().iter().filter(|a| a.is_monitored()) {
                let channel = axis.address().readback();
                let subscribed = bridge
                    .transport
                    .subscribe(&channel, callback_for(axis))
                    .await
                    .with_context(|| format!("Failed to monitor {}", channel));

                match subscribed {
                    Ok(id) => bridge.subscriptions.push(Subscription {
                        station: station.name().to_string(),
                        axis: axis.name().to_string(),
                        id,
                    }),
                    Err(e) => {
                        // Release what was already installed before giving up.
                        bridge.cancel_all().await;
                        return Err(e);
                    }
                }
            }
        }

        info!("Monitoring {} channels", bridge.subscriptions.len());
        Ok(bridge)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription. Failures are logged and do not stop the
    /// remaining cancellations.
    pub async fn cancel_all(mut self) {
        for sub in self.subscriptions.drain(..) {
            match self.transport.unsubscribe(sub.id).await {
                Ok(()) => debug!("Stopped monitoring {}/{}", sub.station, sub.axis),
                Err(e) => warn!(
                    "Failed to stop monitoring {}/{}: {}",
                    sub.station, sub.axis, e
                ),
            }
        }
        self.cancelled = true;
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        if !self.cancelled && !self.subscriptions.is_empty() {
            warn!(
                "Notification bridge dropped with {} live subscriptions",
                self.subscriptions.len()
            );
        }
    }
}

/// The notifier-thread side of an axis: round numeric values to the display
/// precision, then swap them into the cell.
pub fn callback_for(axis: &Axis) -> NotifyCallback {
    let cell = axis.cell().clone();
    let precision = axis.config().precision as u32;
    Arc::new(move |value: AxisValue| cell.notify(value.rounded(precision)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axis::{address::ChannelAddress, config::AxisConfig},
        channel::simulated::SimulatedTransport,
        station::descriptor::StationDescriptor,
    };
    use std::time::Duration;

    async fn station(transport: &Arc<SimulatedTransport>) -> Arc<Station> {
        let descriptor = StationDescriptor::new("test")
            .with_axis(
                AxisConfig::new("pinhole", ChannelAddress::new("m27").with_readback_suffix())
                    .movable()
                    .monitored(),
            )
            .with_axis(AxisConfig::new("station_stop", ChannelAddress::new("allstop")).movable());
        Arc::new(
            Station::build(descriptor, transport.clone(), Duration::from_millis(50))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_only_monitored_axes_are_subscribed() {
        let transport = Arc::new(SimulatedTransport::new("sim").with_channel("m27.RBV", 0.0));
        let stations = vec![station(&transport).await];

        let bridge = NotificationBridge::install(&stations, transport.clone())
            .await
            .unwrap();

        assert_eq!(bridge.len(), 1);
        assert_eq!(transport.subscription_count(), 1);
        bridge.cancel_all().await;
        assert_eq!(transport.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_rounds_and_marks_dirty() {
        let transport = Arc::new(SimulatedTransport::new("sim").with_channel("m27.RBV", 0.0));
        let stations = vec![station(&transport).await];
        let bridge = NotificationBridge::install(&stations, transport.clone())
            .await
            .unwrap();
        let pinhole = stations[0].axis("pinhole").unwrap();
        pinhole.cell().clear();

        std::thread::spawn({
            let transport = transport.clone();
            move || transport.inject("m27.RBV", -19.999_996)
        })
        .join()
        .unwrap();

        assert!(pinhole.is_moving());
        assert_eq!(pinhole.readback(), Some(AxisValue::Number(-20.0)));
        bridge.cancel_all().await;
    }

    #[tokio::test]
    async fn test_failed_subscription_releases_earlier_ones() {
        let transport = Arc::new(
            SimulatedTransport::new("sim")
                .with_channel("m27.RBV", 0.0)
                .with_channel("m92.RBV", 0.0),
        );
        let descriptor = StationDescriptor::new("test")
            .with_axis(
                AxisConfig::new("pinhole", ChannelAddress::new("m27").with_readback_suffix())
                    .monitored(),
            )
            .with_axis(
                AxisConfig::new("omega", ChannelAddress::new("m92").with_readback_suffix())
                    .monitored(),
            );
        let station = Station::build(descriptor, transport.clone(), Duration::from_millis(50))
            .await
            .unwrap();
        transport.set_reachable("m92.RBV", false);

        let result = NotificationBridge::install(&[Arc::new(station)], transport.clone()).await;

        assert!(result.is_err());
        assert_eq!(transport.subscription_count(), 0);
    }
}
