pub mod config;
pub mod event;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{connection::ConnectionSupervisor, notify::NotificationBridge, station::Station};
use config::SyncConfig;
use event::UiEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub connected: bool,
    /// Axes drained and published this tick.
    pub published: usize,
}

/// The single background worker reconciling hardware notifications with
/// UI-visible state. It is the only clearer of `moving` and the only
/// publisher of [`UiEvent`]s.
pub struct SyncLoop {
    stations: Vec<Arc<Station>>,
    supervisor: Arc<ConnectionSupervisor>,
    events: broadcast::Sender<UiEvent>,
    last_connected: bool,
    period: Duration,
}

impl SyncLoop {
    pub fn new(
        stations: Vec<Arc<Station>>,
        supervisor: Arc<ConnectionSupervisor>,
        events: broadcast::Sender<UiEvent>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            stations,
            supervisor,
            events,
            last_connected: false,
            period: config.tick(),
        }
    }

    pub async fn tick(&mut self) -> TickReport {
        // Failures are logged by the supervisor and retried after the
        // cooldown; a tick never fails because of them.
        let _ = self.supervisor.connect().await;

        let connected = self.supervisor.connected();
        if connected != self.last_connected {
            self.last_connected = connected;
            if connected {
                info!("Remote control layer connected");
            } else {
                warn!("Remote control layer disconnected");
            }
            self.publish(UiEvent::Connection { connected });
        }

        if !connected {
            return TickReport {
                connected,
                published: 0,
            };
        }

        let mut published = 0;
        let mut references = Vec::new();
        for station in &self.stations {
            for axis in station.axes() {
                let Some(sample) = axis.cell().drain() else {
                    continue;
                };
                published += 1;

                let text = axis.format(sample.readback.as_ref());
                debug!("{}/{} -> {}", station.name(), axis.name(), text);
                self.publish(UiEvent::AxisUpdate {
                    station: station.name().to_string(),
                    axis: axis.name().to_string(),
                    text,
                });

                if !axis.config().references.is_empty() {
                    let reference = sample
                        .readback
                        .as_ref()
                        .and_then(|v| axis.reference_at(v))
                        .map(str::to_string);
                    references.push(UiEvent::ReferenceState {
                        station: station.name().to_string(),
                        axis: axis.name().to_string(),
                        reference,
                    });
                }
            }
        }

        for event in references {
            self.publish(event);
        }

        TickReport {
            connected,
            published,
        }
    }

    fn publish(&self, event: UiEvent) {
        // No subscribers is not an error; the state is still published.
        let _ = self.events.send(event);
    }

    /// Run the loop on its own task. The bridge is owned by the task so that
    /// subscriptions are released before the finished signal.
    pub fn spawn(self, bridge: NotificationBridge) -> SyncHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(bridge, token.clone()));
        SyncHandle { token, task }
    }

    async fn run(mut self, bridge: NotificationBridge, token: CancellationToken) {
        info!("Synchronization loop started, tick {:?}", self.period);
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        bridge.cancel_all().await;
        let cleared = self
            .stations
            .iter()
            .flat_map(|s| s.axes())
            .filter(|a| a.cell().clear())
            .count();
        info!(
            "Synchronization loop finished, {} pending updates discarded",
            cleared
        );
    }
}

pub struct SyncHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Request termination and wait until the loop has cleared every flag and
    /// released every subscription.
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        self.task.await?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
