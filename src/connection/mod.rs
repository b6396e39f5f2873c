pub mod config;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::join_all;
use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::{channel::ChannelTransport, error::ConnectivityError};
use config::SupervisorConfig;

const SWEEP_KEY: &str = "sweep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// A sweep ran within the cooldown window; nothing was probed.
    Skipped,
    Connected,
}

/// Tracks whether every configured address answers.
///
/// Sweeps are rate limited: the result of the last sweep is cached for the
/// cooldown window and `connect()` calls inside the window do no work.
/// Concurrent callers share one sweep.
pub struct ConnectionSupervisor {
    addresses: Vec<String>,
    transport: Arc<dyn ChannelTransport>,
    connected: AtomicBool,
    sweeps: Cache<String, Arc<Vec<String>>>,
    probe_timeout: Duration,
}

impl ConnectionSupervisor {
    pub fn new(
        addresses: Vec<String>,
        transport: Arc<dyn ChannelTransport>,
        config: &SupervisorConfig,
    ) -> Self {
        Self::with_timing(addresses, transport, config.cooldown(), config.probe_timeout())
    }

    pub fn with_timing(
        addresses: Vec<String>,
        transport: Arc<dyn ChannelTransport>,
        cooldown: Duration,
        probe_timeout: Duration,
    ) -> Self {
        let sweeps = Cache::builder()
            .max_capacity(1)
            .time_to_live(cooldown)
            .build();

        Self {
            addresses,
            transport,
            connected: AtomicBool::new(false),
            sweeps,
            probe_timeout,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub async fn connect(&self) -> Result<Sweep, ConnectivityError> {
        let entry = self
            .sweeps
            .entry(SWEEP_KEY.to_string())
            .or_insert_with(self.sweep())
            .await;

        if !entry.is_fresh() {
            return Ok(Sweep::Skipped);
        }

        let unreachable = entry.into_value();
        if unreachable.is_empty() {
            if !self.connected.swap(true, Ordering::AcqRel) {
                info!("All {} channels connected", self.addresses.len());
            }
            Ok(Sweep::Connected)
        } else {
            self.connected.store(false, Ordering::Release);
            let err = ConnectivityError {
                unreachable: unreachable.as_ref().clone(),
            };
            warn!("{}", err);
            Err(err)
        }
    }

    async fn sweep(&self) -> Arc<Vec<String>> {
        debug!("Probing {} channels", self.addresses.len());
        let probes = self.addresses.iter().map(|address| async move {
            let reachable = matches!(
                tokio::time::timeout(self.probe_timeout, self.transport.probe(address)).await,
                Ok(Ok(true))
            );
            (address, reachable)
        });

        let unreachable = join_all(probes)
            .await
            .into_iter()
            .filter(|(_, reachable)| !reachable)
            .map(|(address, _)| address.clone())
            .collect();
        Arc::new(unreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::simulated::SimulatedTransport;

    fn addresses() -> Vec<String> {
        ["13BMD:m27", "13BMD:m92", "13BMD:m65", "13BMD:m68", "13BMD:m23"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_all_reachable_connects() {
        let transport = Arc::new(SimulatedTransport::new("sim"));
        let supervisor = ConnectionSupervisor::new(
            addresses(),
            transport.clone(),
            &SupervisorConfig::default(),
        );

        assert_eq!(supervisor.connect().await, Ok(Sweep::Connected));
        assert!(supervisor.connected());
        assert_eq!(transport.probe_count(), 5);
    }

    #[tokio::test]
    async fn test_one_unreachable_address_blocks_connection_and_cools_down() {
        let transport = Arc::new(SimulatedTransport::new("sim"));
        transport.set_reachable("13BMD:m68", false);
        let supervisor = ConnectionSupervisor::new(
            addresses(),
            transport.clone(),
            &SupervisorConfig::default(),
        );

        let err = supervisor.connect().await.unwrap_err();
        assert_eq!(err.unreachable, vec!["13BMD:m68".to_string()]);
        assert!(!supervisor.connected());
        let probes = transport.probe_count();

        transport.set_reachable("13BMD:m68", true);
        assert_eq!(supervisor.connect().await, Ok(Sweep::Skipped));
        assert!(!supervisor.connected());
        assert_eq!(transport.probe_count(), probes);
    }

    #[tokio::test]
    async fn test_sweep_reruns_after_cooldown() {
        let transport = Arc::new(SimulatedTransport::new("sim"));
        transport.set_reachable("13BMD:m27", false);
        let supervisor = ConnectionSupervisor::with_timing(
            addresses(),
            transport.clone(),
            Duration::from_millis(50),
            Duration::from_millis(100),
        );

        assert!(supervisor.connect().await.is_err());
        transport.set_reachable("13BMD:m27", true);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(supervisor.connect().await, Ok(Sweep::Connected));
        assert!(supervisor.connected());
    }

    #[tokio::test]
    async fn test_losing_a_channel_drops_connection() {
        let transport = Arc::new(SimulatedTransport::new("sim"));
        let supervisor = ConnectionSupervisor::with_timing(
            addresses(),
            transport.clone(),
            Duration::from_millis(50),
            Duration::from_millis(100),
        );
        assert!(supervisor.connect().await.is_ok());

        transport.set_reachable("13BMD:m92", false);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(supervisor.connect().await.is_err());
        assert!(!supervisor.connected());
    }

    #[tokio::test]
    async fn test_no_addresses_is_trivially_connected() {
        let transport = Arc::new(SimulatedTransport::new("sim"));
        let supervisor =
            ConnectionSupervisor::new(Vec::new(), transport, &SupervisorConfig::default());
        assert_eq!(supervisor.connect().await, Ok(Sweep::Connected));
    }
}
