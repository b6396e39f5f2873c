use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use tracing::info;

use super::{descriptor::StationDescriptor, Station};
use crate::channel::ChannelTransport;

/// Logical axis name to physical address, one map per station.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    descriptors: Vec<StationDescriptor>,
}

impl StationRegistry {
    pub fn new(descriptors: Vec<StationDescriptor>) -> Result<Self> {
        let mut registry = Self::default();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: StationDescriptor) -> Result<()> {
        if self.get(&descriptor.name).is_some() {
            bail!("Station {} is registered twice", descriptor.name);
        }
        descriptor.validate()?;
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn get(&self, station: &str) -> Option<&StationDescriptor> {
        self.descriptors.iter().find(|d| d.name == station)
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn address_of(&self, station: &str, axis: &str) -> Option<&str> {
        self.get(station)?
            .axis(axis)
            .map(|a| a.address.base.as_str())
    }

    /// Every configured address across all stations, without duplicates.
    pub fn all_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::new();
        for address in self.descriptors.iter().flat_map(|d| d.addresses()) {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        addresses
    }

    /// Construct every station in registration order.
    pub async fn build(
        &self,
        transport: Arc<dyn ChannelTransport>,
        limit_query_timeout: Duration,
    ) -> Result<Vec<Arc<Station>>> {
        let mut stations = Vec::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            let station =
                Station::build(descriptor.clone(), transport.clone(), limit_query_timeout).await?;
            stations.push(Arc::new(station));
        }
        info!("Built {} stations", stations.len());
        Ok(stations)
    }
}
