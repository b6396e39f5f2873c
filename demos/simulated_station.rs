use anyhow::Result;
use stationctl::{
    axis::value::AxisValue,
    channel::simulated::{MotionProfile, SimulatedTransport},
    config::AppConfig,
    connection::ConnectionSupervisor,
    notify::NotificationBridge,
    socket_server::SocketServer,
    station::descriptor::StationDescriptor,
    station_manager::{command::Command, StationManager},
    sync::{event::UiEvent, SyncLoop},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "config/station.example.toml";

/// Give every channel of the station a plausible starting value.
fn seed(transport: &SimulatedTransport, station: &StationDescriptor) {
    for axis in &station.axes {
        let address = &axis.address;
        let initial = match axis.name.as_str() {
            "omega" => AxisValue::Number(-90.0),
            "pinhole" => AxisValue::Number(-20.0),
            "us_mirror" | "ds_mirror" => AxisValue::Number(-115.0),
            "microscope" => AxisValue::Number(-85.0),
            "path" => AxisValue::from("D:\\data\\corrections"),
            _ => AxisValue::Number(0.0),
        };
        transport.set_value(address.setpoint(), initial.clone());
        transport.set_value(&address.readback(), initial);
        if axis.limited {
            transport.set_value(&address.low_limit(), -120.0);
            transport.set_value(&address.high_limit(), 120.0);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = AppConfig::load(&path)?;
    info!("Starting stationctl with {}", path);

    let transport = Arc::new(SimulatedTransport::new("simulated").with_motion(MotionProfile {
        steps: 20,
        step_interval: Duration::from_millis(50),
    }));
    for station in &config.stations {
        seed(&transport, station);
    }

    let registry = config.registry()?;
    let stations = registry
        .build(transport.clone(), config.manager.limit_query_timeout())
        .await?;

    let supervisor = Arc::new(ConnectionSupervisor::new(
        registry.all_addresses(),
        transport.clone(),
        &config.supervisor,
    ));
    let (events, _) = broadcast::channel::<UiEvent>(config.sync.event_capacity);

    let bridge = NotificationBridge::install(&stations, transport.clone()).await?;
    let sync = SyncLoop::new(stations.clone(), supervisor.clone(), events.clone(), &config.sync)
        .spawn(bridge);

    let manager = Arc::new(StationManager::new(
        stations,
        supervisor,
        events,
        config.manager.clone(),
    ));

    let mut socket_server = SocketServer::new(config.server.clone(), manager.clone());
    socket_server.start().await?;
    info!("Socket server started at {}", config.server.socket_path);

    let mut updates = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = updates.recv().await {
            info!("UI event: {:?}", event);
        }
    });

    // Let the first ticks connect and publish the initial readbacks.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let station = registry
        .names()
        .first()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("No station configured in {}", path))?;

    // Accepted: omega is at the X-ray angle and the pinhole is out.
    manager
        .request(|resp| Command::RunPreset {
            station: station.clone(),
            preset: "us_mirror_in".to_string(),
            resp,
        })
        .await
        .map(|v| info!("us_mirror_in: {}", v))
        .unwrap_or_else(|e| error!("us_mirror_in failed: {}", e));

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Rejected: the upstream mirror is now in the beam.
    manager
        .request(|resp| Command::RunPreset {
            station: station.clone(),
            preset: "pinhole_20".to_string(),
            resp,
        })
        .await
        .map(|v| info!("pinhole_20: {}", v))
        .unwrap_or_else(|e| error!("pinhole_20 failed: {}", e));

    manager
        .request(|resp| Command::Jog {
            station: station.clone(),
            axis: "sample_focus".to_string(),
            step: 0.01,
            resp,
        })
        .await
        .map(|v| info!("jog: {}", v))
        .unwrap_or_else(|e| error!("jog failed: {}", e));

    info!("Server is now running. You can test it using socat:");
    info!(
        r#"  echo '{{"type": "snapshot", "station": "{}"}}' | socat - UNIX-CONNECT:{}"#,
        station, config.server.socket_path
    );

    info!("Server will run for 600 seconds for manual testing...");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(600)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("Shutting down...");
    socket_server.shutdown().await?;
    sync.shutdown().await?;
    info!("stationctl shutdown complete");

    Ok(())
}
