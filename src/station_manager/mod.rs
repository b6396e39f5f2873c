pub mod command;
pub mod config;

use command::Command;
use config::ManagerConfig;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    axis::value::AxisValue,
    connection::ConnectionSupervisor,
    error::{Advisory, Outcome},
    station::Station,
    sync::event::UiEvent,
};

/// Front door for UI commands. Every command is executed in order on a single
/// task, which makes that task the only issuer of moves and guard checks.
pub struct StationManager {
    stations: Arc<Vec<Arc<Station>>>,
    supervisor: Arc<ConnectionSupervisor>,
    events: broadcast::Sender<UiEvent>,
    cmd_sender: mpsc::Sender<Command>,
    config: ManagerConfig,
}

impl StationManager {
    pub fn new(
        stations: Vec<Arc<Station>>,
        supervisor: Arc<ConnectionSupervisor>,
        events: broadcast::Sender<UiEvent>,
        config: ManagerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Command>(config.command_buffer);
        let stations = Arc::new(stations);

        tokio::spawn(Self::command_loop(stations.clone(), supervisor.clone(), rx));

        StationManager {
            stations,
            supervisor,
            events,
            cmd_sender: tx,
            config,
        }
    }

    pub async fn send_command(&self, cmd: Command) -> Result<()> {
        self.cmd_sender.send(cmd).await?;
        Ok(())
    }

    /// Send a command and wait for its response.
    pub async fn request<F>(&self, build: F) -> Result<Value>
    where
        F: FnOnce(oneshot::Sender<Result<Value>>) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.send_command(build(tx)).await?;
        rx.await?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub fn stations(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn connected(&self) -> bool {
        self.supervisor.connected()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    async fn command_loop(
        stations: Arc<Vec<Arc<Station>>>,
        supervisor: Arc<ConnectionSupervisor>,
        mut rx: mpsc::Receiver<Command>,
    ) {
        while let Some(cmd) = rx.recv().await {
            let connected = supervisor.connected();
            match cmd {
                Command::Move {
                    station,
                    axis,
                    target,
                    enforce_limits,
                    resp,
                } => {
                    let result = Self::handle_move(
                        &stations,
                        connected,
                        &station,
                        &axis,
                        target,
                        enforce_limits,
                    )
                    .await;
                    let _ = resp.send(result);
                }
                Command::RunPreset {
                    station,
                    preset,
                    resp,
                } => {
                    let result =
                        Self::handle_run_preset(&stations, connected, &station, &preset).await;
                    let _ = resp.send(result);
                }
                Command::Jog {
                    station,
                    axis,
                    step,
                    resp,
                } => {
                    let result =
                        Self::handle_jog(&stations, connected, &station, &axis, step).await;
                    let _ = resp.send(result);
                }
                Command::StopAll { station, resp } => {
                    let result = Self::handle_stop_all(&stations, connected, &station).await;
                    let _ = resp.send(result);
                }
                Command::StopAxis {
                    station,
                    axis,
                    resp,
                } => {
                    let result =
                        Self::handle_stop_axis(&stations, connected, &station, &axis).await;
                    let _ = resp.send(result);
                }
                Command::SetLimits {
                    station,
                    axis,
                    low,
                    high,
                    resp,
                } => {
                    let result = Self::handle_set_limits(
                        &stations, connected, &station, &axis, low, high,
                    )
                    .await;
                    let _ = resp.send(result);
                }
                Command::ZeroOffset {
                    station,
                    axis,
                    resp,
                } => {
                    let result =
                        Self::handle_zero_offset(&stations, connected, &station, &axis).await;
                    let _ = resp.send(result);
                }
                Command::Snapshot { station, resp } => {
                    let result = Self::handle_snapshot(&stations, connected, &station);
                    let _ = resp.send(result);
                }
                Command::ListStations { resp } => {
                    let result = Self::handle_list_stations(&stations, connected);
                    let _ = resp.send(result);
                }
                Command::ListAxes { station, resp } => {
                    let result = Self::handle_list_axes(&stations, &station);
                    let _ = resp.send(result);
                }
            }
        }
        debug!("Command channel closed, station manager stopped");
    }

    fn find<'a>(stations: &'a [Arc<Station>], name: &str) -> Result<&'a Arc<Station>> {
        stations
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| anyhow!("Station not found: {}", name))
    }

    fn report(action: &str, station: &str, axis: Option<&str>, outcome: &Outcome) -> Result<Value> {
        let mut value = serde_json::to_value(outcome)?;
        if let Value::Object(map) = &mut value {
            map.insert("action".to_string(), json!(action));
            map.insert("station".to_string(), json!(station));
            if let Some(axis) = axis {
                map.insert("axis".to_string(), json!(axis));
            }
        }
        Ok(value)
    }

    fn disconnected(action: &str, station: &str, axis: Option<&str>) -> Result<Value> {
        let outcome = Outcome::rejected(Advisory::Disconnected);
        warn!("{} on {} refused: {}", action, station, Advisory::Disconnected);
        Self::report(action, station, axis, &outcome)
    }

    async fn handle_move(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        axis: &str,
        target: AxisValue,
        enforce_limits: bool,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            return Self::disconnected("move", station, Some(axis));
        }
        let outcome = st.move_axis(axis, target, enforce_limits).await?;
        Self::report("move", station, Some(axis), &outcome)
    }

    async fn handle_run_preset(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        preset: &str,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            return Self::disconnected("preset", station, None);
        }
        let outcome = st.run_preset(preset).await?;
        let mut value = Self::report("preset", station, None, &outcome)?;
        value["preset"] = json!(preset);
        Ok(value)
    }

    async fn handle_jog(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        axis: &str,
        step: f64,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            return Self::disconnected("jog", station, Some(axis));
        }
        let outcome = st.jog(axis, step).await?;
        Self::report("jog", station, Some(axis), &outcome)
    }

    async fn handle_stop_all(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            // An emergency stop is still attempted; the write fails loudly if
            // the channel is really gone.
            warn!("Issuing stop on {} while disconnected", station);
        }
        st.stop_all().await?;
        Self::report("stop_all", station, None, &Outcome::Applied)
    }

    async fn handle_stop_axis(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        axis: &str,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            warn!("Issuing stop on {}/{} while disconnected", station, axis);
        }
        let outcome = st.stop_axis(axis).await?;
        Self::report("stop_axis", station, Some(axis), &outcome)
    }

    async fn handle_set_limits(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        axis: &str,
        low: f64,
        high: f64,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            return Self::disconnected("set_limits", station, Some(axis));
        }
        let outcome = st.set_limits(axis, low, high).await?;
        Self::report("set_limits", station, Some(axis), &outcome)
    }

    async fn handle_zero_offset(
        stations: &[Arc<Station>],
        connected: bool,
        station: &str,
        axis: &str,
    ) -> Result<Value> {
        let st = Self::find(stations, station)?;
        if !connected {
            return Self::disconnected("zero_offset", station, Some(axis));
        }
        let outcome = st.zero_offset(axis).await?;
        Self::report("zero_offset", station, Some(axis), &outcome)
    }

    fn handle_snapshot(stations: &[Arc<Station>], connected: bool, station: &str) -> Result<Value> {
        let st = Self::find(stations, station)?;
        Ok(serde_json::to_value(st.snapshot(connected))?)
    }

    fn handle_list_stations(stations: &[Arc<Station>], connected: bool) -> Result<Value> {
        let names: Vec<&str> = stations.iter().map(|s| s.name()).collect();
        Ok(json!({"stations": names, "connected": connected}))
    }

    fn handle_list_axes(stations: &[Arc<Station>], station: &str) -> Result<Value> {
        let st = Self::find(stations, station)?;
        let axes: Vec<Value> = st
            .axes()
            .iter()
            .map(|ax| {
                let mut entry = json!({
                    "name": ax.name(),
                    "kind": ax.kind(),
                    "movable": ax.is_movable(),
                    "limited": ax.is_limited(),
                    "monitored": ax.is_monitored(),
                    "precision": ax.config().precision,
                    "references": ax.config().references,
                });
                if ax.is_limited() {
                    let limits = ax.limits();
                    entry["limits"] = json!({"low": limits.low, "high": limits.high});
                }
                entry
            })
            .collect();
        let presets: Vec<&str> = st
            .descriptor()
            .presets
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        Ok(json!({
            "station": station,
            "axes": axes,
            "presets": presets,
            "jog_steps": st.descriptor().jog_steps,
        }))
    }
}
