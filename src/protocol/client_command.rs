use crate::axis::value::AxisValue;

use serde::{Deserialize, Serialize};

fn enforce_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "move")]
    Move {
        station: String,
        axis: String,
        target: AxisValue,
        #[serde(default = "enforce_by_default")]
        enforce_limits: bool,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "run_preset")]
    RunPreset {
        station: String,
        preset: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "jog")]
    Jog {
        station: String,
        axis: String,
        step: f64,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "stop_all")]
    StopAll {
        station: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "stop_axis")]
    StopAxis {
        station: String,
        axis: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "set_limits")]
    SetLimits {
        station: String,
        axis: String,
        low: f64,
        high: f64,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "zero_offset")]
    ZeroOffset {
        station: String,
        axis: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "snapshot")]
    Snapshot {
        station: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "list_stations")]
    ListStations {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "list_axes")]
    ListAxes {
        station: String,
        #[serde(default)]
        id: Option<String>,
    },
    /// Start streaming UI events on this connection.
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        id: Option<String>,
    },
}

impl ClientCommand {
    pub fn id(&self) -> Option<&String> {
        match self {
            ClientCommand::Move { id, .. } => id.as_ref(),
            ClientCommand::RunPreset { id, .. } => id.as_ref(),
            ClientCommand::Jog { id, .. } => id.as_ref(),
            ClientCommand::StopAll { id, .. } => id.as_ref(),
            ClientCommand::StopAxis { id, .. } => id.as_ref(),
            ClientCommand::SetLimits { id, .. } => id.as_ref(),
            ClientCommand::ZeroOffset { id, .. } => id.as_ref(),
            ClientCommand::Snapshot { id, .. } => id.as_ref(),
            ClientCommand::ListStations { id, .. } => id.as_ref(),
            ClientCommand::ListAxes { id, .. } => id.as_ref(),
            ClientCommand::Subscribe { id, .. } => id.as_ref(),
            ClientCommand::Unsubscribe { id, .. } => id.as_ref(),
            ClientCommand::Ping { id, .. } => id.as_ref(),
        }
    }
}
