use anyhow::Result;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::axis::value::AxisValue;

#[derive(Debug)]
pub enum Command {
    Move {
        station: String,
        axis: String,
        target: AxisValue,
        enforce_limits: bool,
        resp: oneshot::Sender<Result<Value>>,
    },
    RunPreset {
        station: String,
        preset: String,
        resp: oneshot::Sender<Result<Value>>,
    },
    Jog {
        station: String,
        axis: String,
        step: f64,
        resp: oneshot::Sender<Result<Value>>,
    },
    StopAll {
        station: String,
        resp: oneshot::Sender<Result<Value>>,
    },
    StopAxis {
        station: String,
        axis: String,
        resp: oneshot::Sender<Result<Value>>,
    },
    SetLimits {
        station: String,
        axis: String,
        low: f64,
        high: f64,
        resp: oneshot::Sender<Result<Value>>,
    },
    ZeroOffset {
        station: String,
        axis: String,
        resp: oneshot::Sender<Result<Value>>,
    },
    Snapshot {
        station: String,
        resp: oneshot::Sender<Result<Value>>,
    },
    ListStations {
        resp: oneshot::Sender<Result<Value>>,
    },
    ListAxes {
        station: String,
        resp: oneshot::Sender<Result<Value>>,
    },
}
