use serde::Serialize;

use crate::axis::{value::AxisValue, Axis};

/// What the UI side may rely on for one axis: the last published readback
/// and whether an update is still waiting to be drained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisView {
    pub name: String,
    pub readback: Option<AxisValue>,
    pub moving: bool,
}

impl AxisView {
    /// Both fields come from one sample, so a settled axis never pairs
    /// `moving == false` with a stale readback.
    pub fn of(axis: &Axis) -> Self {
        let sample = axis.sample();
        Self {
            name: axis.name().to_string(),
            readback: sample.published,
            moving: sample.moving,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSnapshot {
    pub station: String,
    pub connected: bool,
    pub axes: Vec<AxisView>,
}

impl StationSnapshot {
    pub fn new(station: impl Into<String>, connected: bool) -> Self {
        Self {
            station: station.into(),
            connected,
            axes: Vec::new(),
        }
    }

    pub fn with_axis(
        mut self,
        name: impl Into<String>,
        readback: Option<AxisValue>,
        moving: bool,
    ) -> Self {
        self.axes.push(AxisView {
            name: name.into(),
            readback,
            moving,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&AxisView> {
        self.axes.iter().find(|a| a.name == name)
    }
}
