use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{axis::config::AxisConfig, guard::rule::GuardRule};

/// A secondary move issued after a preset's primary move was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowMove {
    pub axis: String,
    pub target: f64,
}

/// A named operation such as "pinhole 20" or "microscope in".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub axis: String,
    pub target: f64,
    #[serde(default)]
    pub also: Vec<FollowMove>,
}

impl Preset {
    pub fn new(name: impl Into<String>, axis: impl Into<String>, target: f64) -> Self {
        Self {
            name: name.into(),
            axis: axis.into(),
            target,
            also: Vec::new(),
        }
    }

    pub fn also(mut self, axis: impl Into<String>, target: f64) -> Self {
        self.also.push(FollowMove {
            axis: axis.into(),
            target,
        });
        self
    }
}

/// Everything that distinguishes one station from another: its axes and
/// their addresses, the guard table, presets and stop channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDescriptor {
    pub name: String,
    #[serde(default, rename = "axis")]
    pub axes: Vec<AxisConfig>,
    #[serde(default, rename = "guard")]
    pub guards: Vec<GuardRule>,
    #[serde(default, rename = "preset")]
    pub presets: Vec<Preset>,
    /// Axes written with `1` by an emergency stop.
    #[serde(default)]
    pub stop_channels: Vec<String>,
    /// Fixed step sizes offered for relative moves.
    #[serde(default = "default_jog_steps")]
    pub jog_steps: Vec<f64>,
}

fn default_jog_steps() -> Vec<f64> {
    vec![0.1, 0.01, 0.001]
}

impl StationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            axes: Vec::new(),
            guards: Vec::new(),
            presets: Vec::new(),
            stop_channels: Vec::new(),
            jog_steps: default_jog_steps(),
        }
    }

    pub fn with_axis(mut self, axis: AxisConfig) -> Self {
        self.axes.push(axis);
        self
    }

    pub fn with_guard(mut self, guard: GuardRule) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.presets.push(preset);
        self
    }

    pub fn with_stop_channel(mut self, axis: impl Into<String>) -> Self {
        self.stop_channels.push(axis.into());
        self
    }

    pub fn axis(&self, name: &str) -> Option<&AxisConfig> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Base addresses of every axis, in declaration order.
    pub fn addresses(&self) -> Vec<String> {
        self.axes.iter().map(|a| a.address.base.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for axis in &self.axes {
            if !names.insert(axis.name.as_str()) {
                bail!("Station {}: duplicate axis {}", self.name, axis.name);
            }
            if let Some(limits) = axis.limits {
                if !limits.is_valid() {
                    bail!(
                        "Station {}: axis {} has low limit {} above high limit {}",
                        self.name,
                        axis.name,
                        limits.low,
                        limits.high
                    );
                }
            }
        }

        let known = |axis: &str, context: &str| -> Result<()> {
            if names.contains(axis) {
                Ok(())
            } else {
                bail!("Station {}: {} refers to unknown axis {}", self.name, context, axis)
            }
        };

        for guard in &self.guards {
            for axis in guard.referenced_axes() {
                known(axis, &format!("guard {}", guard.name))?;
            }
        }
        for preset in &self.presets {
            known(&preset.axis, &format!("preset {}", preset.name))?;
            for follow in &preset.also {
                known(&follow.axis, &format!("preset {}", preset.name))?;
            }
        }
        for axis in &self.stop_channels {
            known(axis, "stop channel")?;
        }
        if self.jog_steps.iter().any(|step| *step <= 0.0) {
            bail!("Station {}: jog steps must be positive", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{axis::address::ChannelAddress, guard::rule::Requirement, guard::rule::Relation};

    fn descriptor() -> StationDescriptor {
        StationDescriptor::new("13-BMD")
            .with_axis(AxisConfig::new("omega", ChannelAddress::new("13BMD:m92")))
            .with_axis(AxisConfig::new("pinhole", ChannelAddress::new("13BMD:m27")).movable())
            .with_axis(AxisConfig::new("station_stop", ChannelAddress::new("13BMD:allstop")))
    }

    #[test]
    fn test_valid_descriptor_passes() {
        let descriptor = descriptor()
            .with_guard(GuardRule::new("pinhole_in", "pinhole").require(Requirement::new(
                "omega",
                Relation::Equal,
                -90.0,
                "Move to X-ray position",
            )))
            .with_preset(Preset::new("pinhole_20", "pinhole", 20.0))
            .with_stop_channel("station_stop");

        assert!(descriptor.validate().is_ok());
        assert_eq!(descriptor.addresses().len(), 3);
        assert_eq!(descriptor.jog_steps, vec![0.1, 0.01, 0.001]);
    }

    #[test]
    fn test_duplicate_axis_is_rejected() {
        let descriptor =
            descriptor().with_axis(AxisConfig::new("omega", ChannelAddress::new("13BMD:m1")));
        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate axis omega"));
    }

    #[test]
    fn test_unknown_references_are_rejected() {
        let guard = descriptor().with_guard(GuardRule::new("g", "pinhole").wait_for("zoom"));
        assert!(guard.validate().is_err());

        let preset = descriptor().with_preset(Preset::new("light", "pinhole", 0.0).also("light", 1.0));
        assert!(preset.validate().is_err());

        let stop = descriptor().with_stop_channel("allstop");
        assert!(stop.validate().is_err());
    }

    #[test]
    fn test_inverted_limits_are_rejected() {
        let descriptor = descriptor().with_axis(
            AxisConfig::new("us_mirror", ChannelAddress::new("13BMD:m65")).with_limits(0.0, -115.0),
        );
        assert!(descriptor.validate().is_err());
    }
}
