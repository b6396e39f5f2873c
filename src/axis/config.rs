use serde::{Deserialize, Serialize};

use super::{address::ChannelAddress, limits::SoftLimits, value::AxisKind, value::round_to};

/// A named position an axis is expected to rest at, used to derive which
/// preset controls are currently satisfied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePosition {
    pub name: String,
    pub position: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    pub name: String,
    #[serde(flatten)]
    pub address: ChannelAddress,
    #[serde(default = "default_kind")]
    pub kind: AxisKind,
    #[serde(default)]
    pub movable: bool,
    #[serde(default)]
    pub limited: bool,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default = "default_precision")]
    pub precision: usize,
    /// Initial soft-limit band; refreshed from the remote fields at startup.
    #[serde(default)]
    pub limits: Option<SoftLimits>,
    #[serde(default)]
    pub references: Vec<ReferencePosition>,
    /// Decimals the readback is rounded to before matching references.
    #[serde(default)]
    pub reference_round_to: Option<u32>,
}

fn default_kind() -> AxisKind {
    AxisKind::Position
}

fn default_precision() -> usize {
    4
}

impl AxisConfig {
    pub fn new(name: impl Into<String>, address: ChannelAddress) -> Self {
        Self {
            name: name.into(),
            address,
            kind: default_kind(),
            movable: false,
            limited: false,
            monitored: false,
            precision: default_precision(),
            limits: None,
            references: Vec::new(),
            reference_round_to: None,
        }
    }

    pub fn with_kind(mut self, kind: AxisKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn movable(mut self) -> Self {
        self.movable = true;
        self
    }

    pub fn monitored(mut self) -> Self {
        self.monitored = true;
        self
    }

    pub fn with_limits(mut self, low: f64, high: f64) -> Self {
        self.limited = true;
        self.limits = Some(SoftLimits::new(low, high));
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, position: f64) -> Self {
        self.references.push(ReferencePosition {
            name: name.into(),
            position,
        });
        self
    }

    pub fn with_reference_rounding(mut self, decimals: u32) -> Self {
        self.reference_round_to = Some(decimals);
        self
    }

    pub fn reference_at(&self, value: f64) -> Option<&str> {
        let value = match self.reference_round_to {
            Some(decimals) => round_to(value, decimals),
            None => value,
        };
        self.references
            .iter()
            .find(|r| r.position == value)
            .map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_matching_honours_rounding() {
        let exact = AxisConfig::new("us_mirror", ChannelAddress::new("m65"))
            .with_reference("in", 0.0)
            .with_reference("out", -115.0);
        assert_eq!(exact.reference_at(-115.0), Some("out"));
        assert_eq!(exact.reference_at(-114.8), None);

        let rounded = exact.with_reference_rounding(0);
        assert_eq!(rounded.reference_at(-114.8), Some("out"));
        assert_eq!(rounded.reference_at(0.3), Some("in"));
        assert_eq!(rounded.reference_at(-50.0), None);
    }
}
