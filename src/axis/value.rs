use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Position,
    Light,
    Switch,
    Text,
}

impl AxisKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, AxisKind::Text)
    }
}

/// A value carried by a remote channel: numeric for motors, lights and
/// switches, free text for string channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Number(f64),
    Text(String),
}

impl AxisValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AxisValue::Number(v) => Some(*v),
            AxisValue::Text(_) => None,
        }
    }

    pub fn rounded(self, decimals: u32) -> Self {
        match self {
            AxisValue::Number(v) => AxisValue::Number(round_to(v, decimals)),
            text => text,
        }
    }

    /// Display text with `precision` decimals for numbers.
    pub fn format(&self, precision: usize) -> String {
        match self {
            AxisValue::Number(v) => format!("{:.*}", precision, v),
            AxisValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for AxisValue {
    fn from(v: f64) -> Self {
        AxisValue::Number(v)
    }
}

impl From<&str> for AxisValue {
    fn from(s: &str) -> Self {
        AxisValue::Text(s.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(s: String) -> Self {
        AxisValue::Text(s)
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Number(v) => write!(f, "{}", v),
            AxisValue::Text(s) => write!(f, "{}", s),
        }
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
