use serde::Serialize;
use thiserror::Error;

/// Operator-facing reason a request was not carried out. Advisories never
/// mutate axis state and never escalate into a failure of the caller.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    #[error("{axis} is not movable")]
    NotMovable { axis: String },

    #[error("{axis} is still moving, request dropped")]
    Busy { axis: String },

    /// `bound` names the side actually crossed: a target below `low` is a
    /// low-limit violation.
    #[error("You reached the {bound} limit of {axis} ({target} outside [{low}, {high}])")]
    LimitViolation {
        axis: String,
        target: f64,
        low: f64,
        high: f64,
        bound: LimitBound,
    },

    #[error("Invalid limits for {axis}: low {low} is above high {high}")]
    InvalidLimits { axis: String, low: f64, high: f64 },

    #[error("{axis} has no soft limits")]
    NotLimited { axis: String },

    #[error("{axis} does not hold a numeric value")]
    NotNumeric { axis: String },

    #[error("{axis} is not a motor and has no stop field")]
    NoStopField { axis: String },

    #[error("Wait for {axis} to stop moving.")]
    PrerequisiteMoving { rule: String, axis: String },

    #[error("{message}")]
    Interlock {
        rule: String,
        axis: String,
        message: String,
    },

    #[error("Remote control layer is not connected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBound {
    Low,
    High,
}

impl std::fmt::Display for LimitBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitBound::Low => write!(f, "low"),
            LimitBound::High => write!(f, "high"),
        }
    }
}

/// Result of a UI command that reached the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Rejected { advisory: Advisory, message: String },
}

impl Outcome {
    pub fn rejected(advisory: Advisory) -> Self {
        let message = advisory.to_string();
        Outcome::Rejected { advisory, message }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        match self {
            Outcome::Applied => None,
            Outcome::Rejected { advisory, .. } => Some(advisory),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not connect {}", .unreachable.join(", "))]
pub struct ConnectivityError {
    pub unreachable: Vec<String>,
}
