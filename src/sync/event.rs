use serde::{Deserialize, Serialize};

/// What the synchronization loop tells the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiEvent {
    /// Readback text of an axis, already formatted for display.
    AxisUpdate {
        station: String,
        axis: String,
        text: String,
    },
    /// Which named reference position the axis currently sits at, if any.
    ReferenceState {
        station: String,
        axis: String,
        reference: Option<String>,
    },
    Connection { connected: bool },
}
