use serde::{Deserialize, Serialize};

/// Remote channel naming for one axis. The base name is the setpoint; the
/// auxiliary fields hang off it as `<base>.<FIELD>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAddress {
    #[serde(rename = "address")]
    pub base: String,
    #[serde(default)]
    pub readback_suffix: bool,
}

impl ChannelAddress {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            readback_suffix: false,
        }
    }

    pub fn with_readback_suffix(mut self) -> Self {
        self.readback_suffix = true;
        self
    }

    pub fn setpoint(&self) -> &str {
        &self.base
    }

    pub fn readback(&self) -> String {
        if self.readback_suffix {
            self.field("RBV")
        } else {
            self.base.clone()
        }
    }

    pub fn high_limit(&self) -> String {
        self.field("HLM")
    }

    pub fn low_limit(&self) -> String {
        self.field("LLM")
    }

    pub fn stop(&self) -> String {
        self.field("STOP")
    }

    pub fn calibration_set(&self) -> String {
        self.field("SET")
    }

    pub fn offset_freeze(&self) -> String {
        self.field("FOFF")
    }

    fn field(&self, name: &str) -> String {
        format!("{}.{}", self.base, name)
    }
}
