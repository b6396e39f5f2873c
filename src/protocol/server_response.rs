use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::event::UiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The line was not a command this server understands.
    InvalidCommand,
    /// The command parsed but the manager could not carry it out
    /// (unknown station or axis, transport failure).
    CommandFailed,
}

/// One line sent back to a client. Guard and limit rejections are not
/// errors: they arrive as `Reply` with `"outcome": "rejected"` in the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerResponse {
    #[serde(rename = "success")]
    Reply {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        data: Value,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        code: ErrorCode,
        message: String,
    },
    /// Pushed to subscribed clients, never in reply to a command.
    Event { event: UiEvent },
}

impl ServerResponse {
    pub fn success(id: Option<String>, data: Value) -> Self {
        Self::Reply { id, data }
    }

    pub fn failure(id: Option<String>, code: ErrorCode, message: impl Display) -> Self {
        Self::Error {
            id,
            code,
            message: message.to_string(),
        }
    }

    pub fn from_result(id: Option<String>, result: anyhow::Result<Value>) -> Self {
        match result {
            Ok(data) => Self::success(id, data),
            Err(e) => Self::failure(id, ErrorCode::CommandFailed, format!("{:#}", e)),
        }
    }

    pub fn event(event: UiEvent) -> Self {
        Self::Event { event }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Reply { id, .. } | Self::Error { id, .. } => id.as_deref(),
            Self::Event { .. } => None,
        }
    }
}
