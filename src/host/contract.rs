//! Command and response envelopes for the catalog host protocol.

use serde::{Deserialize, Serialize};

/// Command set accepted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Search,
    Details,
    Stats,
    Sweep,
    Invalidate,
    Prefetch,
    Stop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Details => "details",
            Self::Stats => "stats",
            Self::Sweep => "sweep",
            Self::Invalidate => "invalidate",
            Self::Prefetch => "prefetch",
            Self::Stop => "stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "search" => Some(Self::Search),
            "details" => Some(Self::Details),
            "stats" => Some(Self::Stats),
            "sweep" => Some(Self::Sweep),
            "invalidate" => Some(Self::Invalidate),
            "prefetch" => Some(Self::Prefetch),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// A command envelope from the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Reject envelopes without a request id.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.request_id.trim().is_empty() {
            return Err(ContractError("request_id cannot be empty".to_owned()));
        }
        Ok(())
    }
}

/// A response envelope written back for every command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// Envelope validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError(pub String);

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid envelope: {}", self.0)
    }
}

impl std::error::Error for ContractError {}
