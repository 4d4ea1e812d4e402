//! Invocation requests and the events they produce on the stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Message type a submission must declare.
pub const REQUEST_TYPE: &str = "request";

/// Method selector naming the invocation method.
pub const TOOLS_CALL_METHOD: &str = "tools/call";

/// Caller-supplied opaque correlation token.
///
/// Only JSON strings and numbers are accepted; the value is echoed back
/// unchanged in the acknowledgement and in the result or error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(Value);

impl CorrelationId {
    /// Accept a JSON string or number; anything else is not an id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) | Value::Number(_) => Some(Self(value.clone())),
            _ => None,
        }
    }

    /// Canonical text form used to track in-flight ids.
    ///
    /// `"7"` and `7` are distinct ids.
    pub fn key(&self) -> String {
        self.0.to_string()
    }

    /// The id exactly as the caller sent it.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(Value::String(id.to_string()))
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(Value::from(id))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// An accepted `tools/call` submission waiting to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Caller-supplied correlation id.
    pub id: CorrelationId,
    /// Registered tool to run.
    pub tool_name: String,
    /// Arguments, validated against the tool schema before dispatch.
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    /// Build a request directly, bypassing envelope parsing.
    pub fn new(id: impl Into<CorrelationId>, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Recognize a submission body as an invocation.
    ///
    /// Returns `None` unless the body is an object with
    /// `type == "request"`, `method == "tools/call"`, a string or numeric
    /// `id`, and a `params` object holding a string `name`. A missing
    /// `arguments` is read as `{}`; a present one must be an object.
    pub fn from_envelope(body: &Value) -> Option<Self> {
        let envelope = body.as_object()?;

        if envelope.get("type").and_then(Value::as_str) != Some(REQUEST_TYPE) {
            return None;
        }
        if envelope.get("method").and_then(Value::as_str) != Some(TOOLS_CALL_METHOD) {
            return None;
        }

        let id = CorrelationId::from_value(envelope.get("id")?)?;
        let params = envelope.get("params")?.as_object()?;
        let tool_name = params.get("name")?.as_str()?.to_string();
        let arguments = match params.get("arguments") {
            None => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => return None,
        };

        Some(Self {
            id,
            tool_name,
            arguments,
        })
    }
}

/// Value returned by a successful tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Text passed through unchanged.
    Text(String),
    /// Structured value, serialized to compact JSON text.
    Json(Value),
}

impl ToolOutput {
    /// Text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Stringified form carried in the text content block.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

/// A typed block of result content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text, serialized as `{"type": "output_text", "text": ...}`.
    OutputText {
        /// The stringified tool result.
        text: String,
    },
}

/// Result payload of a response event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content blocks; built-in tools emit exactly one.
    pub content: Vec<ContentBlock>,
}

impl From<ToolOutput> for ToolResult {
    fn from(output: ToolOutput) -> Self {
        Self {
            content: vec![ContentBlock::OutputText {
                text: output.into_text(),
            }],
        }
    }
}

/// Structured error envelope produced by the error translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP-style status code: 400, 404, or 500.
    pub code: u16,
    /// Human-readable diagnostic.
    pub message: String,
}

/// The single event emitted for each dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InvocationEvent {
    /// The tool succeeded.
    Response {
        /// Id of the originating request.
        id: CorrelationId,
        /// Content produced by the tool.
        result: ToolResult,
    },
    /// The request failed at some stage.
    Error {
        /// Id of the originating request.
        id: CorrelationId,
        /// Code and diagnostic message.
        error: ErrorBody,
    },
}

impl InvocationEvent {
    /// Id of the request this event answers.
    pub fn id(&self) -> &CorrelationId {
        match self {
            Self::Response { id, .. } | Self::Error { id, .. } => id,
        }
    }

    /// Whether this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
