//! Wire protocol to the symbolic worker process.
//!
//! Line-delimited, one JSON object per line, UTF-8. Outbound requests carry
//! `{request_id, command, payload}`; inbound lines are either the one-time
//! readiness signal `{"status":"ready"}`, a response carrying `request_id`
//! and `result` or `error`, or diagnostic output. Everything is decoded with
//! strict serde; worker output is data, never code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// One request line sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct KernelRequest {
    /// Correlation id, unique for the lifetime of the RPC client.
    pub request_id: String,
    /// Command name, e.g. "simulate-molecule".
    pub command: String,
    /// Command payload.
    pub payload: Value,
}

impl KernelRequest {
    /// Create a request.
    pub fn new(request_id: impl Into<String>, command: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            command: command.into(),
            payload,
        }
    }

    /// Serialize to a single wire line (no trailing newline).
    pub fn to_line(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Io {
            message: format!("failed to encode request: {e}"),
        })
    }
}

/// A decoded response line from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelResponse {
    /// Correlation id of the request this answers.
    pub request_id: String,
    /// Successful result payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Worker-reported error description.
    #[serde(default)]
    pub error: Option<String>,
}

impl KernelResponse {
    /// Collapse into the caller-facing result.
    pub fn into_result(self) -> Result<Value, BridgeError> {
        if let Some(message) = self.error {
            return Err(BridgeError::Kernel { message });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Classification of one inbound worker line.
#[derive(Debug)]
pub enum InboundLine {
    /// The startup readiness signal.
    Ready,
    /// A response addressed to a pending request.
    Response(KernelResponse),
    /// Valid JSON that is neither: diagnostic only.
    Unsolicited(Value),
}

impl InboundLine {
    /// Parse one line of worker stdout.
    ///
    /// Non-JSON input is a `Malformed` error; callers log and discard it
    /// rather than letting it near any waiter.
    pub fn parse(line: &str) -> Result<InboundLine, BridgeError> {
        let value: Value = serde_json::from_str(line).map_err(|_| BridgeError::Malformed {
            line: line.to_string(),
        })?;

        if value.get("status").and_then(Value::as_str) == Some("ready") {
            return Ok(InboundLine::Ready);
        }

        if value.get("request_id").map(Value::is_string).unwrap_or(false) {
            match serde_json::from_value::<KernelResponse>(value.clone()) {
                Ok(response) => return Ok(InboundLine::Response(response)),
                Err(_) => return Ok(InboundLine::Unsolicited(value)),
            }
        }

        Ok(InboundLine::Unsolicited(value))
    }
}
