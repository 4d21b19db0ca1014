//! JSON-RPC 2.0 message types.
//!
//! One JSON object per line in each direction. Every request gets exactly one
//! response; there are no notifications.

use crate::session::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version emitted on every message. Incoming values are not checked.
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Generic domain failure reported by a handler.
pub const SERVER_ERROR: i64 = -32000;
/// The daemon's socket is unreachable (reported client-side).
pub const SERVER_NOT_RUNNING: i64 = -32001;
pub const NOT_AUTHORIZED: i64 = -32002;
/// The session is starting or reloading.
pub const NOT_INITIALIZED: i64 = -32003;

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A response carries either `result` or `error`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    #[serde(default)]
    pub id: Value,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Self {
            jsonrpc: default_version(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Splits the response into its outcome. A missing result reads as `null`.
    pub fn into_result(self) -> Result<Value, ErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid Request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found").with_data(Value::from(method))
    }

    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail))
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::new(INTERNAL_ERROR, format!("Internal error: {}", detail))
    }

    pub fn server_error(detail: impl fmt::Display) -> Self {
        Self::new(SERVER_ERROR, detail.to_string())
    }

    pub fn server_not_running() -> Self {
        Self::new(SERVER_NOT_RUNNING, "Server is not running")
    }

    pub fn not_authorized() -> Self {
        Self::new(NOT_AUTHORIZED, "Not authorized. Run: agent-telegram login")
    }

    pub fn not_initialized() -> Self {
        Self::new(
            NOT_INITIALIZED,
            "Client not initialized (server may still be starting)",
        )
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for ErrorObject {}

impl From<SessionError> for ErrorObject {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotAuthorized => Self::not_authorized(),
            SessionError::NotInitialized | SessionError::SupervisorStopped => {
                Self::not_initialized()
            }
            SessionError::InvalidAddress(_) => Self::invalid_params(&err),
            other => Self::server_error(other),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
