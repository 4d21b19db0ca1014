//! JSON-RPC client for the daemon socket.
//!
//! Opens one connection per call. An unreachable socket is reported as
//! [`ClientError::NotRunning`], which maps to the "server not running" code.

use super::builtin::{ActionResult, PingResult, StatusReport};
use super::protocol::{ErrorObject, Request, Response};
use crate::config::CLIENT_CALL_TIMEOUT;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// How long [`is_server_running`] waits for a ping.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server is not running at {}", path.display())]
    NotRunning {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error talking to the server: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Rpc(ErrorObject),
}

impl ClientError {
    /// The error as a protocol error object.
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            ClientError::NotRunning { .. } => ErrorObject::server_not_running(),
            ClientError::Rpc(error) => error.clone(),
            other => ErrorObject::internal(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IpcClient {
    path: PathBuf,
    timeout: Duration,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: CLIENT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Calls `method` and returns its raw result.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        tokio::time::timeout(self.timeout, self.round_trip(method, params))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    /// Calls `method` and decodes its result into `R`.
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R, ClientError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::Protocol(format!("unexpected {} result: {}", method, e)))
    }

    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|source| ClientError::NotRunning {
                path: self.path.clone(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();

        let id = Value::String(uuid::Uuid::new_v4().to_string());
        let request = Request::new(method, params, id.clone());
        let mut payload =
            serde_json::to_vec(&request).map_err(|e| ClientError::Protocol(e.to_string()))?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Protocol(
                "connection closed before a response arrived".to_string(),
            ));
        }

        let response: Response = serde_json::from_str(&line)
            .map_err(|e| ClientError::Protocol(format!("invalid response: {}", e)))?;
        if response.id != id {
            return Err(ClientError::Protocol(format!(
                "response id {} does not match request id {}",
                response.id, id
            )));
        }
        response.into_result().map_err(ClientError::Rpc)
    }

    pub async fn ping(&self) -> Result<PingResult, ClientError> {
        self.call_as("ping", None).await
    }

    pub async fn echo(&self, message: &str) -> Result<String, ClientError> {
        let value = self.call("echo", Some(json!({ "message": message }))).await?;
        value
            .get("echo")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Protocol("echo result has no message".to_string()))
    }

    pub async fn status(&self) -> Result<StatusReport, ClientError> {
        self.call_as("status", None).await
    }

    pub async fn shutdown(&self) -> Result<ActionResult, ClientError> {
        self.call_as("shutdown", None).await
    }

    pub async fn reload_session(&self) -> Result<ActionResult, ClientError> {
        self.call_as("reload_session", None).await
    }
}

/// Whether a daemon answers a ping on `path`.
pub async fn is_server_running(path: &Path) -> bool {
    IpcClient::new(path)
        .with_timeout(PROBE_TIMEOUT)
        .ping()
        .await
        .is_ok()
}
