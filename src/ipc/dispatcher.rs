//! Request decoding and handler invocation.

use super::protocol::{ErrorObject, Request, Response};
use super::registry::MethodRegistry;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Decodes one line into a request, or the error response owed for it.
///
/// Non-JSON input gets a parse error with a `null` id; JSON that is not a
/// request gets invalid-request, echoing the id when one is present.
pub fn decode_request(line: &[u8]) -> Result<Request, Response> {
    let value: Value = serde_json::from_slice(line).map_err(|e| {
        tracing::debug!(error = %e, "Undecodable request line");
        Response::failure(Value::Null, ErrorObject::parse_error())
    })?;

    if !value.is_object() {
        return Err(Response::failure(
            Value::Null,
            ErrorObject::invalid_request("expected a JSON object"),
        ));
    }
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| Response::failure(id, ErrorObject::invalid_request(e)))
}

/// Runs a decoded request against the registry.
///
/// A panicking handler is turned into an internal-error response.
pub async fn dispatch(registry: &MethodRegistry, request: Request) -> Response {
    let Request {
        method, params, id, ..
    } = request;
    tracing::debug!(method = %method, id = %id, "Handling request");

    let Some(handler) = registry.get(&method) else {
        tracing::debug!(method = %method, "Method not found");
        return Response::failure(id, ErrorObject::method_not_found(&method));
    };

    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(params))) {
        Ok(pending) => AssertUnwindSafe(pending).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    match outcome {
        Ok(Ok(result)) => Response::success(id, result),
        Ok(Err(error)) => {
            tracing::debug!(method = %method, code = error.code, "Request failed");
            Response::failure(id, error)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(method = %method, panic = %message, "Handler panicked");
            Response::failure(id, ErrorObject::internal(format!("handler panic: {}", message)))
        }
    }
}

/// Decodes and dispatches one line.
pub async fn handle_line(registry: &MethodRegistry, line: &[u8]) -> Response {
    match decode_request(line) {
        Ok(request) => dispatch(registry, request).await,
        Err(response) => response,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
