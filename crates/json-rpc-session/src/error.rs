use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error_codes;

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64), // -32099 to -32000
    /// Local: a handler failed synchronously with a non-JSON-RPC error
    UnhandledCall,
    /// Local: a response could not be encoded or written
    EncodeFailure,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::ServerError(code) => *code,
            JsonRpcErrorCode::UnhandledCall => error_codes::UNHANDLED_CALL_ERROR,
            JsonRpcErrorCode::EncodeFailure => error_codes::ENCODE_FAILURE,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
            JsonRpcErrorCode::UnhandledCall => "Unhandled error encountered during call",
            JsonRpcErrorCode::EncodeFailure => "Could not encode response",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object, as carried in the `error` member of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error(data: impl Into<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, Some(data.into()))
    }

    pub fn invalid_request(data: impl Into<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, Some(data.into()))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not found", method)),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams,
            Some(message.to_string()),
            None,
        )
    }

    pub fn internal_error(data: impl Into<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, None, Some(data.into()))
    }

    /// The error every pending completion receives when its session closes
    pub fn session_closed() -> Self {
        Self::internal_error("Session closed")
    }

    pub fn unhandled_call(detail: impl Into<Value>) -> Self {
        Self::new(JsonRpcErrorCode::UnhandledCall, None, Some(detail.into()))
    }

    pub fn encode_failure(detail: impl Into<Value>) -> Self {
        Self::new(JsonRpcErrorCode::EncodeFailure, None, Some(detail.into()))
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        assert!(
            (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }

    /// Build an error from the `error` member of a peer's response.
    ///
    /// Peers are not trusted to send a well-formed error object: a missing or
    /// mistyped `code` falls back to `INTERNAL_ERROR`, a missing `message` to the
    /// generic text, and a non-object value is kept whole in `data`.
    pub fn from_json(value: &Value) -> Self {
        match value.as_object() {
            Some(obj) => Self {
                code: obj
                    .get("code")
                    .and_then(Value::as_i64)
                    .unwrap_or(error_codes::INTERNAL_ERROR),
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
                data: obj.get("data").cloned(),
            },
            None => Self::new(
                JsonRpcErrorCode::InternalError,
                Some("Malformed error object".to_string()),
                Some(value.clone()),
            ),
        }
    }

    pub fn is_session_closed(&self) -> bool {
        self.code == error_codes::INTERNAL_ERROR
            && self.data.as_ref().and_then(Value::as_str) == Some("Session closed")
    }
}

/// Synchronous failure returned by a call handler.
///
/// A [`JsonRpcErrorObject`] is sent to the peer as-is; anything else is wrapped in
/// the local "Unhandled error encountered during call" envelope.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Rpc(#[from] JsonRpcErrorObject),

    #[error("{0}")]
    Unhandled(Box<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    pub fn unhandled(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unhandled(error.into())
    }

    /// The error object to send back to the peer
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            CallError::Rpc(error) => error.clone(),
            CallError::Unhandled(error) => JsonRpcErrorObject::unhandled_call(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for CallError {
    fn from(error: serde_json::Error) -> Self {
        Self::Rpc(JsonRpcErrorObject::invalid_params(&error.to_string()))
    }
}

/// Transport-level errors (no protocol logic)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport send failed: {0}")]
    Send(String),

    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Errors raised while assembling a message from transport fragments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooBig { size: usize, limit: usize },
}

/// Errors from the outbound send path
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Session closed")]
    Closed,

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Rpc(#[from] JsonRpcErrorObject),
}

impl SessionError {
    /// The local error a pending completion receives when its request could not be sent
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            SessionError::Closed => JsonRpcErrorObject::session_closed(),
            SessionError::Rpc(error) => error.clone(),
            other => JsonRpcErrorObject::internal_error(other.to_string()),
        }
    }
}
