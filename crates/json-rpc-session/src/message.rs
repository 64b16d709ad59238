//! Decoding and classification of inbound messages.
//!
//! Validation runs in a fixed order so that failures can still be correlated:
//! the `id` is read first, then the version marker, then the message shape.

use serde_json::{Map, Value};

use crate::error::JsonRpcErrorObject;
use crate::response::ResponseResult;
use crate::types::{JsonRpcVersion, Params, RequestId};

/// A decoded and classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A call from the peer. `id` is `None` for notifications.
    Call {
        id: Option<Value>,
        method: String,
        params: Params,
    },
    /// A response to a request this session issued
    Response {
        id: RequestId,
        outcome: Result<ResponseResult, JsonRpcErrorObject>,
    },
}

/// A message that failed decoding or validation.
///
/// `reply_id` is the id the error envelope must carry, or `None` for a notification
/// (a `method` with no `id` member), which must not be answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reply_id: Option<Value>,
    pub error: JsonRpcErrorObject,
}

impl Rejection {
    fn new(reply_id: Option<Value>, error: JsonRpcErrorObject) -> Self {
        Self { reply_id, error }
    }
}

impl InboundMessage {
    /// Decode one complete message buffer
    pub fn decode(bytes: &[u8]) -> Result<Self, Rejection> {
        // Parse errors are always answered, with a null id
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            Rejection::new(Some(Value::Null), JsonRpcErrorObject::parse_error(e.to_string()))
        })?;

        let Value::Object(obj) = value else {
            return Err(Rejection::new(
                Some(Value::Null),
                JsonRpcErrorObject::parse_error("unrecognized message structure"),
            ));
        };

        let id = obj.get("id").cloned();
        // Only notifications go unanswered; anything else without an id gets `null`
        let reply_id = if obj.contains_key("method") {
            id.clone()
        } else {
            Some(id.clone().unwrap_or(Value::Null))
        };

        if !JsonRpcVersion::matches(obj.get("jsonrpc")) {
            return Err(Rejection::new(
                reply_id,
                JsonRpcErrorObject::invalid_request("unrecognized JSON-RPC version string"),
            ));
        }

        if obj.contains_key("method") {
            Self::decode_call(obj, id)
        } else if obj.contains_key("result") || obj.contains_key("error") {
            Self::decode_response(obj, reply_id)
        } else {
            Err(Rejection::new(
                reply_id,
                JsonRpcErrorObject::invalid_request("message is neither request nor response"),
            ))
        }
    }

    fn decode_call(mut obj: Map<String, Value>, id: Option<Value>) -> Result<Self, Rejection> {
        let method = match obj.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Err(Rejection::new(
                    id,
                    JsonRpcErrorObject::invalid_request("method value missing or not a string"),
                ));
            }
        };

        // Positional or scalar params are not supported; the call still proceeds
        let params = match obj.remove("params") {
            Some(Value::Object(params)) => params,
            Some(Value::Null) | None => Params::new(),
            Some(other) => {
                tracing::debug!(method = %method, params = %other, "Ignoring non-object params");
                Params::new()
            }
        };

        Ok(InboundMessage::Call { id, method, params })
    }

    fn decode_response(mut obj: Map<String, Value>, reply_id: Option<Value>) -> Result<Self, Rejection> {
        let Some(request_id) = reply_id.as_ref().and_then(Value::as_i64) else {
            return Err(Rejection::new(
                reply_id,
                JsonRpcErrorObject::invalid_request("response ID value missing or wrong type"),
            ));
        };

        let outcome = match obj.remove("error") {
            Some(error) if !error.is_null() => Err(JsonRpcErrorObject::from_json(&error)),
            _ => Ok(ResponseResult::from(obj.remove("result"))),
        };

        Ok(InboundMessage::Response {
            id: request_id,
            outcome,
        })
    }

    /// Check if this is a call without an id
    pub fn is_notification(&self) -> bool {
        matches!(self, InboundMessage::Call { id: None, .. })
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            InboundMessage::Call { method, .. } => Some(method),
            InboundMessage::Response { .. } => None,
        }
    }
}
