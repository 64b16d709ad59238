use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcErrorObject;
use crate::types::JsonRpcVersion;

/// Result data for a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseResult {
    /// Success result with data
    Success(Value),
    /// Null result (for void methods)
    Null,
}

impl ResponseResult {
    pub fn success(value: Value) -> Self {
        ResponseResult::from(value)
    }

    pub fn null() -> Self {
        ResponseResult::Null
    }

    pub fn is_null(&self) -> bool {
        match self {
            ResponseResult::Null => true,
            ResponseResult::Success(value) => value.is_null(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ResponseResult::Success(value) => Some(value),
            ResponseResult::Null => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ResponseResult::Success(value) => value,
            ResponseResult::Null => Value::Null,
        }
    }
}

impl From<Value> for ResponseResult {
    fn from(value: Value) -> Self {
        if value.is_null() {
            ResponseResult::Null
        } else {
            ResponseResult::Success(value)
        }
    }
}

impl From<Option<Value>> for ResponseResult {
    fn from(value: Option<Value>) -> Self {
        value.map(ResponseResult::from).unwrap_or(ResponseResult::Null)
    }
}

impl From<()> for ResponseResult {
    fn from(_: ()) -> Self {
        ResponseResult::Null
    }
}

/// A response envelope: `id` plus exactly one of `result` or `error`.
///
/// The `id` is whatever the peer sent (or `null`), so it is kept as a raw value.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResponseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: ResponseResult) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_outcome(id: Value, outcome: Result<ResponseResult, JsonRpcErrorObject>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::error(id, error),
        }
    }

    pub fn result(&self) -> Option<&ResponseResult> {
        self.result.as_ref()
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        self.error.as_ref()
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
