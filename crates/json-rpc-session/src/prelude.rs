//! # JSON-RPC Session Prelude
//!
//! This module provides convenient re-exports of the most commonly used types
//! from the session library.
//!
//! ```rust
//! use json_rpc_session::prelude::*;
//! ```

// Core JSON-RPC types
pub use crate::error::{CallError, JsonRpcErrorCode, JsonRpcErrorObject, SessionError};
pub use crate::response::ResponseResult;
pub use crate::types::{Params, RequestId};

// Session engine
pub use crate::config::{FrameKind, SessionConfig};
pub use crate::dispatch::MethodRouter;
pub use crate::session::{CallHandler, Completion, Session};
pub use crate::transport::{ChannelTransport, OutboundFrame, Transport};

#[cfg(feature = "async")]
pub use crate::r#async::{AsyncCallHandler, JsonRpcHandler, ToJsonRpcError};

// Standard error codes
pub use crate::error_codes::*;
