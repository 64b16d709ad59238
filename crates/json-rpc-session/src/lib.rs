//! # JSON-RPC 2.0 Session Engine
//!
//! A bidirectional JSON-RPC 2.0 session bound to one message-oriented, full-duplex
//! connection. Either peer may issue calls and notifications; the session correlates
//! responses to outstanding requests and dispatches inbound calls to an injected handler.
//!
//! ## Features
//! - Request/notification framing and the JSON-RPC error taxonomy
//! - Session-scoped, strictly increasing request IDs with a pending-completion table
//! - Independent locks for session state and transport writes
//! - Guaranteed resolution of pending completions when the session closes
//! - Method routing, async adapters (`async` feature) and a WebSocket driver
//!   (`websocket` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use json_rpc_session::{ChannelTransport, MethodRouter, Session, SessionConfig};
//! use serde_json::json;
//!
//! let (transport, _outbound) = ChannelTransport::new();
//! let router = MethodRouter::new().with_method("ping", |_session, _params, completion| {
//!     completion.resolve(json!("pong"));
//!     Ok(())
//! });
//! let session = Session::new(transport, router, SessionConfig::default());
//! session.receive_message(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
//! session.close();
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(feature = "async")]
pub mod r#async;

#[cfg(feature = "websocket")]
pub mod websocket;

pub mod prelude;

// Re-export main types
pub use config::{FrameKind, SessionConfig};
pub use dispatch::MethodRouter;
pub use error::{
    CallError, FramingError, JsonRpcErrorCode, JsonRpcErrorObject, SessionError, TransportError,
};
pub use framing::MessageAssembler;
pub use message::InboundMessage;
pub use notification::JsonRpcNotification;
pub use request::JsonRpcRequest;
pub use response::{JsonRpcResponse, ResponseResult};
pub use session::{CallHandler, Completion, ResponseCallback, Session};
pub use transport::{BoxedTransport, ChannelTransport, OutboundFrame, Transport};
pub use types::{JsonRpcVersion, Params, RequestId};

#[cfg(feature = "async")]
pub use r#async::{AsyncCallHandler, JsonRpcHandler, ToJsonRpcError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Largest message, in bytes, a session accepts from its peer
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// JSON-RPC error codes used by the session
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    // Local codes for the session's own failure envelopes
    pub const UNHANDLED_CALL_ERROR: i64 = 1;
    pub const ENCODE_FAILURE: i64 = 2;
}
