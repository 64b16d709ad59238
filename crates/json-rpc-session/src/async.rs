use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::{CallError, JsonRpcErrorObject, SessionError};
use crate::response::ResponseResult;
use crate::session::{CallHandler, Completion, Session};
use crate::types::{Params, RequestId};

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    /// Convert this error to a JSON-RPC error object
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

impl ToJsonRpcError for JsonRpcErrorObject {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        self.clone()
    }
}

/// Trait for handling JSON-RPC method calls asynchronously
#[async_trait]
pub trait JsonRpcHandler: Send + Sync + 'static {
    /// The error type returned by this handler
    type Error: ToJsonRpcError;

    /// Handle a call that expects a reply
    async fn handle(&self, session: Session, method: &str, params: Params) -> Result<Value, Self::Error>;

    /// Handle a notification (optional - default does nothing)
    async fn handle_notification(
        &self,
        session: Session,
        method: &str,
        params: Params,
    ) -> Result<(), Self::Error> {
        let _ = (session, method, params);
        Ok(())
    }
}

/// Runs a [`JsonRpcHandler`] on a tokio runtime and answers through the completion.
///
/// The session's state lock is only held while the task is spawned, so a slow
/// handler never stalls other inbound messages.
pub struct AsyncCallHandler<H> {
    handler: Arc<H>,
    runtime: Handle,
}

impl<H: JsonRpcHandler> AsyncCallHandler<H> {
    /// Must be called from within a tokio runtime
    pub fn new(handler: H) -> Self {
        Self::with_runtime(handler, Handle::current())
    }

    pub fn with_runtime(handler: H, runtime: Handle) -> Self {
        Self {
            handler: Arc::new(handler),
            runtime,
        }
    }
}

impl<H: JsonRpcHandler> CallHandler for AsyncCallHandler<H> {
    fn handle_call(
        &self,
        session: &Session,
        method: &str,
        params: Params,
        completion: Completion,
    ) -> Result<(), CallError> {
        let handler = self.handler.clone();
        let session = session.clone();
        let method = method.to_string();

        self.runtime.spawn(async move {
            if completion.is_notification() {
                if let Err(e) = handler.handle_notification(session, &method, params).await {
                    tracing::debug!(method = %method, error = %e, "Notification handler failed");
                }
                return;
            }

            let outcome = handler
                .handle(session, &method, params)
                .await
                .map(ResponseResult::from)
                .map_err(|e| e.to_error_object());
            completion.complete(outcome);
        });
        Ok(())
    }
}

impl Session {
    /// Send a request and wait for its outcome.
    ///
    /// There is no per-request timeout; wrap the future in `tokio::time::timeout`
    /// if needed. The pending entry stays until a response arrives or the session
    /// closes.
    pub async fn call<P: Serialize>(&self, method: &str, params: P) -> Result<ResponseResult, SessionError> {
        let (sender, receiver) = oneshot::channel();
        self.send_request(method, params, move |outcome| {
            let _ = sender.send(outcome);
        })?;

        match receiver.await {
            Ok(outcome) => outcome.map_err(SessionError::Rpc),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Like [`Session::call`] but also reports the request id once allocated
    pub async fn call_with_id<P: Serialize>(
        &self,
        method: &str,
        params: P,
        on_sent: impl FnOnce(RequestId),
    ) -> Result<ResponseResult, SessionError> {
        let (sender, receiver) = oneshot::channel();
        let id = self.send_request(method, params, move |outcome| {
            let _ = sender.send(outcome);
        })?;
        on_sent(id);

        match receiver.await {
            Ok(outcome) => outcome.map_err(SessionError::Rpc),
            Err(_) => Err(SessionError::Closed),
        }
    }
}
