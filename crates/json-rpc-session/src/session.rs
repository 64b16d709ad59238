//! Session engine
//!
//! A [`Session`] binds one transport connection to one call handler. It owns the
//! outbound ID allocator, the pending-completion table and the inbound pipeline.
//!
//! ## Locking
//!
//! Two independent locks guard disjoint state:
//!
//! - the *state lock* (reentrant) guards `next_id` and the pending table, and
//!   serializes handler invocations and completion callbacks. It is reentrant so a
//!   handler or callback may issue further session operations on the same thread.
//!   Handlers must not block on another thread that is itself waiting for a session
//!   operation.
//! - the *transport lock* guards writes, so messages never interleave on the wire.
//!
//! The transport lock may be taken while the state lock is held, never the other
//! way round, and no user code runs under the transport lock.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::SessionConfig;
use crate::error::{CallError, JsonRpcErrorObject, SessionError};
use crate::message::InboundMessage;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::{JsonRpcResponse, ResponseResult};
use crate::transport::{BoxedTransport, OutboundFrame, Transport};
use crate::types::{Params, RequestId};

/// One-shot continuation for an outbound request
pub type ResponseCallback =
    Box<dyn FnOnce(Result<ResponseResult, JsonRpcErrorObject>) + Send + 'static>;

/// Trait for handling inbound calls
///
/// Implementations answer through `completion`, synchronously or later from any
/// thread. Returning `Err` reports an immediate failure; the session turns it into
/// an error envelope unless the completion was already used.
pub trait CallHandler: Send + Sync + 'static {
    fn handle_call(
        &self,
        session: &Session,
        method: &str,
        params: Params,
        completion: Completion,
    ) -> Result<(), CallError>;
}

#[derive(Default)]
struct SessionState {
    next_id: RequestId,
    pending: HashMap<RequestId, ResponseCallback>,
    closed: bool,
}

impl SessionState {
    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

struct Inner {
    config: SessionConfig,
    handler: Arc<dyn CallHandler>,
    state: ReentrantMutex<RefCell<SessionState>>,
    transport: Mutex<BoxedTransport>,
}

/// A JSON-RPC session bound to one connection.
///
/// Cloning is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    pub fn new<T, H>(transport: T, handler: H, config: SessionConfig) -> Self
    where
        T: Transport + 'static,
        H: CallHandler,
    {
        Self::with_shared_handler(transport, Arc::new(handler), config)
    }

    /// Create a session whose handler is shared with other sessions
    pub fn with_shared_handler<T>(
        transport: T,
        handler: Arc<dyn CallHandler>,
        config: SessionConfig,
    ) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                handler,
                state: ReentrantMutex::new(RefCell::new(SessionState::default())),
                transport: Mutex::new(Box::new(transport)),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Number of outbound requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        let guard = self.inner.state.lock();
        let count = guard.borrow().pending.len();
        count
    }

    pub fn is_closed(&self) -> bool {
        let guard = self.inner.state.lock();
        let closed = guard.borrow().closed;
        closed
    }

    /// Feed one complete inbound message into the session.
    ///
    /// Never fails: every problem is either answered with an error envelope or
    /// logged.
    pub fn receive_message(&self, bytes: &[u8]) {
        let limit = self.inner.config.max_message_bytes;
        if bytes.len() > limit {
            warn!(size = bytes.len(), limit, "Rejecting oversized message");
            self.abort(&self.inner.config.oversize_reason);
            return;
        }

        match InboundMessage::decode(bytes) {
            Ok(InboundMessage::Call { id, method, params }) => {
                self.dispatch_call(id, &method, params);
            }
            Ok(InboundMessage::Response { id, outcome }) => {
                if let Err(error) = self.resolve_response(id, outcome) {
                    debug!(request_id = id, "Response for unknown request");
                    self.send_response(Value::from(id), Err(error));
                }
            }
            Err(rejection) => {
                debug!(error = %rejection.error, "Rejected inbound message");
                match rejection.reply_id {
                    Some(id) => self.send_response(id, Err(rejection.error)),
                    None => debug!("Rejected notification, not replying"),
                }
            }
        }
    }

    fn dispatch_call(&self, id: Option<Value>, method: &str, params: Params) {
        let slot = Arc::new(ReplySlot::default());
        let completion = Completion {
            session: Arc::downgrade(&self.inner),
            id: id.clone(),
            slot: slot.clone(),
        };

        let result = {
            let _guard = self.inner.state.lock();
            self.inner
                .handler
                .handle_call(self, method, params, completion)
        };
        slot.in_handler.store(false, Ordering::SeqCst);

        let Some(id) = id else {
            if let Err(error) = result {
                debug!(method = %method, error = %error, "Notification failed");
            }
            return;
        };

        match result {
            Err(error) if slot.claim() => {
                debug!(method = %method, error = %error, "Call failed synchronously");
                self.send_response(id, Err(error.to_error_object()));
            }
            Err(error) => {
                debug!(method = %method, error = %error, "Call failed after replying; error dropped");
            }
            Ok(()) if slot.abandoned.load(Ordering::SeqCst) && slot.claim() => {
                debug!(method = %method, "Completion dropped without a reply");
                self.send_response(id, Err(JsonRpcErrorObject::unhandled_call(COMPLETION_DROPPED)));
            }
            Ok(()) => {}
        }
    }

    fn resolve_response(
        &self,
        id: RequestId,
        outcome: Result<ResponseResult, JsonRpcErrorObject>,
    ) -> Result<(), JsonRpcErrorObject> {
        let guard = self.inner.state.lock();
        let callback = guard.borrow_mut().pending.remove(&id);
        match callback {
            Some(callback) => {
                callback(outcome);
                Ok(())
            }
            None => Err(JsonRpcErrorObject::invalid_request(
                "response ID does not correspond to any open request",
            )),
        }
    }

    /// Send a request and register `callback` for its response.
    ///
    /// Returns the allocated request ID. `params` must serialize to a JSON object;
    /// a value serializing to `null` (such as `()`) omits the member. If the request
    /// cannot be sent, the callback is invoked once with a local error and the error
    /// is also returned, so no entry is ever left pending.
    pub fn send_request<P, F>(&self, method: &str, params: P, callback: F) -> Result<RequestId, SessionError>
    where
        P: Serialize,
        F: FnOnce(Result<ResponseResult, JsonRpcErrorObject>) + Send + 'static,
    {
        let callback: ResponseCallback = Box::new(callback);

        let params = match encode_params(&params) {
            Ok(params) => params,
            Err(e) => {
                warn!(method = %method, error = %e, "Could not encode request params; not sent");
                self.fail_callback(callback, &e);
                return Err(e);
            }
        };

        let allocated = {
            let guard = self.inner.state.lock();
            let mut state = guard.borrow_mut();
            if state.closed {
                Err(callback)
            } else {
                let id = state.allocate_id();
                state.pending.insert(id, callback);
                Ok(id)
            }
        };

        let id = match allocated {
            Ok(id) => id,
            Err(callback) => {
                debug!(method = %method, "Request on closed session");
                let e = SessionError::Closed;
                self.fail_callback(callback, &e);
                return Err(e);
            }
        };

        let request = JsonRpcRequest::new(id, method, params);
        if let Err(e) = self.write_message(&request) {
            warn!(method = %method, request_id = id, error = %e, "Could not send request");
            let guard = self.inner.state.lock();
            let callback = guard.borrow_mut().pending.remove(&id);
            if let Some(callback) = callback {
                callback(Err(e.to_error_object()));
            }
            return Err(e);
        }

        debug!(method = %method, request_id = id, "Sent request");
        Ok(id)
    }

    /// Send a notification; no reply is expected and nothing is registered
    pub fn send_notification<P: Serialize>(&self, method: &str, params: P) -> Result<(), SessionError> {
        let params = encode_params(&params).inspect_err(|e| {
            warn!(method = %method, error = %e, "Could not encode notification params; not sent");
        })?;

        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let notification = JsonRpcNotification::new(method, params);
        self.write_message(&notification).inspect_err(|e| {
            warn!(method = %method, error = %e, "Could not send notification");
        })?;
        debug!(method = %method, "Sent notification");
        Ok(())
    }

    /// Resolve every pending completion with "Session closed".
    ///
    /// The transport calls this once when the connection ends; later calls do
    /// nothing. Requests sent afterwards fail immediately.
    pub fn close(&self) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if state.closed {
            return;
        }
        state.closed = true;
        let drained = std::mem::take(&mut state.pending);
        drop(state);

        if drained.is_empty() {
            debug!("Session closed");
            return;
        }

        warn!(pending = drained.len(), "Session was closed with pending requests");
        let mut drained: Vec<_> = drained.into_iter().collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        for (_, callback) in drained {
            callback(Err(JsonRpcErrorObject::session_closed()));
        }
    }

    /// Send `reason` as a text frame, then close the transport
    pub fn abort(&self, reason: &str) {
        let mut transport = self.inner.transport.lock();
        if let Err(e) = transport.send(OutboundFrame::Text(reason.to_string())) {
            debug!(error = %e, "Could not send abort reason");
        }
        if let Err(e) = transport.close() {
            debug!(error = %e, "Could not close transport");
        }
    }

    /// Close the transport without a reason frame
    pub fn disconnect(&self) {
        if let Err(e) = self.inner.transport.lock().close() {
            debug!(error = %e, "Could not close transport");
        }
    }

    fn fail_callback(&self, callback: ResponseCallback, error: &SessionError) {
        let _guard = self.inner.state.lock();
        callback(Err(error.to_error_object()));
    }

    fn send_response(&self, id: Value, outcome: Result<ResponseResult, JsonRpcErrorObject>) {
        let response = JsonRpcResponse::from_outcome(id, outcome);
        if let Err(first) = self.write_message(&response) {
            self.report_encode_failure(response.id, first);
        }
    }

    fn report_encode_failure(&self, id: Value, first: SessionError) {
        warn!(error = %first, "Could not encode response; sending failure envelope");
        let fallback = JsonRpcResponse::error(id, JsonRpcErrorObject::encode_failure(first.to_string()));
        if let Err(second) = self.write_message(&fallback) {
            error!(
                initial_error = %first,
                secondary_error = %second,
                "Failure to report failure to encode response; reply dropped"
            );
        }
    }

    fn write_message<T: Serialize>(&self, message: &T) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(message)?;
        let frame = OutboundFrame::message(self.inner.config.frame_kind, bytes);
        self.inner.transport.lock().send(frame)?;
        Ok(())
    }
}

fn encode_params<P: Serialize>(params: &P) -> Result<Option<Params>, SessionError> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(SessionError::InvalidParams(format!(
            "params must be a JSON object, got {}",
            other
        ))),
    }
}

const COMPLETION_DROPPED: &str = "completion dropped without a reply";

/// Reply bookkeeping shared by a [`Completion`] and the pipeline that created it
struct ReplySlot {
    replied: AtomicBool,
    in_handler: AtomicBool,
    abandoned: AtomicBool,
}

impl Default for ReplySlot {
    fn default() -> Self {
        Self {
            replied: AtomicBool::new(false),
            in_handler: AtomicBool::new(true),
            abandoned: AtomicBool::new(false),
        }
    }
}

impl ReplySlot {
    /// True for exactly one caller
    fn claim(&self) -> bool {
        !self.replied.swap(true, Ordering::AcqRel)
    }
}

/// One-shot continuation for an inbound call.
///
/// Consuming methods make a second answer impossible; an answer given after the
/// handler already failed synchronously is dropped. Answers to notifications are
/// discarded. Dropping an unanswered completion of a request replies with the
/// "Unhandled error encountered during call" error, so the peer is never left
/// waiting.
pub struct Completion {
    session: Weak<Inner>,
    id: Option<Value>,
    slot: Arc<ReplySlot>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("replied", &self.slot.replied.load(Ordering::Acquire))
            .finish()
    }
}

impl Completion {
    /// The id the reply will carry, `None` for notifications
    pub fn request_id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn complete(self, outcome: Result<ResponseResult, JsonRpcErrorObject>) {
        self.deliver(|session, id| session.send_response(id, outcome));
    }

    pub fn resolve(self, result: impl Into<ResponseResult>) {
        self.complete(Ok(result.into()));
    }

    pub fn reject(self, error: JsonRpcErrorObject) {
        self.complete(Err(error));
    }

    /// Answer with any serializable value.
    ///
    /// A value that cannot be represented as JSON is reported to the peer with the
    /// "Could not encode response" error.
    pub fn respond<T: Serialize + ?Sized>(self, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.resolve(value),
            Err(e) => self.deliver(|session, id| session.report_encode_failure(id, e.into())),
        }
    }

    fn deliver(mut self, send: impl FnOnce(&Session, Value)) {
        let Some(id) = self.id.take() else {
            return;
        };
        if !self.slot.claim() {
            debug!(request_id = %id, "Call already answered; reply dropped");
            return;
        }
        match self.session.upgrade() {
            Some(inner) => send(&Session { inner }, id),
            None => debug!(request_id = %id, "Session gone; reply dropped"),
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        self.slot.abandoned.store(true, Ordering::SeqCst);
        // Still inside the handler: the pipeline answers once it returns
        if self.slot.in_handler.load(Ordering::SeqCst) || !self.slot.claim() {
            return;
        }
        match self.session.upgrade() {
            Some(inner) => {
                debug!(request_id = %id, "Completion dropped without a reply");
                Session { inner }.send_response(id, Err(JsonRpcErrorObject::unhandled_call(COMPLETION_DROPPED)));
            }
            None => debug!(request_id = %id, "Session gone; reply dropped"),
        }
    }
}
