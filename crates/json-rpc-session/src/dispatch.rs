//! Method-name routing for inbound calls

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CallError, JsonRpcErrorObject};
use crate::session::{CallHandler, Completion, Session};
use crate::types::Params;

type MethodFn = dyn Fn(&Session, Params, Completion) -> Result<(), CallError> + Send + Sync;

/// Call handler that routes by method name.
///
/// Unregistered methods go to the default handler when one is set; otherwise
/// requests are answered with "Method not found" and notifications are ignored.
#[derive(Default, Clone)]
pub struct MethodRouter {
    handlers: HashMap<String, Arc<MethodFn>>,
    default_handler: Option<Arc<dyn CallHandler>>,
}

impl MethodRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific method
    pub fn register_method<F>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Fn(&Session, Params, Completion) -> Result<(), CallError> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    pub fn with_method<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Session, Params, Completion) -> Result<(), CallError> + Send + Sync + 'static,
    {
        self.register_method(method, handler);
        self
    }

    /// Set a default handler for unregistered methods
    pub fn set_default_handler<H: CallHandler>(&mut self, handler: H) {
        self.default_handler = Some(Arc::new(handler));
    }

    pub fn with_default_handler<H: CallHandler>(mut self, handler: H) -> Self {
        self.set_default_handler(handler);
        self
    }

    /// Get all registered methods
    pub fn registered_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl CallHandler for MethodRouter {
    fn handle_call(
        &self,
        session: &Session,
        method: &str,
        params: Params,
        completion: Completion,
    ) -> Result<(), CallError> {
        if let Some(handler) = self.handlers.get(method) {
            return handler(session, params, completion);
        }

        match &self.default_handler {
            Some(handler) => handler.handle_call(session, method, params, completion),
            None if completion.is_notification() => {
                tracing::debug!(method = %method, "Ignoring notification for unknown method");
                Ok(())
            }
            None => Err(JsonRpcErrorObject::method_not_found(method).into()),
        }
    }
}
