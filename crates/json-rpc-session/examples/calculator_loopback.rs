//! Calculator over a loopback connection
//!
//! Two sessions are wired back to back with in-memory channels. The "server"
//! session answers `add` and `divide`; the "client" session calls it and prints
//! the outcomes, including a rejected division by zero.

use std::sync::Arc;

use async_trait::async_trait;
use json_rpc_session::{
    AsyncCallHandler, ChannelTransport, JsonRpcErrorObject, JsonRpcHandler, MethodRouter,
    OutboundFrame, Params, Session, SessionConfig, ToJsonRpcError,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, thiserror::Error)]
enum CalculatorError {
    #[error("Parameter '{0}' is required and must be a number")]
    MissingOperand(&'static str),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

impl ToJsonRpcError for CalculatorError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            CalculatorError::MissingOperand(_) => JsonRpcErrorObject::invalid_params(&self.to_string()),
            CalculatorError::DivisionByZero => {
                JsonRpcErrorObject::server_error(-32010, &self.to_string(), None)
            }
            CalculatorError::UnknownMethod(method) => JsonRpcErrorObject::method_not_found(method),
        }
    }
}

struct Calculator;

fn operand(params: &Params, name: &'static str) -> Result<f64, CalculatorError> {
    params
        .get(name)
        .and_then(Value::as_f64)
        .ok_or(CalculatorError::MissingOperand(name))
}

#[async_trait]
impl JsonRpcHandler for Calculator {
    type Error = CalculatorError;

    async fn handle(&self, _session: Session, method: &str, params: Params) -> Result<Value, Self::Error> {
        let a = operand(&params, "a")?;
        let b = operand(&params, "b")?;
        match method {
            "add" => Ok(json!(a + b)),
            "divide" if b == 0.0 => Err(CalculatorError::DivisionByZero),
            "divide" => Ok(json!(a / b)),
            _ => Err(CalculatorError::UnknownMethod(method.to_string())),
        }
    }
}

/// Deliver every frame one session writes to the other session
fn pump(mut outbound: UnboundedReceiver<OutboundFrame>, peer: Session) {
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame.payload() {
                Some(bytes) => peer.receive_message(bytes),
                None => {
                    peer.close();
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (server_transport, server_outbound) = ChannelTransport::new();
    let (client_transport, client_outbound) = ChannelTransport::new();

    let server = Session::with_shared_handler(
        server_transport,
        Arc::new(AsyncCallHandler::new(Calculator)),
        SessionConfig::default(),
    );
    let client = Session::new(client_transport, MethodRouter::new(), SessionConfig::default());

    pump(server_outbound, client.clone());
    pump(client_outbound, server.clone());

    let sum = client.call("add", json!({"a": 2, "b": 3.5})).await?;
    println!("add(2, 3.5) = {}", sum.into_value());

    let quotient = client.call("divide", json!({"a": 10, "b": 4})).await?;
    println!("divide(10, 4) = {}", quotient.into_value());

    match client.call("divide", json!({"a": 1, "b": 0})).await {
        Ok(value) => println!("divide(1, 0) unexpectedly returned {:?}", value),
        Err(e) => println!("divide(1, 0) failed: {}", e),
    }

    match client.call("add", json!({"a": 1})).await {
        Ok(value) => println!("add(1) unexpectedly returned {:?}", value),
        Err(e) => println!("add(1) failed: {}", e),
    }

    server.disconnect();
    client.disconnect();
    Ok(())
}
