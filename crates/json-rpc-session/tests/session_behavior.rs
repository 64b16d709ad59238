//! Behavioral tests for the session engine
//!
//! Each test drives a session through raw inbound bytes and inspects exactly what
//! it wrote to the transport.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use json_rpc_session::error_codes;
use json_rpc_session::{
    CallError, CallHandler, Completion, JsonRpcErrorObject, OutboundFrame, Params,
    ResponseResult, Session, SessionConfig, Transport, TransportError,
};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct RecordingTransport {
    frames: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl RecordingTransport {
    fn messages(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(OutboundFrame::payload)
            .map(|bytes| serde_json::from_slice(bytes).expect("outbound frame is JSON"))
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(OutboundFrame::Close);
        Ok(())
    }
}

/// Answers by method name; `defer` replies from another thread
struct TestHandler {
    calls: Arc<AtomicUsize>,
}

impl CallHandler for TestHandler {
    fn handle_call(
        &self,
        _session: &Session,
        method: &str,
        params: Params,
        completion: Completion,
    ) -> Result<(), CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "ping" => {
                completion.resolve(json!("pong"));
                Ok(())
            }
            "echo" => {
                completion.resolve(params.get("value").cloned().unwrap_or(Value::Null));
                Ok(())
            }
            "reject" => {
                completion.reject(JsonRpcErrorObject::server_error(-32001, "rejected", None));
                Ok(())
            }
            "defer" => {
                thread::spawn(move || completion.resolve(json!("later")))
                    .join()
                    .unwrap();
                Ok(())
            }
            "fail" => Err(CallError::unhandled("backend unavailable")),
            _ => Err(JsonRpcErrorObject::method_not_found(method).into()),
        }
    }
}

fn new_session() -> (Session, RecordingTransport, Arc<AtomicUsize>) {
    let transport = RecordingTransport::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = TestHandler {
        calls: calls.clone(),
    };
    let session = Session::new(transport.clone(), handler, SessionConfig::default());
    (session, transport, calls)
}

type Outcomes = Arc<Mutex<Vec<(i64, Result<ResponseResult, JsonRpcErrorObject>)>>>;

fn record_into(outcomes: &Outcomes, tag: i64) -> impl FnOnce(Result<ResponseResult, JsonRpcErrorObject>) + Send + 'static {
    let outcomes = outcomes.clone();
    move |outcome| outcomes.lock().unwrap().push((tag, outcome))
}

#[test]
fn test_ping_scenario() {
    let (session, transport, _) = new_session();

    session.receive_message(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);

    assert_eq!(
        transport.messages(),
        vec![json!({"jsonrpc": "2.0", "id": 1, "result": "pong"})]
    );
}

#[test]
fn test_every_request_gets_exactly_one_matching_response() {
    let (session, transport, _) = new_session();
    let requests = [
        (json!(10), "ping"),
        (json!("str-id"), "reject"),
        (json!(12), "defer"),
        (json!(13), "fail"),
        (json!(14), "no-such-method"),
        (json!(null), "ping"),
    ];

    for (id, method) in &requests {
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method});
        session.receive_message(message.to_string().as_bytes());
    }

    let messages = transport.messages();
    assert_eq!(messages.len(), requests.len());
    for ((id, _), reply) in requests.iter().zip(&messages) {
        let reply = reply.as_object().unwrap();
        assert_eq!(reply.get("id"), Some(id));
        assert_eq!(reply.get("jsonrpc"), Some(&json!("2.0")));
        assert!(reply.contains_key("result") ^ reply.contains_key("error"));
    }

    assert_eq!(messages[1]["error"]["code"], json!(-32001));
    assert_eq!(messages[2]["result"], json!("later"));
    assert_eq!(messages[3]["error"]["code"], json!(error_codes::UNHANDLED_CALL_ERROR));
    assert_eq!(messages[3]["error"]["data"], json!("backend unavailable"));
    assert_eq!(messages[4]["error"]["code"], json!(error_codes::METHOD_NOT_FOUND));
}

#[test]
fn test_notifications_never_produce_a_reply() {
    let (session, transport, calls) = new_session();

    session.receive_message(br#"{"jsonrpc":"2.0","method":"fire-and-forget"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","method":"ping"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","method":"reject"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","method":"fail"}"#);
    session.receive_message(br#"{"jsonrpc":"1.0","method":"ping"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","method":42}"#);

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(transport.messages().is_empty());
}

#[test]
fn test_wrong_or_missing_version_preserves_id() {
    let (session, transport, calls) = new_session();

    session.receive_message(br#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#);
    session.receive_message(br#"{"id":"six","method":"ping"}"#);

    let messages = transport.messages();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["id"], json!(5));
    assert_eq!(messages[0]["error"]["code"], json!(error_codes::INVALID_REQUEST));
    assert_eq!(messages[1]["id"], json!("six"));
    assert_eq!(messages[1]["error"]["code"], json!(error_codes::INVALID_REQUEST));
}

#[test]
fn test_invalid_messages_without_id_are_answered_with_null_id() {
    let (session, transport, calls) = new_session();
    let outcomes: Outcomes = Arc::default();
    session.send_request("outstanding", (), record_into(&outcomes, 0)).unwrap();

    session.receive_message(br#"{"jsonrpc":"2.0","result":1}"#);
    session.receive_message(br#"{"jsonrpc":"2.0"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"busy"}}"#);

    let messages = transport.messages();
    let replies = &messages[1..];
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(replies.len(), 3);
    for reply in replies {
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], json!(error_codes::INVALID_REQUEST));
    }
    assert_eq!(replies[1]["error"]["data"], json!("message is neither request nor response"));
    assert_eq!(session.pending_count(), 1);
    assert!(outcomes.lock().unwrap().is_empty());
}

#[test]
fn test_parse_error_is_answered_with_null_id() {
    let (session, transport, _) = new_session();

    session.receive_message(b"{not json");

    let messages = transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], Value::Null);
    assert_eq!(messages[0]["error"]["code"], json!(error_codes::PARSE_ERROR));
    assert!(messages[0]["error"]["data"].is_string());
}

#[test]
fn test_unknown_response_id_is_rejected_without_side_effects() {
    let (session, transport, _) = new_session();
    let outcomes: Outcomes = Arc::default();
    session
        .send_request("outstanding", (), record_into(&outcomes, 0))
        .unwrap();

    session.receive_message(br#"{"jsonrpc":"2.0","id":7,"result":null}"#);

    let messages = transport.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["id"], json!(7));
    assert_eq!(messages[1]["error"]["code"], json!(error_codes::INVALID_REQUEST));
    assert_eq!(
        messages[1]["error"]["data"],
        json!("response ID does not correspond to any open request")
    );
    assert_eq!(session.pending_count(), 1);
    assert!(outcomes.lock().unwrap().is_empty());

    // The session keeps working afterwards
    session.receive_message(br#"{"jsonrpc":"2.0","id":0,"result":"done"}"#);
    assert_eq!(session.pending_count(), 0);
    assert_eq!(outcomes.lock().unwrap().len(), 1);
}

#[test]
fn test_already_resolved_response_is_rejected() {
    let (session, transport, _) = new_session();
    let outcomes: Outcomes = Arc::default();
    session.send_request("once", (), record_into(&outcomes, 0)).unwrap();

    session.receive_message(br#"{"jsonrpc":"2.0","id":0,"result":1}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","id":0,"result":2}"#);

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1, Ok(ResponseResult::Success(json!(1))));
    assert_eq!(transport.messages().last().unwrap()["error"]["code"], json!(error_codes::INVALID_REQUEST));
}

#[test]
fn test_response_outcomes_reach_callbacks() {
    let (session, _transport, _) = new_session();
    let outcomes: Outcomes = Arc::default();
    for tag in 0..3 {
        session
            .send_request("work", json!({"n": tag}), record_into(&outcomes, tag))
            .unwrap();
    }

    session.receive_message(br#"{"jsonrpc":"2.0","id":2,"result":{"deep":[1,{"x":null}]}}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","id":0,"result":null}"#);
    session.receive_message(
        br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad n","data":{"n":1}}}"#,
    );

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes[0], (2, Ok(ResponseResult::Success(json!({"deep": [1, {"x": null}]})))));
    assert_eq!(outcomes[1], (0, Ok(ResponseResult::Null)));
    let (tag, outcome) = &outcomes[2];
    assert_eq!(*tag, 1);
    let error = outcome.as_ref().unwrap_err();
    assert_eq!(error.code, error_codes::INVALID_PARAMS);
    assert_eq!(error.message, "bad n");
    assert_eq!(error.data, Some(json!({"n": 1})));
}

#[test]
fn test_outbound_wire_format() {
    let (session, transport, _) = new_session();

    let id = session
        .send_request("subtract", json!({"minuend": 42, "subtrahend": 23}), |_| {})
        .unwrap();
    session.send_notification("update", json!({"items": [1, 2]})).unwrap();
    session.send_notification("heartbeat", ()).unwrap();

    assert_eq!(id, 0);
    assert_eq!(
        transport.messages(),
        vec![
            json!({"jsonrpc": "2.0", "id": 0, "method": "subtract", "params": {"minuend": 42, "subtrahend": 23}}),
            json!({"jsonrpc": "2.0", "method": "update", "params": {"items": [1, 2]}}),
            json!({"jsonrpc": "2.0", "method": "heartbeat"}),
        ]
    );
    assert_eq!(session.pending_count(), 1);
}

#[test]
fn test_ids_are_strictly_increasing() {
    let (session, _transport, _) = new_session();

    let ids: Vec<i64> = (0..5)
        .map(|_| session.send_request("m", (), |_| {}).unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    // Notifications consume no id
    session.send_notification("n", ()).unwrap();
    assert_eq!(session.send_request("m", (), |_| {}).unwrap(), 5);
}

#[test]
fn test_concurrent_requests_get_distinct_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let (session, transport, _) = new_session();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let session = session.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| session.send_request("concurrent", (), |_| {}).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: Vec<i64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    let unique: HashSet<i64> = ids.iter().copied().collect();

    assert_eq!(ids.len(), THREADS * PER_THREAD);
    assert_eq!(unique.len(), ids.len());
    assert_eq!(unique, (0..(THREADS * PER_THREAD) as i64).collect());
    assert_eq!(session.pending_count(), THREADS * PER_THREAD);

    // Every message reached the wire intact
    let wire_ids: HashSet<i64> = transport
        .messages()
        .iter()
        .map(|message| message["id"].as_i64().unwrap())
        .collect();
    assert_eq!(wire_ids, unique);
}

#[test]
fn test_concurrent_responses_resolve_every_callback() {
    const REQUESTS: i64 = 64;

    let (session, _transport, _) = new_session();
    let resolved = Arc::new(AtomicUsize::new(0));
    for _ in 0..REQUESTS {
        let resolved = resolved.clone();
        session
            .send_request("m", (), move |outcome| {
                assert!(outcome.is_ok());
                resolved.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let session = session.clone();
            thread::spawn(move || {
                for id in (worker..REQUESTS).step_by(4) {
                    let message = json!({"jsonrpc": "2.0", "id": id, "result": id});
                    session.receive_message(message.to_string().as_bytes());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(resolved.load(Ordering::SeqCst), REQUESTS as usize);
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn test_close_resolves_each_pending_completion_once() {
    let (session, transport, _) = new_session();
    let outcomes: Outcomes = Arc::default();
    for tag in 0..5 {
        session.send_request("slow", (), record_into(&outcomes, tag)).unwrap();
    }
    // One of them is answered before the close
    session.receive_message(br#"{"jsonrpc":"2.0","id":3,"result":"ok"}"#);

    session.close();
    session.close();

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 5);
    let closed: Vec<i64> = outcomes
        .iter()
        .filter(|(_, outcome)| outcome.as_ref().is_err_and(JsonRpcErrorObject::is_session_closed))
        .map(|(tag, _)| *tag)
        .collect();
    assert_eq!(closed, vec![0, 1, 2, 4]);
    assert_eq!(session.pending_count(), 0);

    // Close never writes to the transport
    assert_eq!(transport.messages().len(), 5);
}

#[test]
fn test_close_with_nothing_pending() {
    let (session, transport, _) = new_session();
    session.close();
    assert!(session.is_closed());
    assert!(transport.frames.lock().unwrap().is_empty());
}

#[test]
fn test_completion_can_answer_after_handler_returns() {
    let transport = RecordingTransport::default();
    let parked: Arc<Mutex<Option<Completion>>> = Arc::default();

    struct Parking(Arc<Mutex<Option<Completion>>>);
    impl CallHandler for Parking {
        fn handle_call(
            &self,
            _session: &Session,
            _method: &str,
            _params: Params,
            completion: Completion,
        ) -> Result<(), CallError> {
            *self.0.lock().unwrap() = Some(completion);
            Ok(())
        }
    }

    let session = Session::new(transport.clone(), Parking(parked.clone()), SessionConfig::default());
    session.receive_message(br#"{"jsonrpc":"2.0","id":"p","method":"park"}"#);
    assert!(transport.messages().is_empty());

    let completion = parked.lock().unwrap().take().unwrap();
    assert_eq!(completion.request_id(), Some(&json!("p")));
    completion.resolve(json!(1));

    assert_eq!(transport.messages(), vec![json!({"jsonrpc": "2.0", "id": "p", "result": 1})]);
}

#[test]
fn test_completion_dropped_after_handler_returns_is_answered() {
    let transport = RecordingTransport::default();
    let parked: Arc<Mutex<Vec<Completion>>> = Arc::default();

    struct Holding(Arc<Mutex<Vec<Completion>>>);
    impl CallHandler for Holding {
        fn handle_call(
            &self,
            _session: &Session,
            _method: &str,
            _params: Params,
            completion: Completion,
        ) -> Result<(), CallError> {
            self.0.lock().unwrap().push(completion);
            Ok(())
        }
    }

    let session = Session::new(transport.clone(), Holding(parked.clone()), SessionConfig::default());
    session.receive_message(br#"{"jsonrpc":"2.0","id":"lost","method":"work"}"#);
    session.receive_message(br#"{"jsonrpc":"2.0","method":"work"}"#);
    assert!(transport.messages().is_empty());

    let completions = std::mem::take(&mut *parked.lock().unwrap());
    thread::spawn(move || drop(completions)).join().unwrap();

    let messages = transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], json!("lost"));
    assert_eq!(messages[0]["error"]["code"], json!(error_codes::UNHANDLED_CALL_ERROR));
}

#[test]
fn test_text_frames_when_configured() {
    let transport = RecordingTransport::default();
    let handler = TestHandler {
        calls: Arc::default(),
    };
    let config = SessionConfig::default().with_frame_kind(json_rpc_session::FrameKind::Text);
    let session = Session::new(transport.clone(), handler, config);

    session.receive_message(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);

    let frames = transport.frames.lock().unwrap();
    assert!(matches!(frames.as_slice(), [OutboundFrame::Text(_)]));
}

#[test]
fn test_oversized_message_is_rejected_before_decoding() {
    let (session, transport, calls) = new_session();

    let mut message = br#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"value":""#.to_vec();
    message.resize(json_rpc_session::MAX_MESSAGE_BYTES + 1, b'a');

    session.receive_message(&message);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let frames = transport.frames.lock().unwrap();
    assert_eq!(
        frames.as_slice(),
        [OutboundFrame::Text("Message too big".to_string()), OutboundFrame::Close]
    );
}
