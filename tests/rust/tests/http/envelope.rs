//! Response envelope end-to-end tests

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fmt;
use tests::http::{body_json, get as get_uri, with_middleware};
use tests::{file_records, memory_logger};
use xylitol_core::Level;
use xylitol_web::{Envelope, Reply};

#[derive(Debug)]
struct BadCredentials;

impl fmt::Display for BadCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bad creds")
    }
}

impl std::error::Error for BadCredentials {}

async fn done(reply: Reply) -> Response {
    reply.ok(json!({"a": 1}), "done")
}

async fn login(reply: Reply) -> Response {
    reply.error(401, Some(&BadCredentials), "Invalid username or password")
}

#[tokio::test]
async fn test_ok_body_and_log_lines() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/done", get(done)), logger, false);

    let response = get_uri(app, "/done").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let trace_id = body["requestId"].as_str().unwrap().to_string();
    assert_eq!(trace_id.len(), 36);
    assert_eq!(
        body,
        json!({
            "requestId": trace_id,
            "code": 200,
            "info": "done",
            "msg": "done",
            "data": {"a": 1}
        })
    );
    assert!(body.get("status").is_none());

    let records = file_records(&sinks);
    assert_eq!(records.len(), 2);

    let ret = &records[0];
    assert_eq!(ret.level, "INFO");
    assert_eq!(ret.message, "[Return]/done");
    assert_eq!(ret.field("requestId"), &json!(trace_id));
    assert_eq!(ret.field("code"), &json!(200));
    assert_eq!(ret.field("msg"), &json!("done"));
    assert_eq!(ret.field("info"), &json!("done"));
    assert_eq!(ret.field("status"), &json!(""));
    assert_eq!(ret.field("data"), &json!({"a": 1}));

    let receive = &records[1];
    assert_eq!(receive.message, "[Receive]/done");
    assert_eq!(receive.field("traceId"), &json!(trace_id));
    assert_eq!(receive.field("status"), &json!(200));
}

#[tokio::test]
async fn test_error_envelope_keeps_transport_200() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/login", get(login)), logger, false);

    let response = get_uri(app, "/login").await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Envelope = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(envelope.status, "error");
    assert_eq!(envelope.code, 401);
    assert_eq!(envelope.msg, "Invalid username or password");
    assert_eq!(envelope.info, "bad creds");
    assert!(!envelope.is_success());

    let records = file_records(&sinks);
    let ret = &records[0];
    assert_eq!(ret.level, "ERROR");
    assert_eq!(ret.message, "[Return]/login");
    assert_eq!(ret.field("requestId"), &json!(envelope.trace_id));
    assert_eq!(records[1].field("traceId"), &json!(envelope.trace_id));
}

#[tokio::test]
async fn test_each_response_gets_a_fresh_trace_id() {
    let (logger, _sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/done", get(done)), logger, false);

    let first = body_json(get_uri(app.clone(), "/done").await).await;
    let second = body_json(get_uri(app, "/done").await).await;
    assert_ne!(first["requestId"], second["requestId"]);
}
