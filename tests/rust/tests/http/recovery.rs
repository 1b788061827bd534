//! Panic recovery end-to-end tests

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io;
use tests::http::{body_bytes, get as get_uri, with_middleware};
use tests::{file_records, memory_logger, LogLine};
use xylitol_core::Level;
use xylitol_web::{PeerDisconnected, TAG_RECOVERY};

async fn boom() -> Response {
    panic!("index out of range")
}

async fn hang_up() -> Response {
    std::panic::panic_any(io::Error::new(
        io::ErrorKind::Other,
        "write tcp 127.0.0.1:8080: write: broken pipe",
    ))
}

async fn fail_with_error() -> Response {
    let err: Box<dyn std::error::Error + Send + Sync> = "ledger is locked".into();
    std::panic::panic_any(err)
}

async fn fine() -> &'static str {
    "fine"
}

fn errors(records: &[LogLine]) -> Vec<&LogLine> {
    records.iter().filter(|r| r.level == "ERROR").collect()
}

#[tokio::test]
async fn test_general_panic_is_500_with_no_body() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/boom", get(boom)), logger, false);

    let response = get_uri(app, "/boom").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());

    let records = file_records(&sinks);
    let errors = errors(&records);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, TAG_RECOVERY);
    assert_eq!(errors[0].field("error"), &json!("index out of range"));
    assert!(errors[0]
        .field("request")
        .as_str()
        .unwrap()
        .starts_with("GET /boom HTTP/1.1"));
    assert!(errors[0].field("stack").is_null());

    let receive = records.iter().find(|r| r.message == "[Receive]/boom").unwrap();
    assert_eq!(receive.field("status"), &json!(500));
}

#[tokio::test]
async fn test_error_payload_text_is_logged() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let routes = Router::new().route("/ledger", get(fail_with_error));
    let app = with_middleware(routes, logger, false);

    let response = get_uri(app, "/ledger").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let records = file_records(&sinks);
    let errors = errors(&records);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, TAG_RECOVERY);
    assert_eq!(errors[0].field("error"), &json!("ledger is locked"));
}

#[tokio::test]
async fn test_stack_is_attached_when_requested() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/boom", get(boom)), logger, true);

    get_uri(app, "/boom").await;

    let records = file_records(&sinks);
    let errors = errors(&records);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].field("stack").is_string());
}

#[tokio::test]
async fn test_broken_pipe_logs_once_without_500() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/stream", get(hang_up)), logger, false);

    let response = get_uri(app, "/stream").await;
    assert_ne!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.extensions().get::<PeerDisconnected>().is_some());

    let records = file_records(&sinks);
    let errors = errors(&records);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "/stream");
    assert!(errors[0]
        .field("error")
        .as_str()
        .unwrap()
        .contains("broken pipe"));

    let receive = records.iter().find(|r| r.message == "[Receive]/stream").unwrap();
    assert!(receive
        .field("errors")
        .as_str()
        .unwrap()
        .starts_with("Error #01: write tcp"));
}

#[tokio::test]
async fn test_no_panic_is_transparent() {
    let (logger, sinks) = memory_logger(Level::Debug);
    let app = with_middleware(Router::new().route("/fine", get(fine)), logger, true);

    let response = get_uri(app, "/fine").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"fine");
    assert!(errors(&file_records(&sinks)).is_empty());
}
