//! Shared test utilities and fixtures for Xylitol integration tests.

use std::sync::Arc;
use xylitol_core::{Level, Logger, MemorySinks};

/// Logger writing to in-memory sinks, plus a handle on those sinks.
pub fn memory_logger(level: Level) -> (Arc<Logger>, MemorySinks) {
    let sinks = MemorySinks::new();
    let logger = Arc::new(Logger::with_sinks(level, "tmp/test.log", sinks.clone()));
    (logger, sinks)
}

/// One parsed output line: `ts \t LEVEL \t caller \t msg [\t fields]`.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: String,
    pub level: String,
    pub caller: String,
    pub message: String,
    pub fields: serde_json::Value,
}

impl LogLine {
    pub fn parse(line: &str) -> Option<Self> {
        let mut columns = line.splitn(5, '\t');
        let timestamp = columns.next()?.to_string();
        let level = columns.next()?.to_string();
        let caller = columns.next()?.to_string();
        let message = columns.next()?.to_string();
        let fields = match columns.next() {
            Some(json) => serde_json::from_str(json).ok()?,
            None => serde_json::Value::Null,
        };
        Some(Self {
            timestamp,
            level,
            caller,
            message,
            fields,
        })
    }

    /// Field value by key, `Null` when absent.
    pub fn field(&self, key: &str) -> &serde_json::Value {
        &self.fields[key]
    }
}

/// Every line of the file sink, parsed.
pub fn file_records(sinks: &MemorySinks) -> Vec<LogLine> {
    sinks
        .file_lines()
        .iter()
        .filter_map(|line| LogLine::parse(line))
        .collect()
}

/// HTTP fixtures
pub mod http {
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn_with_state;
    use axum::response::Response;
    use axum::Router;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;
    use xylitol_core::Logger;
    use xylitol_web::{recovery, request_logging, Recovery};

    /// Wrap `routes` with recovery (inner) and request logging (outer).
    pub fn with_middleware(routes: Router, logger: Arc<Logger>, stack: bool) -> Router {
        routes
            .layer(from_fn_with_state(Recovery::new(stack), recovery))
            .layer(from_fn_with_state(logger, request_logging))
    }

    pub async fn send(app: Router, request: Request<Body>) -> Response {
        match app.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    pub async fn get(app: Router, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header("user-agent", "xylitol-tests")
            .body(Body::empty())
            .unwrap();
        send(app, request).await
    }

    pub async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}
