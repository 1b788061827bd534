//! Panic recovery middleware
//!
//! Catches a panic raised anywhere downstream, logs it once at error level
//! and answers 500 with an empty body. A panic caused by the peer having
//! gone away (broken pipe, connection reset) is logged and recorded but no
//! error status is written, since nothing can reach the client anymore.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, Version};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use xylitol_core::{default_logger, Field, Fields, Logger};

use super::request_logging::RequestErrors;

/// Message of the line logged for a general panic.
pub const TAG_RECOVERY: &str = "[Recovery from panic]";

/// Marker extension on the response returned after a peer-disconnect panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerDisconnected;

/// Settings for [`recovery`].
#[derive(Debug, Clone, Default)]
pub struct Recovery {
    logger: Option<Arc<Logger>>,
    stack: bool,
}

impl Recovery {
    /// `stack` adds a backtrace captured at the recovery point to the log line.
    pub fn new(stack: bool) -> Self {
        Self {
            logger: None,
            stack,
        }
    }

    /// Log through `logger` instead of the one found in the request
    /// extensions (or the process default).
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Whether `err` means the client closed the connection.
pub fn is_peer_disconnect(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    ) {
        return true;
    }
    mentions_peer_disconnect(&err.to_string())
}

fn mentions_peer_disconnect(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("broken pipe") || text.contains("connection reset by peer")
}

/// Text of a panic payload and whether it is a peer disconnect.
fn describe_panic(payload: &(dyn Any + Send)) -> (String, bool) {
    if let Some(err) = payload.downcast_ref::<io::Error>() {
        return (err.to_string(), is_peer_disconnect(err));
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return (io_err.to_string(), is_peer_disconnect(io_err));
        }
        let text = err.to_string();
        let peer_gone = mentions_peer_disconnect(&text);
        return (text, peer_gone);
    }
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (msg.to_string(), false);
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return (msg.clone(), false);
    }
    ("unknown panic payload".to_string(), false)
}

/// Request line and headers, without the body.
struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
}

impl RequestHead {
    fn capture(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }

    fn dump(&self) -> String {
        let target = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let mut out = format!("{} {} {:?}\r\n", self.method, target, self.version);
        for (name, value) in &self.headers {
            out.push_str(name.as_str());
            out.push_str(": ");
            out.push_str(&String::from_utf8_lossy(value.as_bytes()));
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

/// Panic recovery middleware.
///
/// Place it inside [`super::request_logging`] so recovered requests still get
/// their `[Receive]` line.
pub async fn recovery(
    State(settings): State<Recovery>,
    request: Request,
    next: Next,
) -> Response {
    let logger = settings
        .logger
        .clone()
        .or_else(|| request.extensions().get::<Arc<Logger>>().cloned())
        .unwrap_or_else(default_logger);
    let errors = request.extensions().get::<RequestErrors>().cloned();
    let head = RequestHead::capture(&request);

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let (error, peer_gone) = describe_panic(payload.as_ref());
            let fields = Fields::with_capacity(3)
                .with(Field::str("error", error.clone()))
                .with(Field::str("request", head.dump()));

            if peer_gone {
                logger.error(head.uri.path(), fields);
                if let Some(errors) = errors {
                    errors.push(error);
                }
                let mut response = Response::default();
                response.extensions_mut().insert(PeerDisconnected);
                return response;
            }

            let fields = if settings.stack {
                fields.with(Field::str("stack", Backtrace::force_capture().to_string()))
            } else {
                fields
            };
            logger.error(TAG_RECOVERY, fields);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
