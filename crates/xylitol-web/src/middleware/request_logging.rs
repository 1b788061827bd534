//! HTTP request logging middleware
//!
//! One `[Receive]<route>` line per request, written after the handler
//! returns. When the handler answered through a [`crate::Reply`], the line
//! carries the envelope's trace ID.

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use xylitol_core::{Field, Fields, Logger};

use super::params::capture_params;
use crate::Envelope;

/// Message prefix of the per-request summary line.
pub const TAG_RECEIVE: &str = "[Receive]";

/// Errors recorded while serving one request.
///
/// Inserted into the request extensions by [`request_logging`]; clones share
/// the same list.
#[derive(Debug, Clone, Default)]
pub struct RequestErrors(Arc<Mutex<Vec<String>>>);

impl RequestErrors {
    pub fn push(&self, error: impl Into<String>) {
        self.0.lock().push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl fmt::Display for RequestErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.lock().iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, error)?;
        }
        Ok(())
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-Ip`, then the
/// socket peer when the server was started with connect info.
pub fn client_ip(request: &Request) -> String {
    forwarded_ip(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_default()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let first_hop = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    first_hop.or_else(real_ip).map(str::to_string)
}

/// Request logging middleware.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/ping", get(ping))
///     .layer(from_fn_with_state(Recovery::new(true), recovery))
///     .layer(from_fn_with_state(logger.clone(), request_logging));
/// ```
///
/// Makes `logger` and a fresh [`RequestErrors`] available to everything
/// downstream through the request extensions.
pub async fn request_logging(
    State(logger): State<Arc<Logger>>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let errors = RequestErrors::default();
    request.extensions_mut().insert(logger.clone());
    request.extensions_mut().insert(errors.clone());

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (request, query) = capture_params(request).await;

    let response = next.run(request).await;
    let cost = start.elapsed().as_millis() as i64;

    let mut fields = Fields::with_capacity(9);
    if let Some(envelope) = response.extensions().get::<Envelope>() {
        fields.push(Field::str("traceId", envelope.trace_id.clone()));
    }
    fields.push(Field::int("status", response.status().as_u16() as i64));
    fields.push(Field::str("method", method));
    fields.push(Field::str("path", path));
    fields.push(Field::str("query", query));
    fields.push(Field::str("ip", ip));
    fields.push(Field::str("user-agent", user_agent));
    fields.push(Field::str("errors", errors.to_string()));
    fields.push(Field::int("cost", cost));

    logger.info(&format!("{}{}", TAG_RECEIVE, route), fields);
    response
}
