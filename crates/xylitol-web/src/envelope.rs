//! Uniform JSON response envelope
//!
//! Handlers finish through a [`Reply`]: it stamps a fresh trace ID, logs the
//! envelope as `[Return]<route>`, stores it in the response extensions for
//! the request logger and writes it with transport status 200. Success or
//! failure is carried by the payload, not the HTTP status.

use axum::extract::{FromRequestParts, MatchedPath};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use xylitol_core::{default_logger, Field, Fields, Level, Logger};

/// Message prefix of the line logged for every envelope.
pub const TAG_RETURN: &str = "[Return]";

/// `status` value of a failed envelope. Successful envelopes leave it empty.
pub const STATUS_ERROR: &str = "error";

fn is_zero(code: &i32) -> bool {
    *code == 0
}

/// Success/error payload returned by every handler.
///
/// `data` is an owned JSON value, so an envelope never aliases the caller's
/// data once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "requestId", default, skip_serializing_if = "String::is_empty")]
    pub trace_id: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub info: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Successful envelope: code 200, `info` equal to `msg`.
    pub fn success(data: Value, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            code: StatusCode::OK.as_u16() as i32,
            info: msg.clone(),
            msg,
            data,
            ..Self::default()
        }
    }

    /// Failed envelope: `info` is the error text when present, else `msg`.
    pub fn failure(
        code: i32,
        err: Option<&(dyn std::error::Error + '_)>,
        msg: impl Into<String>,
    ) -> Self {
        let msg = msg.into();
        Self {
            code,
            info: err.map(|e| e.to_string()).unwrap_or_else(|| msg.clone()),
            msg,
            status: STATUS_ERROR.to_string(),
            ..Self::default()
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_empty()
    }

    /// Fields logged with the `[Return]` line.
    pub fn fields(&self) -> Fields {
        Fields::with_capacity(6)
            .with(Field::str("requestId", self.trace_id.clone()))
            .with(Field::int("code", self.code as i64))
            .with(Field::str("info", self.info.clone()))
            .with(Field::str("msg", self.msg.clone()))
            .with(Field::str("status", self.status.clone()))
            .with(Field::json("data", self.data.clone()))
    }
}

/// Handler-side entry point for writing an [`Envelope`].
///
/// Extracted from the request; consumed by [`Reply::ok`] or [`Reply::error`],
/// so a handler produces at most one envelope.
pub struct Reply {
    route: String,
    logger: Arc<Logger>,
}

impl Reply {
    pub fn new(route: impl Into<String>, logger: Arc<Logger>) -> Self {
        Self {
            route: route.into(),
            logger,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Reply with a successful envelope carrying `data`.
    ///
    /// If `data` cannot be serialized the reply degrades to a failed envelope
    /// with code 500.
    #[track_caller]
    pub fn ok<T: Serialize>(self, data: T, msg: &str) -> Response {
        match serde_json::to_value(data) {
            Ok(data) => {
                let envelope =
                    Envelope::success(data, msg).with_trace_id(self.logger.generate_trace_id());
                self.send(Level::Info, envelope)
            }
            Err(e) => self.error(StatusCode::INTERNAL_SERVER_ERROR.as_u16() as i32, Some(&e), msg),
        }
    }

    /// Reply with a failed envelope carrying the semantic `code`.
    #[track_caller]
    pub fn error(
        self,
        code: i32,
        err: Option<&(dyn std::error::Error + '_)>,
        msg: &str,
    ) -> Response {
        let envelope =
            Envelope::failure(code, err, msg).with_trace_id(self.logger.generate_trace_id());
        self.send(Level::Error, envelope)
    }

    #[track_caller]
    fn send(self, level: Level, envelope: Envelope) -> Response {
        let tag = format!("{}{}", TAG_RETURN, self.route);
        self.logger.log(level, &tag, envelope.fields());

        let mut response = (StatusCode::OK, Json(&envelope)).into_response();
        response.extensions_mut().insert(envelope);
        response
    }
}

impl<S> FromRequestParts<S> for Reply
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let route = parts
            .extensions
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        let logger = parts
            .extensions
            .get::<Arc<Logger>>()
            .cloned()
            .unwrap_or_else(default_logger);

        Ok(Self { route, logger })
    }
}
