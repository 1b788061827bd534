//! # Xylitol Web
//!
//! axum glue around the Xylitol logger:
//! - [`request_logging`]: one `[Receive]` line per request
//! - [`recovery`]: panics become a logged error and a 500
//! - [`Reply`] / [`Envelope`]: uniform JSON payload logged as `[Return]`
//!
//! ```rust,ignore
//! use axum::{middleware::from_fn_with_state, routing::post, Router};
//! use xylitol_web::{recovery, request_logging, Recovery, Reply};
//!
//! async fn login(reply: Reply) -> axum::response::Response {
//!     reply.error(401, None, "Invalid username or password")
//! }
//!
//! let app = Router::new()
//!     .route("/login", post(login))
//!     .layer(from_fn_with_state(Recovery::new(true), recovery))
//!     .layer(from_fn_with_state(logger, request_logging));
//! ```

mod envelope;
pub mod middleware;

pub use envelope::{Envelope, Reply, STATUS_ERROR, TAG_RETURN};
pub use middleware::{
    recovery, request_logging, PeerDisconnected, Recovery, RequestErrors, TAG_RECEIVE,
    TAG_RECOVERY,
};
