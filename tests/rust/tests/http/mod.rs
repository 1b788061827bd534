//! HTTP integration tests
//!
//! Request logging, response envelopes and panic recovery through a real
//! axum router.

mod envelope;
mod recovery;
