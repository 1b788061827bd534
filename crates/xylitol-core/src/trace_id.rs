//! Trace ID generation

use uuid::Uuid;

/// Generate a fresh trace ID for correlating a response with its log lines.
///
/// Format: hyphenated UUID v4 (36 chars).
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}
