//! Request logging and panic recovery middleware

mod params;
mod recovery;
mod request_logging;

pub use params::{capture_params, MAX_CAPTURE_BYTES};
pub use recovery::{is_peer_disconnect, recovery, PeerDisconnected, Recovery, TAG_RECOVERY};
pub use request_logging::{client_ip, request_logging, RequestErrors, TAG_RECEIVE};
