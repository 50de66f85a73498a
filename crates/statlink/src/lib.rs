//! Client for the statlink server protocol.
//!
//! statlink frames every message with a 12-byte big-endian header led by a
//! fixed marker, so a client can recover alignment after corrupt or partial
//! input, then decodes each reply by its type tag.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP byte stream with connect timeout and readiness check
//! - [`frame`]: Header codec, resynchronising reassembler, payload codecs
//! - [`client`]: Event-driven client and inbound dispatch

/// Re-export transport types.
pub mod transport {
    pub use statlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use statlink_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use statlink_client::*;
}
