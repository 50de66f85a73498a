//! Byte-stream transport for statlink.
//!
//! Wraps a connected TCP socket in [`LinkStream`], which implements
//! `Read + Write` and exposes the readiness check the framing layer uses.
//!
//! This is the lowest layer of statlink. Everything else builds on top of
//! the [`LinkStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::{connect, connect_timeout};
