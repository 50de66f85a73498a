//! Event-driven client for a statlink server.
//!
//! This is the "just works" layer. Connect, send typed requests, and receive
//! replies as calls on an [`EventSink`]. Inbound bytes flow through
//! [`Inbound`], which reassembles frames, decodes each payload by type tag,
//! and hands non-fatal problems to an [`ErrorSink`].

pub mod client;
pub mod error;
pub mod event;
pub mod inbound;

pub use client::{Client, ClientConfig, Poll, DEFAULT_POLL_INTERVAL};
pub use error::{ClientError, IngestError, Result};
pub use event::{emit_reply, ErrorSink, Event, EventSink, TracingErrorSink};
pub use inbound::{dispatch, Dispatch, Inbound};
