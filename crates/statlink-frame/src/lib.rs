//! Header framing with marker resynchronisation for the statlink protocol.
//!
//! This is the core layer of statlink. Every message is framed with:
//! - A 2-byte big-endian marker (`0xAB12`) for stream synchronization
//! - A 2-byte big-endian type tag selecting the message kind
//! - A 4-byte big-endian status code, opaque to framing
//! - A 4-byte big-endian payload length
//!
//! Partial deliveries are buffered, misaligned bytes are skipped up to the
//! next marker, and payloads are decoded by type tag into [`Reply`] values.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod kind;
pub mod payload;
pub mod reader;
pub mod reassembler;
pub mod request;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::StatLinkCodec;
pub use codec::{
    decode_header, encode_header, wire_length, Frame, FrameConfig, Header, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE, MARKER, MAX_WIRE_PAYLOAD,
};
pub use error::{FrameError, PayloadError, Result};
pub use kind::{is_known, kind_name, CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME, SET_DATA};
pub use payload::{decode_reply, Reply, ServerStats, Timestamp};
pub use reader::FrameReader;
pub use reassembler::{FrameReassembler, ReassemblerState};
pub use request::{encode_request, encode_request_with_payload, Request};
pub use writer::RequestWriter;

pub(crate) fn transport_to_frame_error(err: statlink_transport::TransportError) -> FrameError {
    match err {
        statlink_transport::TransportError::Io(io) => FrameError::Io(io),
        statlink_transport::TransportError::Resolve { source, .. }
        | statlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
