use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind;

/// Frame header: marker (2) + type tag (2) + status (4) + length (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Frame-start sentinel carried in every header.
pub const MARKER: u16 = 0xAB12;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest payload a header `length` can describe.
pub const MAX_WIRE_PAYLOAD: usize = u32::MAX as usize;

/// Header `length` for a payload of `len` bytes.
pub fn wire_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: MAX_WIRE_PAYLOAD,
    })
}

/// Fixed-size record sent before every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Frame-start sentinel; equals [`MARKER`] on every well-aligned header.
    pub marker: u16,
    /// Message kind, see [`crate::kind`].
    pub type_tag: u16,
    /// Protocol status code. Opaque to the framing layer.
    pub status: u32,
    /// Exact number of payload bytes following the header.
    pub length: u32,
}

impl Header {
    /// The empty slot: no header buffered.
    pub const EMPTY: Header = Header {
        marker: 0,
        type_tag: kind::NONE,
        status: 0,
        length: 0,
    };

    /// Create a header with the protocol marker.
    pub fn new(type_tag: u16, status: u32, length: u32) -> Self {
        Self {
            marker: MARKER,
            type_tag,
            status,
            length,
        }
    }

    /// A payload-less request header for `type_tag`.
    pub fn request(type_tag: u16) -> Self {
        Self::new(type_tag, 0, 0)
    }

    /// Whether the marker field carries the protocol sentinel.
    pub fn has_marker(&self) -> bool {
        self.marker == MARKER
    }

    /// Whether this is the empty slot (`type_tag == 0`).
    pub fn is_empty(&self) -> bool {
        self.type_tag == kind::NONE
    }

    /// Append the wire encoding of this header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u16(self.marker);
        dst.put_u16(self.type_tag);
        dst.put_u32(self.status);
        dst.put_u32(self.length);
    }
}

/// Encode a header into its fixed-width wire form.
///
/// Wire format (big-endian):
/// ```text
/// ┌─────────────┬────────────┬───────────┬───────────┬─────────────────┐
/// │ Marker (2B) │ Type (2B)  │ Status    │ Length    │ Payload          │
/// │ 0xAB 0x12   │            │ (4B)      │ (4B)      │ (Length bytes)   │
/// └─────────────┴────────────┴───────────┴───────────┴─────────────────┘
/// ```
pub fn encode_header(header: &Header) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0..2].copy_from_slice(&header.marker.to_be_bytes());
    out[2..4].copy_from_slice(&header.type_tag.to_be_bytes());
    out[4..8].copy_from_slice(&header.status.to_be_bytes());
    out[8..12].copy_from_slice(&header.length.to_be_bytes());
    out
}

/// Decode a header from the first [`HEADER_SIZE`] bytes of `src`.
///
/// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available. The
/// marker is not checked here; alignment is the reassembler's decision.
pub fn decode_header(src: &[u8]) -> Option<Header> {
    if src.len() < HEADER_SIZE {
        return None;
    }

    let mut cursor = &src[..HEADER_SIZE];
    Some(Header {
        marker: cursor.get_u16(),
        type_tag: cursor.get_u16(),
        status: cursor.get_u32(),
        length: cursor.get_u32(),
    })
}

/// One header plus exactly `header.length` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The accepted header.
    pub header: Header,
    /// The payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame whose header length matches the payload.
    ///
    /// The payload must be at most [`MAX_WIRE_PAYLOAD`] bytes; use
    /// [`Frame::try_new`] when the size is not already bounded.
    pub fn new(type_tag: u16, status: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= MAX_WIRE_PAYLOAD);
        Self {
            header: Header::new(type_tag, status, payload.len() as u32),
            payload,
        }
    }

    /// Like [`Frame::new`], but fails with `PayloadTooLarge` instead of
    /// writing a length that disagrees with the payload.
    pub fn try_new(type_tag: u16, status: u32, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let length = wire_length(payload.len())?;
        Ok(Self {
            header: Header::new(type_tag, status, length),
            payload,
        })
    }

    /// The message kind carried by this frame.
    pub fn type_tag(&self) -> u16 {
        self.header.type_tag
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        self.header.encode(dst);
        dst.put_slice(&self.payload);
    }
}

/// Configuration for framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Headers declaring more are treated as
    /// misaligned. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
