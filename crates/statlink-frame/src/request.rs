use bytes::BytesMut;

use crate::codec::{wire_length, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::payload::{put_text, text_len};

/// Largest text that still fits a `u32` length once prefixed.
pub const MAX_TEXT_LEN: usize = u32::MAX as usize - 4;

/// An outbound request: a header, optionally followed by text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub header: Header,
    pub text: Option<String>,
}

impl Request {
    /// A payload-less request for `type_tag`.
    pub fn new(type_tag: u16) -> Self {
        Self {
            header: Header::request(type_tag),
            text: None,
        }
    }

    /// A request for `type_tag` carrying `text`.
    pub fn with_text(type_tag: u16, text: impl Into<String>) -> Self {
        Self {
            header: Header::request(type_tag),
            text: Some(text.into()),
        }
    }

    /// Append the wire encoding of this request to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match &self.text {
            Some(text) => encode_request_with_payload(&self.header, text, dst),
            None => {
                encode_request(&self.header, dst);
                Ok(())
            }
        }
    }
}

/// Encode a header-only request.
///
/// The header is written exactly as given.
pub fn encode_request(header: &Header, dst: &mut BytesMut) {
    header.encode(dst);
}

/// Encode a request header followed by a length-prefixed text payload.
///
/// The header's `length` is replaced by the encoded text size so the frame
/// is always self-consistent.
pub fn encode_request_with_payload(header: &Header, text: &str, dst: &mut BytesMut) -> Result<()> {
    if text.len() > MAX_TEXT_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: text.len(),
            max: MAX_TEXT_LEN,
        });
    }

    let header = Header {
        length: wire_length(text_len(text))?,
        ..*header
    };
    dst.reserve(HEADER_SIZE + text_len(text));
    header.encode(dst);
    put_text(text, dst);
    Ok(())
}
