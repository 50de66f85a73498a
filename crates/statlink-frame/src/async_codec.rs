//! `tokio_util::codec` integration.
//!
//! [`StatLinkCodec`] decodes inbound frames with the same resynchronising
//! reassembler as the blocking reader. It encodes outbound [`Request`]s on the
//! client side and whole [`Frame`]s for servers answering them.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{Frame, FrameConfig};
use crate::error::FrameError;
use crate::reassembler::FrameReassembler;
use crate::request::Request;

/// Codec for use with `FramedRead` / `FramedWrite` / `Framed`.
#[derive(Debug, Default)]
pub struct StatLinkCodec {
    reassembler: FrameReassembler,
}

impl StatLinkCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_config(config),
        }
    }

    /// The reassembler holding buffered bytes.
    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }
}

impl Decoder for StatLinkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if !src.is_empty() {
            let chunk = src.split();
            self.reassembler.extend(&chunk);
        }
        Ok(self.reassembler.next_frame())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if self.reassembler.buffered() > 0 {
            return Err(FrameError::ConnectionClosed);
        }
        Ok(None)
    }
}

impl Encoder<Request> for StatLinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode(dst)
    }
}

impl Encoder<Frame> for StatLinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let max = self.reassembler.config().max_payload_size;
        if item.payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max,
            });
        }
        item.encode(dst);
        Ok(())
    }
}
