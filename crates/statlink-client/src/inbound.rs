use statlink_frame::{decode_reply, kind_name, Frame, FrameConfig, FrameReassembler};
use tracing::debug;

use crate::error::IngestError;
use crate::event::{emit_reply, ErrorSink, EventSink};

/// What happened to one complete frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Decoded and handed to the event sink.
    Emitted(u16),
    /// Type tag outside the protocol; payload consumed, no event.
    Unrecognized(u16),
    /// Payload did not fit its type tag; reported to the error sink.
    Malformed(u16),
}

/// Inbound half of a connection: reassembly plus dispatch.
///
/// `deliver` is the data-ready callback. Taking `&mut self` means a delivery
/// cannot start while another one is still running on the same connection.
#[derive(Debug, Default)]
pub struct Inbound {
    reassembler: FrameReassembler,
}

impl Inbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_config(config),
        }
    }

    /// Feed newly arrived bytes and dispatch every frame they complete.
    ///
    /// Returns one [`Dispatch`] per completed frame, in stream order.
    pub fn deliver<E, R>(&mut self, bytes: &[u8], events: &mut E, errors: &mut R) -> Vec<Dispatch>
    where
        E: EventSink + ?Sized,
        R: ErrorSink + ?Sized,
    {
        self.reassembler.extend(bytes);
        let mut outcomes = Vec::new();
        while let Some(frame) = self.reassembler.next_frame() {
            outcomes.push(dispatch(&frame, events, errors));
        }
        outcomes
    }

    /// Forget any partial frame, as on disconnect.
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }

    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }
}

/// Decode one complete frame and route the result.
pub fn dispatch<E, R>(frame: &Frame, events: &mut E, errors: &mut R) -> Dispatch
where
    E: EventSink + ?Sized,
    R: ErrorSink + ?Sized,
{
    let tag = frame.type_tag();
    match decode_reply(frame) {
        Ok(Some(reply)) => {
            emit_reply(events, reply);
            Dispatch::Emitted(tag)
        }
        Ok(None) => {
            debug!(
                type_tag = tag,
                len = frame.payload.len(),
                "dropping frame with unrecognized type tag"
            );
            Dispatch::Unrecognized(tag)
        }
        Err(source) => {
            debug!(type_tag = tag, kind = kind_name(tag), "dropping malformed frame");
            errors.report(&IngestError::Payload {
                type_tag: tag,
                source,
            });
            Dispatch::Malformed(tag)
        }
    }
}
