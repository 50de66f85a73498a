//! Push-style frame reassembly with marker resynchronisation.
//!
//! The transport hands over whatever bytes it has; [`FrameReassembler`]
//! buffers them and yields complete frames as soon as a header and its full
//! payload are present:
//! - `AwaitingHeader`: need [`HEADER_SIZE`] bytes to look at a candidate header
//! - `AwaitingPayload`: header accepted, need `length` more bytes
//!
//! A candidate header that is not usable (wrong marker, reserved type tag,
//! absurd length) is never fatal. The reassembler scans forward byte by byte
//! for the next marker and carries on from there.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{decode_header, Frame, FrameConfig, Header, HEADER_SIZE, MARKER};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Where the reassembler is in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReassemblerState {
    /// No header buffered for the frame being assembled.
    #[default]
    AwaitingHeader,
    /// Header accepted, waiting for its payload bytes.
    AwaitingPayload(Header),
}

impl ReassemblerState {
    /// The header slot: the pending header, or [`Header::EMPTY`].
    pub fn current_header(&self) -> Header {
        match self {
            Self::AwaitingHeader => Header::EMPTY,
            Self::AwaitingPayload(header) => *header,
        }
    }
}

/// Turns an arbitrarily chunked byte stream into complete frames.
///
/// One instance per connection. Drop it (or call [`reset`](Self::reset)) on
/// disconnect; partial frames are never carried across connections.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    state: ReassemblerState,
    config: FrameConfig,
    discarded: u64,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReassembler {
    /// Create a reassembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ReassemblerState::AwaitingHeader,
            config,
            discarded: 0,
        }
    }

    /// Append newly delivered bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append `data` and take every frame that is now complete, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.extend(data);
        self.frames().collect()
    }

    /// Iterate over the frames currently complete in the buffer.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { inner: self }
    }

    /// Take the next complete frame.
    ///
    /// Returns `None` when more bytes are needed. Buffered bytes and a pending
    /// header are kept for the next call.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                ReassemblerState::AwaitingHeader => {
                    let header = decode_header(&self.buf)?;
                    if self.accepts(&header) {
                        self.buf.advance(HEADER_SIZE);
                        self.state = ReassemblerState::AwaitingPayload(header);
                    } else {
                        self.resync();
                    }
                }
                ReassemblerState::AwaitingPayload(header) => {
                    let len = header.length as usize;
                    if self.buf.len() < len {
                        return None;
                    }

                    let payload = self.buf.split_to(len).freeze();
                    self.state = ReassemblerState::AwaitingHeader;
                    trace!(
                        type_tag = header.type_tag,
                        status = header.status,
                        len,
                        "frame complete"
                    );
                    return Some(Frame { header, payload });
                }
            }
        }
    }

    /// Whether `header` starts a frame.
    ///
    /// A matching marker is not enough: a `NONE` type tag or a length above
    /// `max_payload_size` is treated like a bad marker, so the caller resyncs
    /// and scans forward from the next byte, including into that frame's
    /// payload. This bounds buffering when a stray marker pair lands in data.
    fn accepts(&self, header: &Header) -> bool {
        header.has_marker()
            && !header.is_empty()
            && header.length as usize <= self.config.max_payload_size
    }

    /// Drop bytes up to the next marker after the current position.
    ///
    /// Always discards at least one byte. When no marker is buffered, a final
    /// byte equal to the marker's first half is kept so a marker split across
    /// deliveries is still found.
    fn resync(&mut self) {
        let marker = MARKER.to_be_bytes();
        let found = self.buf[1..]
            .windows(marker.len())
            .position(|w| w == marker)
            .map(|pos| pos + 1);

        let skip = match found {
            Some(pos) => pos,
            None => match self.buf.last() {
                Some(&last) if last == marker[0] => self.buf.len() - 1,
                _ => self.buf.len(),
            },
        };

        self.buf.advance(skip);
        self.discarded = self.discarded.saturating_add(skip as u64);
        debug!(
            skipped = skip,
            realigned = found.is_some(),
            "frame stream misaligned; resynchronising"
        );
    }

    /// Current state machine position.
    pub fn state(&self) -> &ReassemblerState {
        &self.state
    }

    /// Bytes buffered but not yet handed out as part of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes dropped by resynchronisation since creation or reset.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Drop all buffered bytes and return to `AwaitingHeader`.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = ReassemblerState::AwaitingHeader;
        self.discarded = 0;
    }

    /// Update maximum accepted payload size for subsequent headers.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current reassembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Iterator returned by [`FrameReassembler::frames`].
#[derive(Debug)]
pub struct Frames<'a> {
    inner: &'a mut FrameReassembler,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.inner.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes};

    use super::*;
    use crate::kind::{CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME};

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buf);
        }
        buf.to_vec()
    }

    fn size_frame(value: u32) -> Frame {
        Frame::new(GET_SIZE, 0, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    #[test]
    fn whole_frame_in_one_delivery() {
        let mut reassembler = FrameReassembler::new();
        let frames = reassembler.push(&wire(&[size_frame(1_048_576)]));

        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].header,
            Header {
                marker: 0xAB12,
                type_tag: GET_SIZE,
                status: 0,
                length: 4
            }
        );
        assert_eq!(frames[0].payload.as_ref(), &1_048_576u32.to_be_bytes());
        assert_eq!(reassembler.buffered(), 0);
        assert_eq!(reassembler.state(), &ReassemblerState::AwaitingHeader);
    }

    #[test]
    fn short_header_waits_without_consuming() {
        let bytes = wire(&[size_frame(9)]);
        let mut reassembler = FrameReassembler::new();

        assert!(reassembler.push(&bytes[..HEADER_SIZE - 1]).is_empty());
        assert_eq!(reassembler.buffered(), HEADER_SIZE - 1);
        assert_eq!(reassembler.state(), &ReassemblerState::AwaitingHeader);
    }

    #[test]
    fn pending_header_survives_until_payload_arrives() {
        let bytes = wire(&[size_frame(9)]);
        let mut reassembler = FrameReassembler::new();

        assert!(reassembler.push(&bytes[..HEADER_SIZE + 2]).is_empty());
        assert_eq!(
            reassembler.state().current_header(),
            Header::new(GET_SIZE, 0, 4)
        );

        let frames = reassembler.push(&bytes[HEADER_SIZE + 2..]);
        assert_eq!(frames, vec![size_frame(9)]);
        assert!(reassembler.state().current_header().is_empty());
    }

    #[test]
    fn every_two_way_split_yields_the_same_frame() {
        let payload = Bytes::from_static(b"\x00\x00\x01\x8f\x00\x00\x00\x01");
        let expected = Frame::new(GET_TIME, 3, payload);
        let bytes = wire(std::slice::from_ref(&expected));

        for split in 0..=bytes.len() {
            let mut reassembler = FrameReassembler::new();
            let mut frames = reassembler.push(&bytes[..split]);
            frames.extend(reassembler.push(&bytes[split..]));
            assert_eq!(frames, vec![expected.clone()], "split at {split}");
        }
    }

    #[test]
    fn every_three_way_split_yields_the_same_frames() {
        let expected = vec![size_frame(1), Frame::new(CLEAR_DATA, 0, Bytes::new())];
        let bytes = wire(&expected);

        for a in 0..=bytes.len() {
            for b in a..=bytes.len() {
                let mut reassembler = FrameReassembler::new();
                let mut frames = reassembler.push(&bytes[..a]);
                frames.extend(reassembler.push(&bytes[a..b]));
                frames.extend(reassembler.push(&bytes[b..]));
                assert_eq!(frames, expected, "splits at {a}/{b}");
            }
        }
    }

    #[test]
    fn byte_by_byte_delivery() {
        let expected = vec![size_frame(7), size_frame(8)];
        let mut reassembler = FrameReassembler::new();

        let mut frames = Vec::new();
        for byte in wire(&expected) {
            frames.extend(reassembler.push(&[byte]));
        }
        assert_eq!(frames, expected);
    }

    #[test]
    fn two_frames_in_one_delivery_come_out_in_order() {
        let stat = Frame::new(GET_STAT, 0, Bytes::from(vec![0u8; 24]));
        let size = size_frame(42);
        let mut reassembler = FrameReassembler::new();

        let frames = reassembler.push(&wire(&[stat.clone(), size.clone()]));
        assert_eq!(frames, vec![stat, size]);
    }

    #[test]
    fn garbage_before_frame_is_discarded() {
        for garbage in [
            &b"\x01"[..],
            &b"\x00\x01\x02"[..],
            &b"0123456789abcdef"[..],
            &[0x12u8; 40][..],
        ] {
            let mut bytes = garbage.to_vec();
            bytes.extend(wire(&[size_frame(1_048_576)]));

            let mut reassembler = FrameReassembler::new();
            let frames = reassembler.push(&bytes);

            assert_eq!(frames, vec![size_frame(1_048_576)], "garbage {garbage:?}");
            assert_eq!(reassembler.discarded(), garbage.len() as u64);
            assert_eq!(reassembler.buffered(), 0);
        }
    }

    #[test]
    fn garbage_only_is_dropped_and_waits_for_more() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.push(&[0x55; 64]).is_empty());

        assert_eq!(reassembler.buffered(), 0);
        assert_eq!(reassembler.discarded(), 64);
        assert_eq!(reassembler.state(), &ReassemblerState::AwaitingHeader);

        let frames = reassembler.push(&wire(&[size_frame(5)]));
        assert_eq!(frames, vec![size_frame(5)]);
    }

    #[test]
    fn marker_split_across_deliveries_during_resync() {
        let bytes = wire(&[size_frame(77)]);
        let mut first = vec![0x55; HEADER_SIZE];
        first.push(bytes[0]);

        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.push(&first).is_empty());
        assert_eq!(reassembler.buffered(), 1);

        let frames = reassembler.push(&bytes[1..]);
        assert_eq!(frames, vec![size_frame(77)]);
        assert_eq!(reassembler.discarded(), HEADER_SIZE as u64);
    }

    #[test]
    fn marker_found_with_partial_header_waits() {
        let bytes = wire(&[size_frame(3)]);
        let mut first = vec![0x00; HEADER_SIZE];
        first.extend_from_slice(&bytes[..5]);

        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.push(&first).is_empty());
        assert_eq!(reassembler.buffered(), 5);

        assert_eq!(reassembler.push(&bytes[5..]), vec![size_frame(3)]);
    }

    #[test]
    fn truncated_frame_followed_by_valid_frame_recovers() {
        // A header whose marker got clobbered in transit.
        let mut bytes = wire(&[size_frame(1)]);
        bytes[0] = 0x00;
        bytes.extend(wire(&[size_frame(2)]));

        let mut reassembler = FrameReassembler::new();
        assert_eq!(reassembler.push(&bytes), vec![size_frame(2)]);
    }

    #[test]
    fn reserved_type_tag_is_treated_as_misalignment() {
        let mut bytes = BytesMut::new();
        Header::new(0, 0, 0).encode(&mut bytes);
        size_frame(11).encode(&mut bytes);

        let mut reassembler = FrameReassembler::new();
        assert_eq!(reassembler.push(&bytes), vec![size_frame(11)]);
        assert_eq!(reassembler.discarded(), HEADER_SIZE as u64);
    }

    #[test]
    fn oversized_length_is_treated_as_misalignment() {
        let mut bytes = BytesMut::new();
        Header::new(GET_SIZE, 0, 1024).encode(&mut bytes);
        size_frame(12).encode(&mut bytes);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reassembler = FrameReassembler::with_config(cfg);
        assert_eq!(reassembler.push(&bytes), vec![size_frame(12)]);
    }

    #[test]
    fn unknown_kind_consumes_declared_payload() {
        let unknown = Frame::new(0x0999, 0, Bytes::from_static(b"\xAB\x12\xAB\x12junk"));
        let mut reassembler = FrameReassembler::new();

        let frames = reassembler.push(&wire(&[unknown.clone(), size_frame(6)]));
        assert_eq!(frames, vec![unknown, size_frame(6)]);
        assert_eq!(reassembler.discarded(), 0);
    }

    #[test]
    fn payload_containing_marker_bytes_is_untouched() {
        let mut payload = BytesMut::new();
        payload.put_u16(MARKER);
        payload.put_u16(GET_SIZE);
        let frame = Frame::new(GET_STAT, 0, payload.freeze());

        let mut reassembler = FrameReassembler::new();
        assert_eq!(reassembler.push(&wire(&[frame.clone()])), vec![frame]);
    }

    #[test]
    fn empty_payload_frame() {
        let frame = Frame::new(CLEAR_DATA, 0, Bytes::new());
        let mut reassembler = FrameReassembler::new();

        assert_eq!(reassembler.push(&wire(&[frame.clone()])), vec![frame]);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let bytes = wire(&[size_frame(1)]);
        let mut reassembler = FrameReassembler::new();
        reassembler.push(&bytes[..HEADER_SIZE + 1]);
        assert!(matches!(
            reassembler.state(),
            ReassemblerState::AwaitingPayload(_)
        ));

        reassembler.reset();
        assert_eq!(reassembler.state(), &ReassemblerState::AwaitingHeader);
        assert_eq!(reassembler.buffered(), 0);

        assert_eq!(reassembler.push(&bytes), vec![size_frame(1)]);
    }

    #[test]
    fn frames_iterator_drains_buffer() {
        let mut reassembler = FrameReassembler::new();
        reassembler.extend(&wire(&[size_frame(1), size_frame(2), size_frame(3)]));

        let values: Vec<_> = reassembler
            .frames()
            .map(|f| u32::from_be_bytes(f.payload.as_ref().try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
