//! Typed reply payloads.
//!
//! [`decode_reply`] interprets a complete frame according to its type tag.
//! Every shape must account for exactly `header.length` bytes; anything
//! shorter or longer is a [`PayloadError`] for that frame alone.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::codec::Frame;
use crate::error::PayloadError;
use crate::kind::{self, CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME, SET_DATA};

/// Length prefix value denoting a null string.
pub const NULL_TEXT: u32 = u32::MAX;

/// Server time: milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wire size of a timestamp.
    pub const SIZE: usize = 8;

    /// Wrap milliseconds since the Unix epoch; negative values are pre-epoch.
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch, as carried on the wire.
    pub fn unix_millis(self) -> i64 {
        self.0
    }

    /// Convert to `SystemTime`; pre-epoch values are supported.
    pub fn to_system_time(self) -> SystemTime {
        let offset = Duration::from_millis(self.0.unsigned_abs());
        if self.0 >= 0 {
            UNIX_EPOCH + offset
        } else {
            UNIX_EPOCH - offset
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|m| -m)
                .unwrap_or(i64::MIN),
        };
        Self(millis)
    }
}

/// Aggregate counters reported by the server for `GET_STAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Bytes the server has received from all clients.
    pub received_bytes: u32,
    /// Bytes the server has sent to all clients.
    pub sent_bytes: u32,
    /// Frames received.
    pub received_packets: u32,
    /// Frames sent.
    pub sent_packets: u32,
    /// Seconds since the server started.
    pub uptime_secs: u32,
    /// Clients currently connected.
    pub clients: u32,
}

impl ServerStats {
    /// Wire size of the record.
    pub const SIZE: usize = 24;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(self.received_bytes);
        dst.put_u32(self.sent_bytes);
        dst.put_u32(self.received_packets);
        dst.put_u32(self.sent_packets);
        dst.put_u32(self.uptime_secs);
        dst.put_u32(self.clients);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, PayloadError> {
        let mut record = take(src, Self::SIZE, "GET_STAT")?;
        let mut fields = [0u32; 6];
        for field in &mut fields {
            *field = read_u32(&mut record, "GET_STAT")?;
        }
        let [received_bytes, sent_bytes, received_packets, sent_packets, uptime_secs, clients] =
            fields;
        Ok(Self {
            received_bytes,
            sent_bytes,
            received_packets,
            sent_packets,
            uptime_secs,
            clients,
        })
    }
}

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `GET_TIME`: current server time.
    Time(Timestamp),
    /// `GET_SIZE`: free storage in bytes.
    FreeSize(u32),
    /// `GET_STAT`: server counters.
    Stats(ServerStats),
    /// `SET_DATA`: the server's reply text.
    SetData(String),
    /// `CLEAR_DATA`: stored data cleared.
    Cleared,
}

impl Reply {
    /// The type tag this reply travels under.
    pub fn type_tag(&self) -> u16 {
        match self {
            Reply::Time(_) => GET_TIME,
            Reply::FreeSize(_) => GET_SIZE,
            Reply::Stats(_) => GET_STAT,
            Reply::SetData(_) => SET_DATA,
            Reply::Cleared => CLEAR_DATA,
        }
    }

    /// Append the payload encoding (no header) to `dst`.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            Reply::Time(ts) => dst.put_i64(ts.unix_millis()),
            Reply::FreeSize(size) => dst.put_u32(*size),
            Reply::Stats(stats) => stats.encode(dst),
            Reply::SetData(text) => put_text(text, dst),
            Reply::Cleared => {}
        }
    }

    /// Build the complete frame a server would send for this reply.
    ///
    /// `SetData` text must fit a frame; see [`put_text`].
    pub fn to_frame(&self, status: u32) -> Frame {
        let mut payload = BytesMut::new();
        self.encode_payload(&mut payload);
        Frame::new(self.type_tag(), status, payload.freeze())
    }
}

/// Decode a frame's payload according to its type tag.
///
/// Returns `Ok(None)` for type tags outside the protocol; such frames carry no
/// event.
pub fn decode_reply(frame: &Frame) -> Result<Option<Reply>, PayloadError> {
    let tag = frame.header.type_tag;
    if !kind::is_known(tag) {
        return Ok(None);
    }
    let name = kind::kind_name(tag);
    let declared = frame.header.length as usize;
    if frame.payload.len() != declared {
        return Err(PayloadError::LengthMismatch {
            kind: name,
            declared,
            consumed: frame.payload.len(),
        });
    }

    let mut src = frame.payload.as_ref();
    let reply = match tag {
        GET_TIME => Reply::Time(Timestamp(read_i64(&mut src, name)?)),
        GET_SIZE => Reply::FreeSize(read_u32(&mut src, name)?),
        GET_STAT => Reply::Stats(ServerStats::decode(&mut src)?),
        SET_DATA => Reply::SetData(read_text(&mut src)?),
        CLEAR_DATA => Reply::Cleared,
        _ => return Ok(None),
    };

    if !src.is_empty() {
        return Err(PayloadError::LengthMismatch {
            kind: name,
            declared,
            consumed: declared - src.len(),
        });
    }

    Ok(Some(reply))
}

/// Encoded size of a text payload.
pub fn text_len(text: &str) -> usize {
    4 + text.len()
}

/// Append a length-prefixed UTF-8 text payload to `dst`.
///
/// `text` must be shorter than `u32::MAX` bytes; that value is the null
/// marker. Request encoding checks this before calling.
pub fn put_text(text: &str, dst: &mut BytesMut) {
    debug_assert!(text.len() < NULL_TEXT as usize);
    dst.reserve(text_len(text));
    dst.put_u32(text.len() as u32);
    dst.put_slice(text.as_bytes());
}

/// Read a length-prefixed UTF-8 text payload.
pub fn read_text(src: &mut &[u8]) -> Result<String, PayloadError> {
    let len = read_u32(src, "text")?;
    if len == NULL_TEXT {
        return Ok(String::new());
    }
    let bytes = take(src, len as usize, "text")?;
    Ok(std::str::from_utf8(bytes)?.to_owned())
}

fn take<'a>(src: &mut &'a [u8], n: usize, kind: &'static str) -> Result<&'a [u8], PayloadError> {
    if src.len() < n {
        return Err(PayloadError::Truncated {
            kind,
            needed: n,
            available: src.len(),
        });
    }
    let whole: &'a [u8] = *src;
    let (head, rest) = whole.split_at(n);
    *src = rest;
    Ok(head)
}

fn read_u32(src: &mut &[u8], kind: &'static str) -> Result<u32, PayloadError> {
    let bytes = take(src, 4, kind)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i64(src: &mut &[u8], kind: &'static str) -> Result<i64, PayloadError> {
    let bytes = take(src, Timestamp::SIZE, kind)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_be_bytes(raw))
}
