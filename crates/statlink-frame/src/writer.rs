use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use statlink_transport::LinkStream;

use crate::codec::{FrameConfig, Header};
use crate::error::{FrameError, Result};
use crate::request::{encode_request, encode_request_with_payload, Request};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete requests to any `Write` stream.
pub struct RequestWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> RequestWriter<T> {
    /// Create a new request writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new request writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send a request value (blocking).
    pub fn send(&mut self, request: &Request) -> Result<()> {
        match &request.text {
            Some(text) => self.send_header_with_text(&request.header, text),
            None => self.send_header(&request.header),
        }
    }

    /// Send a payload-less request for `type_tag`.
    pub fn send_request(&mut self, type_tag: u16) -> Result<()> {
        self.send_header(&Header::request(type_tag))
    }

    /// Send a header exactly as given (blocking).
    pub fn send_header(&mut self, header: &Header) -> Result<()> {
        self.buf.clear();
        encode_request(header, &mut self.buf);
        self.write_buffered()
    }

    /// Send a request carrying a text payload (blocking).
    pub fn send_data(&mut self, type_tag: u16, text: &str) -> Result<()> {
        self.send_header_with_text(&Header::request(type_tag), text)
    }

    /// Send `header` followed by a text payload; `length` is filled in.
    pub fn send_header_with_text(&mut self, header: &Header, text: &str) -> Result<()> {
        let size = crate::payload::text_len(text);
        if size > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_request_with_payload(header, text, &mut self.buf)?;
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current request writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl RequestWriter<LinkStream> {
    /// Create a request writer for `LinkStream` and apply write timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::HEADER_SIZE;
    use crate::kind::{CLEAR_DATA, GET_STAT, GET_TIME, SET_DATA};
    use crate::payload::read_text;
    use crate::reassembler::FrameReassembler;

    fn written(writer: RequestWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_request() {
        let mut writer = RequestWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_request(GET_STAT).unwrap();

        let frames = FrameReassembler::new().push(&written(writer));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, Header::request(GET_STAT));
    }

    #[test]
    fn write_multiple_requests_in_order() {
        let mut writer = RequestWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_request(GET_TIME).unwrap();
        writer.send_data(SET_DATA, "payload").unwrap();
        writer.send_request(CLEAR_DATA).unwrap();

        let frames = FrameReassembler::new().push(&written(writer));
        let tags: Vec<_> = frames.iter().map(|f| f.type_tag()).collect();
        assert_eq!(tags, vec![GET_TIME, SET_DATA, CLEAR_DATA]);

        let mut text = frames[1].payload.as_ref();
        assert_eq!(read_text(&mut text).unwrap(), "payload");
    }

    #[test]
    fn send_request_value() {
        let mut writer = RequestWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&Request::with_text(SET_DATA, "v")).unwrap();
        writer.send(&Request::new(GET_TIME)).unwrap();

        let frames = FrameReassembler::new().push(&written(writer));
        assert_eq!(frames[0].header.length, 5);
        assert_eq!(frames[1].header, Header::request(GET_TIME));
    }

    #[test]
    fn send_header_keeps_status() {
        let mut writer = RequestWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_header(&Header::new(GET_TIME, 77, 0)).unwrap();

        let bytes = written(writer);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(
            crate::codec::decode_header(&bytes).unwrap().status,
            77
        );
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = RequestWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send_data(SET_DATA, "oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 13, max: 8 }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = RequestWriter::new(sink);

        writer.send_request(GET_TIME).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block() {
        let mut writer = RequestWriter::new(FlakyWriter::default());
        writer.send_data(SET_DATA, "retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE + 4 + 5);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = RequestWriter::new(ZeroWriter);
        let err = writer.send_request(GET_TIME).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = RequestWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        assert_eq!(writer.config().max_payload_size, crate::DEFAULT_MAX_PAYLOAD);
        let _inner = writer.into_inner();
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Interrupts, then would-block, then accepts three bytes at a time.
    #[derive(Default)]
    struct FlakyWriter {
        calls: usize,
        flushes: usize,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            match self.calls {
                1 => Err(std::io::Error::from(ErrorKind::Interrupted)),
                2 => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                _ => {
                    let n = buf.len().min(3);
                    self.data.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            if self.flushes == 1 {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
