use std::io::{ErrorKind, Read};

use statlink_transport::LinkStream;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reassembler::FrameReassembler;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and misaligned input internally; callers always
/// get complete frames.
pub struct FrameReader<T> {
    inner: T,
    reassembler: FrameReassembler,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            reassembler: FrameReassembler::with_config(config),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.reassembler.next_frame() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.reassembler.extend(&chunk[..read]);
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

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The reassembler holding buffered bytes.
    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.reassembler.config()
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
