use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::error::{Result, TransportError};

/// A connected byte stream to the server, implementing `Read + Write`.
///
/// This is the fundamental I/O type returned by [`crate::connect`].
pub struct LinkStream {
    inner: TcpStream,
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl LinkStream {
    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Close both halves of the connection.
    ///
    /// Shutting down an already closed socket is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Number of bytes that can be read without blocking.
    ///
    /// Uses `FIONREAD`, so a closed peer reports `0` just like an idle one.
    #[cfg(unix)]
    pub fn bytes_available(&self) -> Result<usize> {
        use std::os::fd::AsRawFd;

        let fd = self.inner.as_raw_fd();
        let mut available: libc::c_int = 0;

        // SAFETY: `fd` is an open socket owned by this stream and `available`
        // is a valid writable `c_int`, which is what FIONREAD expects.
        let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut available) };
        if rc < 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }

        Ok(usize::try_from(available).unwrap_or(0))
    }

    /// Number of bytes that can be read without blocking.
    ///
    /// Falls back to a non-blocking peek of at most 64 KiB.
    #[cfg(not(unix))]
    pub fn bytes_available(&self) -> Result<usize> {
        let mut scratch = vec![0u8; 64 * 1024];
        self.inner.set_nonblocking(true)?;
        let peeked = self.inner.peek(&mut scratch);
        self.inner.set_nonblocking(false)?;
        match peeked {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &"tcp")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
