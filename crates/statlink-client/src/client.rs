use std::io::{self, ErrorKind, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use statlink_frame::{FrameConfig, FrameError, Reply, Request, RequestWriter, SET_DATA};
use statlink_transport::{LinkStream, TransportError};
use tracing::{debug, trace};

use crate::error::{ClientError, IngestError, Result};
use crate::event::{ErrorSink, Event, EventSink, TracingErrorSink};
use crate::inbound::{Dispatch, Inbound};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How often `poll` wakes up when the server is quiet.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Framing limits. `read_timeout` doubles as the poll interval.
    pub frame: FrameConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            frame: FrameConfig {
                read_timeout: Some(DEFAULT_POLL_INTERVAL),
                write_timeout: Some(Duration::from_secs(5)),
                ..FrameConfig::default()
            },
        }
    }
}

/// Outcome of a single [`Client::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// Nothing arrived before the read timeout.
    Idle,
    /// Bytes arrived; one entry per frame they completed (possibly none).
    Delivered(Vec<Dispatch>),
    /// The server closed the connection or the link failed.
    Disconnected,
}

/// Error kinds that mean the socket itself is gone.
fn is_connection_lost(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

/// A connection to a statlink server.
///
/// Reads go through one handle of the socket and writes through a clone, so
/// outbound requests never touch inbound parsing state.
pub struct Client {
    reader: LinkStream,
    writer: RequestWriter<LinkStream>,
    inbound: Inbound,
    addr: SocketAddr,
    connected: bool,
    /// Write-side failure not yet reported to an event sink.
    lost: Option<io::Error>,
}

impl Client {
    /// Connect to `addr`, reporting the outcome to `events`.
    ///
    /// On failure `on_connection_error` fires and the same error is returned.
    /// No retry is attempted.
    pub fn connect<E>(addr: &str, config: &ClientConfig, events: &mut E) -> Result<Self>
    where
        E: EventSink + ?Sized,
    {
        match Self::open(addr, config) {
            Ok(client) => {
                debug!(addr = %client.addr, "connected");
                events.on_connected();
                Ok(client)
            }
            Err(err) => {
                debug!(addr, error = %err, "connect failed");
                events.on_connection_error(&err);
                Err(err)
            }
        }
    }

    fn open(addr: &str, config: &ClientConfig) -> Result<Self> {
        let stream = statlink_transport::connect_timeout(addr, config.connect_timeout)?;
        let peer = stream.peer_addr()?;
        stream.set_read_timeout(config.frame.read_timeout)?;
        let writer_stream = stream.try_clone()?;
        let writer = RequestWriter::with_config_link(writer_stream, config.frame.clone())?;

        Ok(Self {
            reader: stream,
            writer,
            inbound: Inbound::with_config(config.frame.clone()),
            addr: peer,
            connected: true,
            lost: None,
        })
    }

    /// Address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Send a request value.
    ///
    /// If the write fails because the link is gone, the client is marked
    /// disconnected and the next [`poll`](Self::poll) fires
    /// `on_connection_error` followed by `on_disconnected`.
    pub fn send(&mut self, request: &Request) -> Result<()> {
        self.ensure_connected()?;
        trace!(type_tag = request.header.type_tag, "sending request");
        match self.writer.send(request) {
            Ok(()) => Ok(()),
            Err(FrameError::Io(err)) if is_connection_lost(err.kind()) => {
                debug!(addr = %self.addr, error = %err, "connection lost while sending");
                self.connected = false;
                self.lost = Some(io::Error::new(err.kind(), err.to_string()));
                Err(FrameError::Io(err).into())
            }
            Err(FrameError::ConnectionClosed) => {
                debug!(addr = %self.addr, "connection closed while sending");
                self.connected = false;
                self.lost = Some(io::Error::from(ErrorKind::WriteZero));
                Err(FrameError::ConnectionClosed.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Send a payload-less request for `type_tag`.
    pub fn send_request(&mut self, type_tag: u16) -> Result<()> {
        self.send(&Request::new(type_tag))
    }

    /// Send a `SET_DATA` request carrying `text`.
    pub fn send_data(&mut self, text: &str) -> Result<()> {
        self.send(&Request::with_text(SET_DATA, text))
    }

    /// Perform one read and dispatch whatever frames it completes.
    ///
    /// Read timeouts return [`Poll::Idle`]. A reset, aborted or broken link
    /// fires `on_connection_error` then `on_disconnected` and returns
    /// [`Poll::Disconnected`], as does end of stream (without the error).
    /// Any other read failure goes to `errors` and returns `Idle`; the
    /// connection stays up.
    pub fn poll<E, R>(&mut self, events: &mut E, errors: &mut R) -> Result<Poll>
    where
        E: EventSink + ?Sized,
        R: ErrorSink + ?Sized,
    {
        if let Some(err) = self.lost.take() {
            return Ok(self.lose(err, events));
        }
        self.ensure_connected()?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = self.reader.read(&mut chunk).map(|n| &chunk[..n]);
        Ok(self.absorb(read, events, errors))
    }

    /// Act on the result of one read.
    fn absorb<E, R>(&mut self, read: io::Result<&[u8]>, events: &mut E, errors: &mut R) -> Poll
    where
        E: EventSink + ?Sized,
        R: ErrorSink + ?Sized,
    {
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                return Poll::Idle;
            }
            Err(err) if is_connection_lost(err.kind()) => {
                debug!(addr = %self.addr, error = %err, "connection lost");
                return self.lose(err, events);
            }
            Err(err) => {
                errors.report(&IngestError::Read(err));
                return Poll::Idle;
            }
        };

        if bytes.is_empty() {
            debug!(addr = %self.addr, "server closed connection");
            self.connected = false;
            self.inbound.reset();
            events.on_disconnected();
            return Poll::Disconnected;
        }

        trace!(bytes = bytes.len(), "received");
        Poll::Delivered(self.inbound.deliver(bytes, events, errors))
    }

    fn lose<E>(&mut self, err: io::Error, events: &mut E) -> Poll
    where
        E: EventSink + ?Sized,
    {
        self.connected = false;
        self.inbound.reset();
        events.on_connection_error(&ClientError::Transport(TransportError::Io(err)));
        events.on_disconnected();
        Poll::Disconnected
    }

    /// Send a payload-less request and wait for the reply of the same kind.
    pub fn request(&mut self, type_tag: u16, timeout: Duration) -> Result<Reply> {
        self.round_trip(&Request::new(type_tag), timeout)
    }

    /// Send `SET_DATA` and wait for the server's reply text.
    pub fn request_data(&mut self, text: &str, timeout: Duration) -> Result<Reply> {
        self.round_trip(&Request::with_text(SET_DATA, text), timeout)
    }

    fn round_trip(&mut self, request: &Request, timeout: Duration) -> Result<Reply> {
        let wanted = request.header.type_tag;
        self.send(request)?;

        let deadline = Instant::now() + timeout;
        let mut errors = TracingErrorSink;
        loop {
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout(timeout));
            }

            let mut events = Vec::<Event>::new();
            if self.poll(&mut events, &mut errors)? == Poll::Disconnected {
                return Err(ClientError::Disconnected);
            }

            for event in events {
                match event.into_reply() {
                    Some(reply) if reply.type_tag() == wanted => return Ok(reply),
                    Some(reply) => {
                        debug!(
                            expected = wanted,
                            got = reply.type_tag(),
                            "ignoring unrelated reply"
                        );
                    }
                    None => {}
                }
            }
        }
    }

    /// Bytes readable right now without blocking.
    pub fn bytes_available(&self) -> Result<usize> {
        Ok(self.reader.bytes_available()?)
    }

    /// Inbound reassembly state, for inspection.
    pub fn inbound(&self) -> &Inbound {
        &self.inbound
    }

    /// Close the connection and fire `on_disconnected`.
    ///
    /// Calling this on an already closed client does nothing.
    pub fn disconnect<E>(&mut self, events: &mut E) -> Result<()>
    where
        E: EventSink + ?Sized,
    {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.inbound.reset();
        let shut = self.reader.shutdown();
        events.on_disconnected();
        shut?;
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ClientError::Disconnected)
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.connected {
            let _ = self.reader.shutdown();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.addr)
            .field("connected", &self.connected)
            .field("buffered", &self.inbound.reassembler().buffered())
            .finish()
    }
}
