use std::fmt::Display;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// Connect to a listening server (blocking, OS default timeout).
pub fn connect(addr: impl ToSocketAddrs + Display) -> Result<LinkStream> {
    connect_with(addr, None)
}

/// Connect to a listening server, giving up on each resolved address after `timeout`.
pub fn connect_timeout(addr: impl ToSocketAddrs + Display, timeout: Duration) -> Result<LinkStream> {
    connect_with(addr, Some(timeout))
}

fn connect_with(addr: impl ToSocketAddrs + Display, timeout: Option<Duration>) -> Result<LinkStream> {
    let label = addr.to_string();
    let candidates = addr.to_socket_addrs().map_err(|e| TransportError::Resolve {
        addr: label.clone(),
        source: e,
    })?;

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                // Requests are tiny; don't let Nagle hold them back.
                stream.set_nodelay(true)?;
                debug!(addr = %candidate, "connected to server");
                return Ok(LinkStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(addr = %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        addr: label,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to no candidates",
            )
        }),
    })
}
