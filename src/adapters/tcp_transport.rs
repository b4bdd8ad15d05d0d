//! WiFi TCP transport.
//!
//! The firmware listens on a plain TCP socket (default port
//! [`DEFAULT_TCP_PORT`](crate::config::DEFAULT_TCP_PORT)) and streams the
//! same frames as the BLE link, without message boundaries.
//!
//! ## Connection model
//!
//! 1. `connect()` opens the socket with `TCP_NODELAY` and a read timeout
//!    equal to the reader poll interval.
//! 2. `into_link()` clones the stream into a write half
//!    ([`TcpCommandSink`]) and a read half ([`TcpReportSource`]).
//! 3. An idle read timeout before the first byte of a frame surfaces as
//!    [`TransportError::Timeout`] so the reader can check for shutdown.
//!    Timeouts in the middle of a read keep waiting.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::Link;
use crate::app::ports::{CommandSink, ReportSource};
use crate::error::TransportError;

type TransportResult<T> = core::result::Result<T, TransportError>;

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `address:port`, trying each resolved address in turn.
    pub fn connect(address: &str, port: u16, read_timeout: Duration) -> TransportResult<Self> {
        let addrs = (address, port).to_socket_addrs()?;
        let mut last = TransportError::NotConnected;
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    info!("tcp: connected to {addr}");
                    return Self::from_stream(stream, read_timeout);
                }
                Err(e) => {
                    warn!("tcp: {addr}: {e}");
                    last = e.into();
                }
            }
        }
        Err(last)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> TransportResult<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self { stream })
    }

    /// Split into the two halves a session needs.
    pub fn into_link(self) -> TransportResult<Link> {
        let reader = self.stream.try_clone()?;
        Ok(Link::Pull {
            sink: Box::new(TcpCommandSink {
                stream: self.stream,
            }),
            source: Box::new(TcpReportSource { stream: reader }),
        })
    }
}

pub struct TcpCommandSink {
    stream: TcpStream,
}

impl CommandSink for TcpCommandSink {
    fn write(&mut self, frame: &[u8]) -> TransportResult<()> {
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }
}

pub struct TcpReportSource {
    stream: TcpStream,
}

impl ReportSource for TcpReportSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> TransportResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    debug!("tcp: peer closed the connection");
                    return Err(TransportError::Closed);
                }
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if filled == 0 {
                        return Err(TransportError::Timeout);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
