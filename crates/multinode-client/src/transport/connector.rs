//! Connection establishment and the single request/response exchange.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use multinode_config::CoordinatorEndpoint;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Sockets reject a zero timeout, so shorter bounds are raised to this.
const MIN_EXCHANGE_TIMEOUT: Duration = Duration::from_millis(1);

/// One open connection to the coordinator.
pub trait Connection {
    /// Writes the whole request, then half-closes the write side so the
    /// coordinator sees end of input.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error.
    fn send_request(&mut self, request: &[u8]) -> io::Result<()>;

    /// Performs a single read of at most `blocksize` bytes.
    ///
    /// Replies are not framed; anything beyond `blocksize` is discarded with
    /// the connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error.
    fn read_response(&mut self, blocksize: usize) -> io::Result<Vec<u8>>;

    /// Bounds how long the exchange may block. `None` blocks until the
    /// coordinator answers.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error.
    fn set_exchange_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

/// Opens connections to the coordinator.
pub trait Connector {
    /// Connection type produced.
    type Connection: Connection;

    /// Opens a fresh connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the resolution or connection error.
    fn connect(&self, endpoint: &CoordinatorEndpoint) -> io::Result<Self::Connection>;
}

/// Plain TCP connector with `SO_REUSEADDR` set on every socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Connection = TcpStream;

    fn connect(&self, endpoint: &CoordinatorEndpoint) -> io::Result<TcpStream> {
        let address = resolve_tcp_address(endpoint.host(), endpoint.port())?;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.connect_timeout(&SockAddr::from(address), CONNECTION_TIMEOUT)?;
        Ok(socket.into())
    }
}

impl Connection for TcpStream {
    fn send_request(&mut self, request: &[u8]) -> io::Result<()> {
        self.write_all(request)?;
        self.flush()?;
        self.shutdown(Shutdown::Write)
    }

    fn read_response(&mut self, blocksize: usize) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; blocksize];
        let received = self.read(&mut buffer)?;
        buffer.truncate(received);
        Ok(buffer)
    }

    fn set_exchange_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let bounded = timeout.map(|limit| limit.max(MIN_EXCHANGE_TIMEOUT));
        self.set_read_timeout(bounded)?;
        self.set_write_timeout(bounded)
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}
