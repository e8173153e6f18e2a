//! Network side of the bridge: a listener handing out one connection at a time.
//!
//! Both waits in the system live here. [`Listener::accept()`] waits at most the
//! accept budget for a pending connection, and [`Connection::read()`] waits at most
//! the read budget for request bytes. Both bounds are enforced by a blocking
//! primitive with a timeout (a channel receive and a socket read), never by
//! checking elapsed time.

use log::debug;
use snafu::{ResultExt, Snafu};

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

/// Error type for this module
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum TransportError {
    /// The wait budget ran out before any data arrived.
    #[snafu(display("Timed out"))]
    Timeout,
    /// Send, receive or close failed.
    #[snafu(display("Transport error: {}", source))]
    Io { source: io::Error },
}

impl TransportError {
    /// Classify an I/O error, treating `WouldBlock` and `TimedOut` as [`Self::Timeout`].
    pub fn from_io(source: io::Error) -> Self {
        match source.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => TimeoutSnafu.build(),
            _ => Self::Io { source },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        Self::from_io(source)
    }
}

/// One accepted client connection.
pub trait Connection {
    /// Read into `buf`, waiting no longer than `timeout` for the first byte.
    ///
    /// `Ok(0)` means the peer closed its side without sending anything.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Send all of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Release the connection.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Source of client connections.
pub trait Listener {
    type Conn: Connection;

    /// Wait at most `timeout` for a connection. `Ok(None)` if none arrived.
    fn accept(&mut self, timeout: Duration) -> Result<Option<Self::Conn>, TransportError>;
}

type Incoming = io::Result<(TcpStream, SocketAddr)>;

/// [`Listener`] over a [`TcpListener`].
///
/// A helper thread blocks in `accept` and hands each connection over through a
/// rendezvous channel, so [`Listener::accept()`] is a single `recv_timeout` that
/// returns as soon as a client connects. The channel holds nothing: the helper
/// waits until the loop takes the connection before accepting the next one.
#[derive(Debug)]
pub struct TcpAcceptor {
    incoming: Receiver<Incoming>,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// Take over `listener` and start the accept thread.
    pub fn new(listener: TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(false)?;
        let (tx, incoming) = mpsc::sync_channel::<Incoming>(0);
        thread::Builder::new()
            .name("tcp-accept".into())
            .spawn(move || accept_loop(&listener, &tx))?;
        Ok(Self {
            incoming,
            local_addr,
        })
    }

    /// Bind a new listener on `addr`.
    pub fn bind(addr: impl std::net::ToSocketAddrs) -> io::Result<Self> {
        Self::new(TcpListener::bind(addr)?)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

// Ends once the acceptor is dropped and the next connection can't be handed over.
fn accept_loop(listener: &TcpListener, tx: &SyncSender<Incoming>) {
    while tx.send(listener.accept()).is_ok() {}
    debug!("accept thread stopped");
}

impl Listener for TcpAcceptor {
    type Conn = TcpConnection;

    fn accept(&mut self, timeout: Duration) -> Result<Option<TcpConnection>, TransportError> {
        match self.incoming.recv_timeout(timeout) {
            Ok(Ok((stream, peer))) => {
                debug!("client connected: {}", peer);
                Ok(Some(TcpConnection { stream, peer }))
            }
            Ok(Err(e)) => Err(e).context(IoSnafu),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(ErrorKind::BrokenPipe, "accept thread exited")).context(IoSnafu)
            }
        }
    }
}

/// [`Connection`] over a [`TcpStream`].
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        // a zero duration means "block forever" to the socket API
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;
        Ok(self.stream.read(buf)?)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(data).context(IoSnafu)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e).context(IoSnafu),
            _ => Ok(()),
        }
    }
}
