//! TCP Backend
//!
//! Connection establishment and accept loop for the IP/TCP address
//! family. Listener setup goes through `socket2` so the backlog can be
//! pinned to one pending connection, matching the single-peer model of
//! the transport core.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use parking_lot::RwLock;
use socket2::{Domain, Type};

use crate::backend::{ServerContext, SocketBackend};
use crate::endpoint::TcpEndpoint;
use crate::error::TransportError;
use crate::sys::Socket;
use crate::transport::SocketTransport;

/// Transport instance over the TCP backend
pub type TcpTransport = SocketTransport<TcpBackend>;

impl TcpTransport {
    /// (Re)set host and port of this transport; safe any time before the
    /// connection is meaningfully used
    pub fn configure(&self, host: impl Into<String>, port: u16) {
        self.backend().configure(host, port);
    }
}

/// TCP connection establishment and accept loop
pub struct TcpBackend {
    endpoint: RwLock<TcpEndpoint>,
}

impl TcpBackend {
    /// Create a backend addressing the given endpoint
    pub fn new(endpoint: TcpEndpoint) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
        }
    }

    /// (Re)set host and port; safe any time before the connection is
    /// meaningfully used
    pub fn configure(&self, host: impl Into<String>, port: u16) {
        *self.endpoint.write() = TcpEndpoint::new(host, port);
    }

    /// Current endpoint snapshot
    pub fn endpoint(&self) -> TcpEndpoint {
        self.endpoint.read().clone()
    }

    fn bind_listener(&self, endpoint: &TcpEndpoint) -> io::Result<TcpListener> {
        let addr = resolve(endpoint)?;
        let socket = socket2::Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        // One pending connection: only a single live peer is supported.
        socket.listen(1)?;
        Ok(socket.into())
    }
}

/// Resolve an endpoint to its first socket address
fn resolve(endpoint: &TcpEndpoint) -> io::Result<SocketAddr> {
    (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", endpoint),
            )
        })
}

impl SocketBackend for TcpBackend {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn connect(&self) -> Result<Socket, TransportError> {
        let endpoint = self.endpoint();

        let addr = resolve(&endpoint).map_err(|e| {
            TransportError::ConnectionFailure(format!("failed to resolve {}: {e}", endpoint))
        })?;
        let stream = TcpStream::connect(addr).map_err(|e| {
            TransportError::ConnectionFailure(format!("failed to connect to {}: {e}", endpoint))
        })?;
        stream.set_nodelay(true).ok();

        tracing::info!(endpoint = %endpoint, "connected");
        Ok(Socket::from(stream))
    }

    fn serve(&self, ctx: &ServerContext) {
        let endpoint = self.endpoint();

        let listener = match self.bind_listener(&endpoint) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "bind failed");
                return;
            }
        };
        tracing::info!(endpoint = %endpoint, "listening for connections");

        while ctx.is_running() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nodelay(true).ok();
                    tracing::info!(peer = %peer, "accepted connection");
                    ctx.install(Socket::from(stream));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
        // Listening socket closed on drop.
    }
}
