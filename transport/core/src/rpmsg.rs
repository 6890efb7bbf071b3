//! Rpmsg Socket Backend
//!
//! Connection establishment and accept loop for the inter-processor
//! rpmsg socket family used on heterogeneous multicore platforms, where
//! the peer lives on another CPU behind the rpmsg bus. Same shape as the
//! TCP backend, differing only in the address family and the endpoint
//! fields (remote socket name + remote CPU name).
//!
//! All socket calls go through the `sys` adapter; the address family is
//! not part of the portable socket API, so this backend is gated to
//! Linux-like kernels that ship the rpmsg socket driver.

use parking_lot::RwLock;

use crate::backend::{ServerContext, SocketBackend};
use crate::endpoint::RpmsgEndpoint;
use crate::error::TransportError;
use crate::sys::{self, SockaddrRpmsg, Socket};
use crate::transport::SocketTransport;

/// Transport instance over the rpmsg socket backend
pub type RpmsgTransport = SocketTransport<RpmsgBackend>;

impl RpmsgTransport {
    /// (Re)set remote socket name and remote CPU name; safe any time
    /// before the connection is meaningfully used
    pub fn configure(&self, name: impl Into<String>, cpu: impl Into<String>) {
        self.backend().configure(name, cpu);
    }
}

/// Rpmsg socket connection establishment and accept loop
pub struct RpmsgBackend {
    endpoint: RwLock<RpmsgEndpoint>,
}

impl RpmsgBackend {
    /// Create a backend addressing the given endpoint
    pub fn new(endpoint: RpmsgEndpoint) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
        }
    }

    /// (Re)set remote socket name and remote CPU name; over-long names
    /// are truncated, not rejected
    pub fn configure(&self, name: impl Into<String>, cpu: impl Into<String>) {
        *self.endpoint.write() = RpmsgEndpoint::new(name, cpu);
    }

    /// Current endpoint snapshot
    pub fn endpoint(&self) -> RpmsgEndpoint {
        self.endpoint.read().clone()
    }
}

impl SocketBackend for RpmsgBackend {
    fn name(&self) -> &'static str {
        "rpmsg"
    }

    fn connect(&self) -> Result<Socket, TransportError> {
        let endpoint = self.endpoint();
        let addr = SockaddrRpmsg::from_endpoint(&endpoint);

        let socket = sys::rpmsg_socket().map_err(|e| {
            TransportError::ConnectionFailure(format!("rpmsg socket create failed: {e}"))
        })?;
        // The partially created socket is dropped (closed) on the error
        // path.
        sys::rpmsg_connect(&socket, &addr).map_err(|e| {
            TransportError::ConnectionFailure(format!("failed to connect to {}: {e}", endpoint))
        })?;

        tracing::info!(endpoint = %endpoint, "connected");
        Ok(socket)
    }

    fn serve(&self, ctx: &ServerContext) {
        let endpoint = self.endpoint();
        let addr = SockaddrRpmsg::from_endpoint(&endpoint);

        let listener = match sys::rpmsg_socket() {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create server socket");
                return;
            }
        };

        if let Err(e) = sys::rpmsg_bind(&listener, &addr) {
            tracing::warn!(endpoint = %endpoint, error = %e, "bind failed");
            return;
        }
        // One pending connection: only a single live peer is supported.
        if let Err(e) = sys::rpmsg_listen(&listener, 1) {
            tracing::warn!(endpoint = %endpoint, error = %e, "listen failed");
            return;
        }
        tracing::info!(endpoint = %endpoint, "listening for connections");

        while ctx.is_running() {
            match sys::rpmsg_accept(&listener) {
                Ok(socket) => {
                    tracing::info!(endpoint = %endpoint, "accepted connection");
                    ctx.install(socket);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
        // Listening socket closed on drop.
    }
}
