//! Socket Transport Core
//!
//! Generic open/close/send/receive logic shared by every backend. Owns
//! the role, the connection slot, and the accept-thread handle; delegates
//! connection establishment and the accept loop to a [`SocketBackend`].
//!
//! Byte-stream contract for the framing layer: `send` and `receive`
//! either transfer exactly the requested number of bytes or fail with a
//! [`TransportError`] — never a silent partial transfer reported as
//! success.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{ServerContext, SocketBackend};
use crate::error::TransportError;
use crate::slot::ConnectionSlot;

/// Which side of the connection this instance plays; fixed at
/// construction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Initiate one outbound connection
    Client,
    /// Accept one inbound connection on a background thread
    Server,
}

/// Object-safe byte-stream surface handed to the framing layer
///
/// Implemented by [`SocketTransport`] for every backend, so the framing
/// layer can hold a `dyn Transport` without knowing the address family.
pub trait Transport: Send + Sync {
    /// Fill `buf` exactly or fail; see [`SocketTransport::receive`]
    fn receive(&self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write `buf` exactly or fail; see [`SocketTransport::send`]
    fn send(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Stop the server accept loop and/or drop the active socket
    fn close(&self, stop_server: bool);

    /// Whether a connection is currently live
    fn is_connected(&self) -> bool;

    /// The role this instance was constructed with
    fn role(&self) -> Role;
}

/// Transport instance over one backend
///
/// All operations take `&self` and may be invoked concurrently from a
/// caller thread while the accept worker runs; the only shared mutable
/// state is exchanged through the synchronized [`ConnectionSlot`].
pub struct SocketTransport<B: SocketBackend> {
    role: Role,
    backend: Arc<B>,
    slot: Arc<ConnectionSlot>,
    /// Accept-thread handle; `Some` once a server instance has opened
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<B: SocketBackend> SocketTransport<B> {
    /// Create a transport in the given role; no connection is attempted
    /// until [`open`](Self::open)
    pub fn new(backend: B, role: Role) -> Self {
        Self {
            role,
            backend: Arc::new(backend),
            slot: Arc::new(ConnectionSlot::new()),
            accept_thread: Mutex::new(None),
        }
    }

    /// Backend accessor, used by the concrete aliases to expose
    /// `configure`
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open the transport
    ///
    /// Client role: connects synchronously and returns the result; a
    /// second call on an already-connected client succeeds without
    /// reconnecting. Server role: sets the run flag and starts exactly
    /// one accept thread, then returns `Ok` unconditionally — the
    /// worker's own bind/listen/accept failures are logged, never
    /// reflected here.
    pub fn open(&self) -> Result<(), TransportError> {
        match self.role {
            Role::Client => {
                if self.slot.is_connected() {
                    tracing::debug!(backend = self.backend.name(), "already connected");
                    return Ok(());
                }
                let socket = self.backend.connect()?;
                self.slot.install(socket);
                Ok(())
            }
            Role::Server => {
                let mut guard = self.accept_thread.lock();
                if guard.is_some() {
                    return Ok(());
                }
                self.slot.start();

                let backend = Arc::clone(&self.backend);
                let slot = Arc::clone(&self.slot);
                let handle = thread::Builder::new()
                    .name(format!("{}-accept", backend.name()))
                    .spawn(move || {
                        let ctx = ServerContext::new(slot);
                        backend.serve(&ctx);
                    })
                    .map_err(|e| {
                        TransportError::ConnectionFailure(format!(
                            "failed to spawn accept thread: {e}"
                        ))
                    })?;
                *guard = Some(handle);
                Ok(())
            }
        }
    }

    /// Close the transport; idempotent, never faults
    ///
    /// If this is a server and `stop_server` is true, clears the run flag
    /// (signal only; a worker parked in accept stays parked until a
    /// connection arrives). Any live socket is shut down and dropped.
    pub fn close(&self, stop_server: bool) {
        if self.role == Role::Server && stop_server {
            self.slot.stop();
        }
        if let Some(socket) = self.slot.clear() {
            socket.shutdown();
            tracing::debug!(backend = self.backend.name(), "socket closed");
        }
    }

    /// Receive exactly `buf.len()` bytes
    ///
    /// Blocks without timeout until a connection is live (the hand-off
    /// with the accept worker), then loops reading the remaining tail.
    /// A zero-length read means the peer closed gracefully: the local
    /// socket is closed (the server keeps running) and
    /// `ConnectionClosed` is returned. Any other read error returns
    /// `ReceiveFailed` without closing the socket. On failure the buffer
    /// may hold a partial prefix.
    pub fn receive(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        let socket = self.slot.wait_connected();

        let mut filled = 0;
        while filled < buf.len() {
            match socket.read(&mut buf[filled..]) {
                Ok(0) => {
                    tracing::debug!(backend = self.backend.name(), "connection closed by peer");
                    socket.shutdown();
                    self.slot.clear_if(&socket);
                    return Err(TransportError::ConnectionClosed);
                }
                Ok(n) => filled += n,
                Err(e) => {
                    tracing::warn!(backend = self.backend.name(), error = %e, "read error");
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Send exactly `buf.len()` bytes
    ///
    /// With no live connection this fails immediately with
    /// `ConnectionFailure` — pretending success here would deadlock the
    /// framing layer waiting for a reply. Otherwise loops writing the
    /// remaining tail; a broken pipe closes the local socket (not the
    /// server) and returns `ConnectionClosed`, any other write error
    /// returns `SendFailed`.
    pub fn send(&self, buf: &[u8]) -> Result<(), TransportError> {
        let Some(socket) = self.slot.current() else {
            return Err(TransportError::ConnectionFailure(
                "no connection established".to_string(),
            ));
        };

        let mut sent = 0;
        while sent < buf.len() {
            match socket.write(&buf[sent..]) {
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!(backend = self.backend.name(), "peer gone, pipe broken");
                    socket.shutdown();
                    self.slot.clear_if(&socket);
                    return Err(TransportError::ConnectionClosed);
                }
                Err(e) => {
                    tracing::warn!(backend = self.backend.name(), error = %e, "write error");
                    return Err(TransportError::SendFailed(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Whether a connection is currently live
    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    /// The role this instance was constructed with
    pub fn role(&self) -> Role {
        self.role
    }
}

impl<B: SocketBackend> Transport for SocketTransport<B> {
    fn receive(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        SocketTransport::receive(self, buf)
    }

    fn send(&self, buf: &[u8]) -> Result<(), TransportError> {
        SocketTransport::send(self, buf)
    }

    fn close(&self, stop_server: bool) {
        SocketTransport::close(self, stop_server);
    }

    fn is_connected(&self) -> bool {
        SocketTransport::is_connected(self)
    }

    fn role(&self) -> Role {
        SocketTransport::role(self)
    }
}

impl<B: SocketBackend> Drop for SocketTransport<B> {
    fn drop(&mut self) {
        self.close(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::Socket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Backend whose connect always fails and whose accept loop idles,
    /// counting invocations
    struct StubBackend {
        connects: AtomicUsize,
        serves: Arc<AtomicUsize>,
    }

    impl StubBackend {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                serves: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SocketBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn connect(&self) -> Result<Socket, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::ConnectionFailure("stub".to_string()))
        }

        fn serve(&self, ctx: &ServerContext) {
            self.serves.fetch_add(1, Ordering::SeqCst);
            while ctx.is_running() {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    #[test]
    fn test_send_without_connection_fails_immediately() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Server);

        let start = std::time::Instant::now();
        let result = transport.send(&[1, 2, 3, 4]);

        assert!(matches!(result, Err(TransportError::ConnectionFailure(_))));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_client_open_propagates_connect_failure() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Client);

        let result = transport.open();
        assert!(matches!(result, Err(TransportError::ConnectionFailure(_))));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_client_open_idempotent_when_connected() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Client);

        // Pretend a previous open established a connection.
        let (a, _peer) = Socket::pair().unwrap();
        transport.slot.install(a);

        transport.open().unwrap();
        assert_eq!(transport.backend().connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_server_open_starts_exactly_one_thread() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Server);
        let serves = Arc::clone(&transport.backend().serves);

        transport.open().unwrap();
        transport.open().unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(serves.load(Ordering::SeqCst), 1);

        transport.close(true);
    }

    #[test]
    fn test_receive_blocks_until_connection_installed() {
        let transport = Arc::new(SocketTransport::new(StubBackend::new(), Role::Server));

        let (done_tx, done_rx) = mpsc::channel();
        let receiver = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                let result = transport.receive(&mut buf);
                done_tx.send(()).unwrap();
                (result, buf)
            })
        };

        // No connection yet: the receive must still be parked.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        let (server_end, client_end) = Socket::pair().unwrap();
        transport.slot.install(server_end);
        assert_eq!(client_end.write(&[9, 8, 7, 6]).unwrap(), 4);

        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let (result, buf) = receiver.join().unwrap();
        result.unwrap();
        assert_eq!(buf, [9, 8, 7, 6]);
    }

    #[test]
    fn test_receive_reports_graceful_close_and_drops_socket() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Server);

        let (server_end, client_end) = Socket::pair().unwrap();
        transport.slot.install(server_end);
        drop(client_end);

        let mut buf = [0u8; 4];
        let result = transport.receive(&mut buf);

        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_close_idempotent() {
        let transport = SocketTransport::new(StubBackend::new(), Role::Server);

        let (server_end, _client_end) = Socket::pair().unwrap();
        transport.slot.install(server_end);

        transport.close(true);
        assert!(!transport.is_connected());

        // Second close is a no-op with respect to the descriptor.
        transport.close(true);
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_receive_exact_across_partial_reads() {
        let transport = Arc::new(SocketTransport::new(StubBackend::new(), Role::Server));

        let (server_end, client_end) = Socket::pair().unwrap();
        transport.slot.install(server_end);

        // Feed the payload in two separated chunks so the read loop has
        // to iterate.
        let writer = thread::spawn(move || {
            client_end.write(&[1, 2, 3]).unwrap();
            thread::sleep(Duration::from_millis(50));
            client_end.write(&[4, 5, 6, 7, 8]).unwrap();
        });

        let mut buf = [0u8; 8];
        transport.receive(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

        writer.join().unwrap();
    }
}
