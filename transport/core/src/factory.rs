//! Transport Factory
//!
//! Construction/teardown entry points exposed to the rest of the
//! framework, one family per backend: `init` (construct + open), `close`
//! (stop server / drop socket without destroying the instance, useful
//! for reconnect cycles), and `deinit` (release the instance).
//!
//! Two allocation policies exist, chosen at compile time by the
//! `static-allocation` cargo feature:
//!
//! - **Dynamic** (default): `init` heap-allocates a fresh instance
//!   unconditionally; `deinit` releases that instance.
//! - **Static**: one reusable [`TransportSlot`] per backend kind. `init`
//!   returns `None` while the slot is occupied (resource exhaustion, not
//!   retried); `deinit` always releases the slot regardless of role or
//!   connection state.
//!
//! In both policies `init` opens the transport immediately after
//! construction and tears it back down on failure — callers never
//! receive a transport that failed to open.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::SocketBackend;
use crate::config::{TransportConfig, TransportKind};
#[cfg(target_os = "linux")]
use crate::endpoint::RpmsgEndpoint;
use crate::endpoint::TcpEndpoint;
#[cfg(target_os = "linux")]
use crate::rpmsg::{RpmsgBackend, RpmsgTransport};
use crate::tcp::{TcpBackend, TcpTransport};
use crate::transport::{Role, SocketTransport, Transport};

/// Shared handle to a transport instance
pub type TransportHandle<B> = Arc<SocketTransport<B>>;

// =============================================================================
// Static allocation slot
// =============================================================================

/// Single reusable storage slot for one transport instance
///
/// Replaces an unguarded in-use flag with an explicit acquire/release
/// contract behind a mutex: `acquire` refuses while occupied, `release`
/// always clears, closing whatever instance was held.
pub struct TransportSlot<B: SocketBackend> {
    slot: Mutex<Option<TransportHandle<B>>>,
}

impl<B: SocketBackend> TransportSlot<B> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Construct an instance in the slot, refusing if it is occupied
    pub fn acquire(
        &self,
        make: impl FnOnce() -> SocketTransport<B>,
    ) -> Option<TransportHandle<B>> {
        let mut guard = self.slot.lock();
        if guard.is_some() {
            tracing::warn!("transport slot already in use");
            return None;
        }
        let transport = Arc::new(make());
        *guard = Some(Arc::clone(&transport));
        Some(transport)
    }

    /// Release the slot, closing the held instance if any; clears the
    /// slot regardless of prior state
    pub fn release(&self) {
        if let Some(transport) = self.slot.lock().take() {
            transport.close(true);
        }
    }

    /// Whether the slot currently holds an instance
    pub fn in_use(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<B: SocketBackend> Default for TransportSlot<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a freshly constructed transport, tearing it down on failure
fn open_handle<B: SocketBackend>(
    transport: TransportHandle<B>,
    on_failure: impl FnOnce(),
) -> Option<TransportHandle<B>> {
    match transport.open() {
        Ok(()) => Some(transport),
        Err(e) => {
            tracing::warn!(
                backend = transport.backend().name(),
                error = %e,
                "open failed, tearing transport down"
            );
            transport.close(true);
            drop(transport);
            on_failure();
            None
        }
    }
}

// =============================================================================
// TCP entry points
// =============================================================================

#[cfg(feature = "static-allocation")]
static TCP_SLOT: TransportSlot<TcpBackend> = TransportSlot::new();

/// Construct, configure, and open a TCP transport
///
/// Returns `None` on allocation exhaustion (static policy only) or when
/// `open` fails; a client that cannot connect never escapes half-built.
pub fn tcp_init(host: impl Into<String>, port: u16, role: Role) -> Option<TransportHandle<TcpBackend>> {
    let endpoint = TcpEndpoint::new(host, port);

    #[cfg(feature = "static-allocation")]
    {
        let transport = TCP_SLOT.acquire(|| SocketTransport::new(TcpBackend::new(endpoint), role))?;
        open_handle(transport, || TCP_SLOT.release())
    }

    #[cfg(not(feature = "static-allocation"))]
    {
        let transport = Arc::new(SocketTransport::new(TcpBackend::new(endpoint), role));
        open_handle(transport, || {})
    }
}

/// Stop a TCP server accept loop and/or drop the active socket without
/// destroying the instance
pub fn tcp_close(transport: &TcpTransport) {
    transport.close(true);
}

/// Release a TCP transport instance
pub fn tcp_deinit(transport: TransportHandle<TcpBackend>) {
    drop(transport);

    #[cfg(feature = "static-allocation")]
    TCP_SLOT.release();
}

// =============================================================================
// Rpmsg entry points
// =============================================================================

#[cfg(all(target_os = "linux", feature = "static-allocation"))]
static RPMSG_SLOT: TransportSlot<RpmsgBackend> = TransportSlot::new();

/// Construct, configure, and open an rpmsg transport
///
/// Same contract as [`tcp_init`].
#[cfg(target_os = "linux")]
pub fn rpmsg_init(
    name: impl Into<String>,
    cpu: impl Into<String>,
    role: Role,
) -> Option<TransportHandle<RpmsgBackend>> {
    let endpoint = RpmsgEndpoint::new(name, cpu);

    #[cfg(feature = "static-allocation")]
    {
        let transport =
            RPMSG_SLOT.acquire(|| SocketTransport::new(RpmsgBackend::new(endpoint), role))?;
        open_handle(transport, || RPMSG_SLOT.release())
    }

    #[cfg(not(feature = "static-allocation"))]
    {
        let transport = Arc::new(SocketTransport::new(RpmsgBackend::new(endpoint), role));
        open_handle(transport, || {})
    }
}

/// Stop an rpmsg server accept loop and/or drop the active socket
/// without destroying the instance
#[cfg(target_os = "linux")]
pub fn rpmsg_close(transport: &RpmsgTransport) {
    transport.close(true);
}

/// Release an rpmsg transport instance
#[cfg(target_os = "linux")]
pub fn rpmsg_deinit(transport: TransportHandle<RpmsgBackend>) {
    drop(transport);

    #[cfg(feature = "static-allocation")]
    RPMSG_SLOT.release();
}

// =============================================================================
// Config-driven construction
// =============================================================================

/// Create and open a transport from configuration
///
/// Returns an erased handle the framing layer can drive without knowing
/// the address family.
pub fn from_config(config: &TransportConfig) -> Option<Arc<dyn Transport>> {
    match &config.kind {
        TransportKind::Tcp { endpoint } => {
            tcp_init(endpoint.host.clone(), endpoint.port, config.role)
                .map(|handle| handle as Arc<dyn Transport>)
        }

        #[cfg(target_os = "linux")]
        TransportKind::Rpmsg { endpoint } => {
            rpmsg_init(endpoint.name.clone(), endpoint.cpu.clone(), config.role)
                .map(|handle| handle as Arc<dyn Transport>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// Grab a port that nothing is listening on
    fn free_port() -> u16 {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);
        port
    }

    #[test]
    fn test_slot_acquire_release_cycle() {
        let slot: TransportSlot<TcpBackend> = TransportSlot::new();
        assert!(!slot.in_use());

        let make = || {
            SocketTransport::new(
                TcpBackend::new(TcpEndpoint::new("127.0.0.1", 1)),
                Role::Client,
            )
        };

        let first = slot.acquire(make).expect("empty slot must accept");
        assert!(slot.in_use());

        // Occupied slot refuses a second construction.
        assert!(slot.acquire(make).is_none());

        slot.release();
        assert!(!slot.in_use());

        // After release, construction succeeds again.
        let second = slot.acquire(make).expect("released slot must accept");

        drop(first);
        drop(second);
    }

    #[test]
    fn test_slot_release_when_empty_is_noop() {
        let slot: TransportSlot<TcpBackend> = TransportSlot::new();
        slot.release();
        slot.release();
        assert!(!slot.in_use());
    }

    #[cfg(not(feature = "static-allocation"))]
    #[test]
    fn test_tcp_init_client_open_failure_returns_none() {
        // Nothing listens on this port, so the client open must fail and
        // init must hand back nothing.
        let result = tcp_init("127.0.0.1", free_port(), Role::Client);
        assert!(result.is_none());
    }

    #[cfg(not(feature = "static-allocation"))]
    #[test]
    fn test_tcp_init_server_reports_success_unconditionally() {
        let server = tcp_init("127.0.0.1", free_port(), Role::Server)
            .expect("server open never reflects worker failures");

        tcp_close(&server);
        tcp_deinit(server);
    }

    #[cfg(not(feature = "static-allocation"))]
    #[test]
    fn test_from_config_tcp_client_without_peer() {
        let config = TransportConfig::tcp("127.0.0.1", free_port(), Role::Client);
        assert!(from_config(&config).is_none());
    }

    // The static slot is process-global, so the whole policy is
    // exercised in a single test to keep the harness race-free.
    #[cfg(feature = "static-allocation")]
    #[test]
    fn test_static_policy_exhaustion_and_reuse() {
        let port = free_port();

        let first = tcp_init("127.0.0.1", port, Role::Server).expect("slot starts empty");

        // Slot occupied: second init refuses.
        assert!(tcp_init("127.0.0.1", free_port(), Role::Server).is_none());

        tcp_deinit(first);

        // Released: init succeeds again.
        let second = tcp_init("127.0.0.1", free_port(), Role::Server).expect("slot released");
        tcp_deinit(second);

        // A failed open must release the slot as part of teardown.
        assert!(tcp_init("127.0.0.1", free_port(), Role::Client).is_none());
        let third = tcp_init("127.0.0.1", free_port(), Role::Server)
            .expect("failed init must not leak the slot");
        tcp_deinit(third);
    }
}
