//! Wirecall Transport - Blocking Socket Transport Layer
//!
//! This crate provides the byte-stream transport layer of the wirecall
//! RPC framework: a byte-exact, blocking, bidirectional channel over
//! socket-like address families, usable in a client role (one outbound
//! connection) or a server role (one inbound connection accepted on a
//! dedicated background thread).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Framing layer                         │
//! │        (message boundaries, CRC - not this crate)         │
//! └───────────────────────────┬──────────────────────────────┘
//!                 send(buf) / receive(buf)
//! ┌───────────────────────────┴──────────────────────────────┐
//! │              SocketTransport<B> (generic core)            │
//! │   role, connection slot, accept thread, partial-I/O loops │
//! └──────────────┬───────────────────────────┬───────────────┘
//!                │ SocketBackend             │
//!        ┌───────┴────────┐         ┌────────┴───────┐
//!        │   TcpBackend   │         │  RpmsgBackend  │
//!        │  (host, port)  │         │  (name @ cpu)  │
//!        └────────────────┘         └────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SocketTransport`]: generic open/close/send/receive core
//! - [`SocketBackend`]: per-address-family extension point
//! - [`TcpTransport`] / [`RpmsgTransport`]: concrete instances
//! - [`TransportError`]: the status taxonomy surfaced to the framing layer
//! - [`factory`]: init/close/deinit entry points with static or dynamic
//!   allocation policy
//!
//! # Contract
//!
//! `send` and `receive` either transfer exactly the requested number of
//! bytes or fail with a [`TransportError`]; a partial transfer is never
//! reported as success. `receive` blocks without timeout until a
//! connection is live. All operations are blocking; a server instance
//! runs exactly one accept thread for its whole lifetime, and only one
//! live peer connection is supported at a time.

pub mod backend;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
#[cfg(target_os = "linux")]
pub mod rpmsg;
pub mod slot;
pub mod sys;
pub mod tcp;
pub mod transport;

// Re-exports for convenience
pub use backend::{ServerContext, SocketBackend};
pub use config::{TransportConfig, TransportKind};
pub use endpoint::{RpmsgEndpoint, TcpEndpoint, RPMSG_NAME_MAX};
pub use error::TransportError;
pub use factory::{from_config, tcp_close, tcp_deinit, tcp_init, TransportHandle, TransportSlot};
#[cfg(target_os = "linux")]
pub use factory::{rpmsg_close, rpmsg_deinit, rpmsg_init};
#[cfg(target_os = "linux")]
pub use rpmsg::{RpmsgBackend, RpmsgTransport};
pub use tcp::{TcpBackend, TcpTransport};
pub use transport::{Role, SocketTransport, Transport};
