//! Socket Backend Trait
//!
//! The polymorphic extension point of the transport core. One
//! implementation exists per address family; the generic core depends
//! only on this trait, never on concrete backend types.

use std::sync::Arc;

use crate::error::TransportError;
use crate::slot::ConnectionSlot;
use crate::sys::Socket;

/// Address-family-specific connection establishment and accept loop
pub trait SocketBackend: Send + Sync + 'static {
    /// Short name used in log fields and the accept-thread name
    fn name(&self) -> &'static str;

    /// Establish one outbound connection (client role)
    ///
    /// Any partially created socket must be released before returning an
    /// error. Idempotence for an already-connected transport is handled
    /// by the core, not here.
    fn connect(&self) -> Result<Socket, TransportError>;

    /// Run the accept loop (server role)
    ///
    /// Expected shape: create a listening socket, bind, listen with a
    /// backlog of one, then block in accept while `ctx.is_running()`,
    /// installing each accepted connection via `ctx.install`. Bind or
    /// listen failure logs and returns; accept errors log and keep
    /// looping. Failures here are never reflected in `open`'s result.
    fn serve(&self, ctx: &ServerContext);
}

/// Handle the accept loop uses to talk back to its transport instance
pub struct ServerContext {
    slot: Arc<ConnectionSlot>,
}

impl ServerContext {
    pub(crate) fn new(slot: Arc<ConnectionSlot>) -> Self {
        Self { slot }
    }

    /// Whether the accept loop should keep running; checked only between
    /// accept calls
    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    /// Publish a newly accepted connection, superseding any previous one
    pub fn install(&self, socket: Socket) {
        self.slot.install(socket);
    }
}
