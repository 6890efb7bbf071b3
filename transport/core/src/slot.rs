//! Connection Slot
//!
//! Synchronized exchange point for the single live connection of a
//! transport instance. The accept worker publishes newly accepted
//! connections here; caller threads wait on it for the connection to
//! become live and snapshot it for the duration of one transfer.
//!
//! The slot also carries the server run flag. Clearing the flag is a
//! signal only: a worker parked in a blocking accept does not wake until
//! a connection actually arrives, after which it re-checks the flag and
//! exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::sys::Socket;

/// Holds at most one live connection and the server run flag
pub struct ConnectionSlot {
    conn: Mutex<Option<Arc<Socket>>>,
    available: Condvar,
    running: AtomicBool,
}

impl ConnectionSlot {
    /// Create an empty slot with the run flag cleared
    pub fn new() -> Self {
        Self {
            conn: Mutex::new(None),
            available: Condvar::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Publish a newly established connection, superseding any previous
    /// one, and wake every thread waiting in [`wait_connected`]
    ///
    /// Only one live peer is supported at a time; a transfer already in
    /// flight on the superseded connection completes (or fails) on that
    /// descriptor and the next operation observes the new one.
    ///
    /// [`wait_connected`]: Self::wait_connected
    pub fn install(&self, socket: Socket) {
        let mut guard = self.conn.lock();
        *guard = Some(Arc::new(socket));
        self.available.notify_all();
    }

    /// Block until a connection is live, then return a handle to it
    ///
    /// There is no timeout: this is the synchronous hand-off between the
    /// accept worker and the caller thread.
    pub fn wait_connected(&self) -> Arc<Socket> {
        let mut guard = self.conn.lock();
        loop {
            if let Some(socket) = guard.as_ref() {
                return Arc::clone(socket);
            }
            self.available.wait(&mut guard);
        }
    }

    /// Non-blocking snapshot of the current connection
    pub fn current(&self) -> Option<Arc<Socket>> {
        self.conn.lock().clone()
    }

    /// Whether a connection is currently live
    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Take the current connection out of the slot, if any
    pub fn clear(&self) -> Option<Arc<Socket>> {
        self.conn.lock().take()
    }

    /// Drop the live connection only if it is still `socket`
    ///
    /// Used by the graceful-close detection paths so that a connection
    /// installed by a superseding accept is not clobbered.
    pub fn clear_if(&self, socket: &Arc<Socket>) {
        let mut guard = self.conn.lock();
        if let Some(current) = guard.as_ref() {
            if Arc::ptr_eq(current, socket) {
                *guard = None;
            }
        }
    }

    /// Set the run flag; the accept loop keeps looping while it is set
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clear the run flag (signal only, see module docs)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the accept loop should keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_install_wakes_waiter() {
        let slot = Arc::new(ConnectionSlot::new());

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.wait_connected())
        };

        // Give the waiter time to park on the condvar.
        thread::sleep(Duration::from_millis(50));
        assert!(!slot.is_connected());

        let (a, _b) = Socket::pair().unwrap();
        slot.install(a);

        waiter.join().unwrap();
        assert!(slot.is_connected());
    }

    #[test]
    fn test_current_non_blocking() {
        let slot = ConnectionSlot::new();
        assert!(slot.current().is_none());

        let (a, _b) = Socket::pair().unwrap();
        slot.install(a);
        assert!(slot.current().is_some());
    }

    #[test]
    fn test_clear_if_only_drops_matching_connection() {
        let slot = ConnectionSlot::new();

        let (a, _a_peer) = Socket::pair().unwrap();
        slot.install(a);
        let first = slot.current().unwrap();

        // A superseding accept installs a fresh connection.
        let (b, _b_peer) = Socket::pair().unwrap();
        slot.install(b);

        // Late graceful-close detection on the old connection must not
        // clobber the new one.
        slot.clear_if(&first);
        assert!(slot.is_connected());

        let second = slot.current().unwrap();
        slot.clear_if(&second);
        assert!(!slot.is_connected());
    }

    #[test]
    fn test_run_flag() {
        let slot = ConnectionSlot::new();
        assert!(!slot.is_running());
        slot.start();
        assert!(slot.is_running());
        slot.stop();
        assert!(!slot.is_running());
    }
}
