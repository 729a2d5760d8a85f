//! # Shutdown sequence.
//!
//! Runs on the handler thread once the loop has exited, whether on `term` or
//! on a fatal transport error.
//!
//! ```text
//! lifecycle = ShuttingDown
//! registry.write() {
//!     exited.cancel()              later subscribe/cancel see "subscription backend exited"
//!     drop control front
//!     for topic with consumers:
//!         publisher.set_unsubscribe(topic)   (best effort)
//!         close every queue                  (consumers observe closure)
//! }
//! handler sockets dropped
//! lifecycle = Exited, stopped      (ExitGuard, also on panic)
//! ```

use std::sync::Arc;

use tracing::debug;

use super::{Lifecycle, Shared};

/// Closes every consumer queue and marks the backend as exited.
pub(crate) fn run(shared: &Shared, publisher: &zmq::Socket) {
    shared.lifecycle.advance(Lifecycle::ShuttingDown);

    let mut registry = shared.registry.write();
    shared.exited.cancel();
    drop(shared.control.lock().take());

    for (topic, queues) in registry.close_all() {
        if let Err(e) = publisher.set_unsubscribe(topic.as_bytes()) {
            debug!(%topic, error = %e, "could not clear topic filter during shutdown");
        }
        debug!(%topic, queues, "closed consumer queues");
    }
}

/// Guarantees the exited state is reached even if the handler thread unwinds.
pub(crate) struct ExitGuard {
    shared: Arc<Shared>,
}

impl ExitGuard {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        // No-op after a normal `run`: the token is already cancelled and the
        // registry already empty.
        {
            let mut registry = self.shared.registry.write();
            self.shared.exited.cancel();
            drop(self.shared.control.lock().take());
            registry.close_all();
        }
        self.shared.lifecycle.advance(Lifecycle::Exited);
        self.shared.stopped.cancel();
    }
}
