//! # Handler loop: poll, decode, dispatch, obey control frames.
//!
//! ```text
//! loop {
//!   zmq::poll([publisher, control-back], ∞)
//!   ├─ publisher readable ─► recv_multipart ─► mark last-seen ─► decode
//!   │                          ├─ Ok(n)  ─► registry.read().dispatch(n)   (drop-oldest, never blocks)
//!   │                          └─ Err(_) ─► drop frame
//!   └─ control readable   ─► recv_multipart
//!                              ├─ subscribe <t>   ─► publisher.set_subscribe(t)
//!                              ├─ unsubscribe <t> ─► publisher.set_unsubscribe(t)
//!                              └─ term            ─► break
//! }
//! shutdown::run()
//! ```
//!
//! Receive and filter errors are fatal: the loop exits straight into the
//! shutdown sequence. They are logged, never returned to a caller.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, trace, warn};

use crate::events::decode;
use crate::transport::ControlCommand;

use super::{Shared, shutdown};

/// Name of the handler thread.
pub(crate) const THREAD_NAME: &str = "vigilante-zmq-handler";

/// Why the loop stopped.
#[derive(Debug, thiserror::Error)]
enum Fatal {
    #[error("poll failed: {0}")]
    Poll(#[source] zmq::Error),

    #[error("receive on {socket} socket failed: {source}")]
    Recv {
        socket: &'static str,
        #[source]
        source: zmq::Error,
    },

    #[error("{verb} filter {topic} failed: {source}")]
    Filter {
        verb: &'static str,
        topic: crate::events::Topic,
        #[source]
        source: zmq::Error,
    },
}

enum Flow {
    Continue,
    Term,
}

/// Owns the handler-side sockets; moved onto the handler thread.
pub(crate) struct Handler {
    publisher: zmq::Socket,
    control: zmq::Socket,
    shared: Arc<Shared>,
}

impl Handler {
    pub(crate) fn new(publisher: zmq::Socket, control: zmq::Socket, shared: Arc<Shared>) -> Self {
        Self {
            publisher,
            control,
            shared,
        }
    }

    /// Starts the handler on a dedicated OS thread.
    pub(crate) fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || self.run())
    }

    fn run(self) {
        let _guard = shutdown::ExitGuard::new(Arc::clone(&self.shared));

        match self.event_loop() {
            Ok(()) => info!("handler received term"),
            Err(e) => error!(error = %e, "handler stopped on transport error"),
        }

        shutdown::run(&self.shared, &self.publisher);
        // Sockets close here, before the guard marks the subscriber exited.
        drop(self);
    }

    fn event_loop(&self) -> Result<(), Fatal> {
        loop {
            let (publisher_ready, control_ready) = {
                let mut items = [
                    self.publisher.as_poll_item(zmq::POLLIN),
                    self.control.as_poll_item(zmq::POLLIN),
                ];
                match zmq::poll(&mut items, -1) {
                    Ok(_) => {}
                    Err(zmq::Error::EINTR) => continue,
                    Err(e) => return Err(Fatal::Poll(e)),
                }
                (items[0].is_readable(), items[1].is_readable())
            };

            if publisher_ready {
                self.on_publisher()?;
            }
            if control_ready {
                if let Flow::Term = self.on_control()? {
                    return Ok(());
                }
            }
        }
    }

    fn on_publisher(&self) -> Result<(), Fatal> {
        let frames = self
            .publisher
            .recv_multipart(0)
            .map_err(|source| Fatal::Recv {
                socket: "publisher",
                source,
            })?;
        self.shared.last_seen.mark();

        let notification = match decode(&frames) {
            Ok(n) => n,
            Err(e) => {
                trace!(
                    reason = e.as_label(),
                    unrecognized = e.is_unrecognized(),
                    error = %e,
                    "dropping publisher frame"
                );
                return Ok(());
            }
        };

        let stats = self.shared.registry.read().dispatch(&notification);
        if stats.displaced > 0 {
            trace!(
                topic = %notification.topic(),
                displaced = stats.displaced,
                delivered = stats.delivered,
                "consumer queue full, dropped oldest event"
            );
        }
        Ok(())
    }

    fn on_control(&self) -> Result<Flow, Fatal> {
        let frames = self
            .control
            .recv_multipart(0)
            .map_err(|source| Fatal::Recv {
                socket: "control",
                source,
            })?;

        match ControlCommand::decode(&frames) {
            Some(ControlCommand::Subscribe(topic)) => {
                self.publisher
                    .set_subscribe(topic.as_bytes())
                    .map_err(|source| Fatal::Filter {
                        verb: "subscribe",
                        topic,
                        source,
                    })?;
                debug!(%topic, "topic filter installed");
            }
            Some(ControlCommand::Unsubscribe(topic)) => {
                self.publisher
                    .set_unsubscribe(topic.as_bytes())
                    .map_err(|source| Fatal::Filter {
                        verb: "unsubscribe",
                        topic,
                        source,
                    })?;
                debug!(%topic, "topic filter removed");
            }
            Some(ControlCommand::Term) => return Ok(Flow::Term),
            None => warn!(parts = frames.len(), "ignoring malformed control frame"),
        }
        Ok(Flow::Continue)
    }
}
