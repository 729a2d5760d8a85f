//! # Subscriber: public entry point.
//!
//! Owns the transport, the handler thread and the subscription registry.
//!
//! ## Subscribe path
//! ```text
//! subscribe_hash_block()
//!   └─► registry.write() {
//!         disabled?        → SubscribeError::Disabled
//!         exited?          → SubscribeError::Exited
//!         list empty?      → front.send(subscribe hashblock)   (error → list unchanged)
//!         queue = channel(capacity); list.push(queue)
//!       }
//!   └─► Subscription { queue, CancelHandle }
//! ```
//!
//! ## Close path
//! ```text
//! close()
//!   ├─ closed.compare_exchange(false → true)   losers: CloseError::AlreadyClosed
//!   ├─ registry.write() { front.send(term) }   skipped if already exited
//!   ├─ stopped.cancelled().await                handler closed every queue and its sockets
//!   ├─ join handler thread                      already finished
//!   └─ release context
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{BuildError, CloseError, SubscribeError};
use crate::events::{HashEvent, RawEvent, SequenceEvent, Topic};
use crate::subscribers::{QueueId, Registry, Removed, TopicQueues, channel};
use crate::transport::{ControlCommand, ControlFront, Transport};

use super::alive::{LastSeen, Lifecycle, LifecycleCell};
use super::handler::Handler;
use super::subscription::{CancelHandle, Subscription};

/// State shared between the API side and the handler thread.
pub(crate) struct Shared {
    pub(crate) registry: RwLock<Registry>,
    /// Front end of the control pair; `None` once shutdown started.
    pub(crate) control: Mutex<Option<ControlFront>>,
    /// Cancelled by the handler when shutdown begins.
    pub(crate) exited: CancellationToken,
    /// Cancelled once the handler has released its sockets and returned.
    pub(crate) stopped: CancellationToken,
    pub(crate) lifecycle: LifecycleCell,
    pub(crate) last_seen: LastSeen,
    next_id: AtomicU64,
    capacity: usize,
}

impl Shared {
    pub(crate) fn new(front: ControlFront, capacity: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            control: Mutex::new(Some(front)),
            exited: CancellationToken::new(),
            stopped: CancellationToken::new(),
            lifecycle: LifecycleCell::new(),
            last_seen: LastSeen::default(),
            next_id: AtomicU64::new(0),
            capacity,
        }
    }

    /// Sends a control frame. Taking `&mut Registry` ties the send to the
    /// registry write lock.
    fn send_locked(&self, _registry: &mut Registry, cmd: ControlCommand) -> Result<(), zmq::Error> {
        match self.control.lock().as_ref() {
            Some(front) => front.send(cmd),
            None => Err(zmq::Error::ETERM),
        }
    }

    fn subscribe<T: Clone>(
        self: &Arc<Self>,
        topic: Topic,
        list: fn(&mut Registry) -> &mut TopicQueues<T>,
    ) -> Result<Subscription<T>, SubscribeError> {
        let mut registry = self.registry.write();
        if self.exited.is_cancelled() {
            return Err(SubscribeError::Exited);
        }

        if registry.is_empty(topic) {
            let cmd = ControlCommand::Subscribe(topic);
            self.send_locked(&mut registry, cmd)
                .map_err(|source| SubscribeError::Control {
                    verb: cmd.verb(),
                    topic,
                    source,
                })?;
        }

        let id: QueueId = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = channel(self.capacity);
        let cancel = CancelHandle::new(Arc::clone(self), topic, id);
        let on_drop = cancel.clone();
        rx.on_release(Box::new(move || on_drop.release()));

        list(&mut registry).insert(id, tx);
        debug!(%topic, id, live = registry.live(topic), "subscription added");

        Ok(Subscription::new(rx, cancel))
    }

    pub(crate) fn cancel(&self, topic: Topic, id: QueueId) -> Result<(), SubscribeError> {
        let mut registry = self.registry.write();
        if self.exited.is_cancelled() {
            return Err(SubscribeError::Exited);
        }

        match registry.remove(topic, id) {
            Removed::Absent => Ok(()),
            Removed::Closed { now_empty } => {
                debug!(%topic, id, live = registry.live(topic), "subscription cancelled");
                if !now_empty {
                    return Ok(());
                }
                let cmd = ControlCommand::Unsubscribe(topic);
                self.send_locked(&mut registry, cmd)
                    .map_err(|source| SubscribeError::Control {
                        verb: cmd.verb(),
                        topic,
                        source,
                    })
            }
        }
    }

    /// Asks the handler to leave its loop, unless it already has.
    fn request_term(&self) -> Result<(), CloseError> {
        let mut registry = self.registry.write();
        if self.exited.is_cancelled() {
            return Ok(());
        }
        self.send_locked(&mut registry, ControlCommand::Term)
            .map_err(CloseError::Control)?;
        self.lifecycle.advance(Lifecycle::ShuttingDown);
        Ok(())
    }
}

/// Transport-backed half of an enabled subscriber.
struct Backend {
    shared: Arc<Shared>,
    handler: Mutex<Option<JoinHandle<()>>>,
    /// Declared last: released after the sockets that depend on it.
    context: Mutex<Option<zmq::Context>>,
}

impl Backend {
    fn join_handler(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            error!("handler thread panicked");
        }
    }

    /// Releases the subscriber's context handle. The context terminates once
    /// the last socket created from it has closed.
    fn release_context(&self) {
        drop(self.context.lock().take());
    }
}

/// Bitcoin node event-stream subscriber.
///
/// Connects to the node's ZeroMQ publisher and fans events out to any number
/// of consumers through bounded drop-oldest queues.
///
/// ### Rules
/// - Every method may be called from any thread.
/// - A topic filter is installed on the publisher socket exactly while the
///   topic has at least one live subscription.
/// - After [`close`](Self::close) returns, every subscription queue is closed
///   and no further subscription can be made.
///
/// # Example
/// ```no_run
/// use vigilante_zmq::{Config, Subscriber};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let subscriber = Subscriber::new(Config::new("tcp://127.0.0.1:28332").with_capacity(16))?;
/// let mut blocks = subscriber.subscribe_hash_block()?;
///
/// while let Some(ev) = blocks.recv().await {
///     println!("block {} (seq {})", ev.hash, ev.sequence);
/// }
/// subscriber.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Subscriber {
    config: Config,
    backend: Option<Backend>,
    closed: AtomicBool,
}

impl Subscriber {
    /// Opens the transport and starts the handler thread.
    ///
    /// With an empty address no transport is opened: every `subscribe_*`
    /// returns [`SubscribeError::Disabled`] and `close` succeeds once.
    pub fn new(config: Config) -> Result<Self, BuildError> {
        if !config.is_enabled() {
            info!("no publisher address configured; subscriptions disabled");
            return Ok(Self {
                config,
                backend: None,
                closed: AtomicBool::new(false),
            });
        }

        let Transport {
            context,
            publisher,
            back,
            front,
        } = Transport::open(&config.address)?;

        let shared = Arc::new(Shared::new(
            ControlFront::new(front),
            config.queue_capacity(),
        ));
        let join = Handler::new(publisher, back, Arc::clone(&shared)).spawn()?;
        shared.lifecycle.advance(Lifecycle::Running);

        info!(
            address = %config.address,
            capacity = config.queue_capacity(),
            "subscriber started"
        );
        Ok(Self {
            config,
            backend: Some(Backend {
                shared,
                handler: Mutex::new(Some(join)),
                context: Mutex::new(Some(context)),
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// Subscribes to `hashtx` (transaction hashes).
    pub fn subscribe_hash_tx(&self) -> Result<Subscription<HashEvent>, SubscribeError> {
        self.shared()?.subscribe(Topic::HashTx, |r| &mut r.hash_tx)
    }

    /// Subscribes to `hashblock` (block hashes).
    pub fn subscribe_hash_block(&self) -> Result<Subscription<HashEvent>, SubscribeError> {
        self.shared()?.subscribe(Topic::HashBlock, |r| &mut r.hash_block)
    }

    /// Subscribes to `rawtx` (serialized transactions).
    pub fn subscribe_raw_tx(&self) -> Result<Subscription<RawEvent>, SubscribeError> {
        self.shared()?.subscribe(Topic::RawTx, |r| &mut r.raw_tx)
    }

    /// Subscribes to `rawblock` (serialized blocks).
    pub fn subscribe_raw_block(&self) -> Result<Subscription<RawEvent>, SubscribeError> {
        self.shared()?.subscribe(Topic::RawBlock, |r| &mut r.raw_block)
    }

    /// Subscribes to `sequence` (chain and mempool changes).
    pub fn subscribe_sequence(&self) -> Result<Subscription<SequenceEvent>, SubscribeError> {
        self.shared()?.subscribe(Topic::Sequence, |r| &mut r.sequence)
    }

    fn shared(&self) -> Result<&Arc<Shared>, SubscribeError> {
        self.backend
            .as_ref()
            .map(|b| &b.shared)
            .ok_or(SubscribeError::Disabled)
    }

    /// Shuts the subscriber down.
    ///
    /// Exactly one concurrent caller wins; the others get
    /// [`CloseError::AlreadyClosed`]. When this returns `Ok`, the handler has
    /// exited and every subscription queue is closed.
    ///
    /// Does not depend on any particular async runtime. If the `term` frame
    /// cannot be sent, nothing is shut down and `close` may be called again.
    pub async fn close(&self) -> Result<(), CloseError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CloseError::AlreadyClosed);
        }
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        if let Err(e) = backend.shared.request_term() {
            // Nothing was shut down; leave close (and Drop) available.
            self.closed.store(false, Ordering::Release);
            return Err(e);
        }
        backend.shared.stopped.cancelled().await;

        // The handler is past its last statement; the join does not wait.
        let handle = backend.handler.lock().take();
        if let Some(handle) = handle {
            Backend::join_handler(handle);
        }
        backend.release_context();

        info!("subscriber closed");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        match &self.backend {
            Some(b) => b.shared.lifecycle.get(),
            None if self.closed.load(Ordering::Acquire) => Lifecycle::Exited,
            None => Lifecycle::Running,
        }
    }

    /// True if a publisher frame arrived within `max_staleness`.
    ///
    /// Advisory only: a disabled subscriber, or one that has not received
    /// anything yet, is never ready.
    pub fn ready(&self, max_staleness: Duration) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|b| b.shared.last_seen.within(max_staleness))
    }

    /// Time the most recent publisher frame was received.
    pub fn last_event_at(&self) -> Option<Instant> {
        self.backend.as_ref().and_then(|b| b.shared.last_seen.get())
    }

    /// True when a publisher address was configured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Effective per-subscription queue capacity.
    pub fn capacity(&self) -> usize {
        self.config.queue_capacity()
    }

    /// Configuration the subscriber was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Subscriber {
    /// Synchronous shutdown for subscribers that were never closed.
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend.shared.request_term() {
            warn!(error = %e, "could not stop handler on drop; detaching it");
            return;
        }
        if let Some(handle) = backend.handler.lock().take() {
            Backend::join_handler(handle);
        }
        backend.release_context();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("address", &self.config.address)
            .field("capacity", &self.capacity())
            .field("state", &self.state())
            .finish()
    }
}
