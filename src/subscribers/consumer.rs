//! # Consumer workers driven by a subscription.
//!
//! [`spawn_consumer`] moves a [`Subscription`] into a dedicated tokio task
//! and feeds every event to a [`Consume`] implementation.
//!
//! ```text
//! Subscription<T> ──► worker task ──► consumer.on_event(ev)
//!                          │                └─ panic → logged, next event
//!                          ├─ queue closed ──► consumer.on_closed()
//!                          └─ stop()       ──► cancel subscription, exit
//! ```
//!
//! ## Rules
//! - Events reach the consumer in queue order, one at a time.
//! - A slow consumer only loses its own events (drop-oldest upstream).
//! - `on_closed` runs when the subscriber shuts down, not on `stop`.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state
//! inconsistent if the consumer panics while holding a lock.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::{CancelHandle, Subscription};
use crate::error::SubscribeError;

/// Event handler driven by [`spawn_consumer`].
///
/// ## Example
/// ```no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use vigilante_zmq::{Config, Consume, Subscriber, spawn_consumer};
/// use vigilante_zmq::events::HashEvent;
///
/// struct BlockLog;
///
/// #[async_trait]
/// impl Consume<HashEvent> for BlockLog {
///     async fn on_event(&self, ev: HashEvent) {
///         println!("new block {}", ev.hash);
///     }
///     fn name(&self) -> &'static str { "block-log" }
/// }
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let subscriber = Subscriber::new(Config::new("tcp://127.0.0.1:28332"))?;
/// let worker = spawn_consumer(subscriber.subscribe_hash_block()?, Arc::new(BlockLog));
/// // ...
/// worker.stop().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Consume<T: Send + 'static>: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: T);

    /// Called once when the queue is closed and drained.
    async fn on_closed(&self) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handle to a running consumer worker.
#[must_use = "dropping the handle detaches the worker"]
pub struct ConsumerHandle {
    name: &'static str,
    subscription: CancelHandle,
    stop: CancellationToken,
    worker: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Name of the consumer this worker drives.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once the worker task has returned.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Cancels the subscription and waits for the worker to return.
    ///
    /// An already shut down subscriber is not an error here: the worker
    /// ends on its own once the queue is closed.
    pub async fn stop(self) -> Result<(), SubscribeError> {
        self.stop.cancel();
        let cancelled = match self.subscription.cancel() {
            Ok(()) | Err(SubscribeError::Exited) => Ok(()),
            Err(e) => Err(e),
        };
        self.join().await;
        cancelled
    }

    /// Waits for the worker to return without cancelling anything.
    pub async fn join(self) {
        if let Err(e) = self.worker.await {
            error!(consumer = self.name, error = %e, "consumer worker failed");
        }
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("name", &self.name)
            .field("topic", &self.subscription.topic())
            .field("finished", &self.worker.is_finished())
            .finish()
    }
}

/// Spawns a tokio task that drains `subscription` into `consumer`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_consumer<T, C>(subscription: Subscription<T>, consumer: Arc<C>) -> ConsumerHandle
where
    T: Send + 'static,
    C: Consume<T> + ?Sized,
{
    let name = consumer.name();
    let topic = subscription.topic();
    let (mut rx, cancel) = subscription.into_parts();
    let stop = CancellationToken::new();
    let stop_worker = stop.clone();

    let worker = tokio::spawn(async move {
        debug!(consumer = name, %topic, "consumer started");
        loop {
            let ev = tokio::select! {
                biased;
                _ = stop_worker.cancelled() => {
                    debug!(consumer = name, %topic, "consumer stopped");
                    return;
                }
                ev = rx.recv() => ev,
            };
            let Some(ev) = ev else { break };

            let fut = consumer.on_event(ev);
            if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                warn!(
                    consumer = name,
                    %topic,
                    panic = %panic_message(&*panic_err),
                    "consumer panicked; continuing with next event"
                );
            }
        }
        consumer.on_closed().await;
        debug!(consumer = name, %topic, "queue closed, consumer finished");
    });

    ConsumerHandle {
        name,
        subscription: cancel,
        stop,
        worker,
    }
}

fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
