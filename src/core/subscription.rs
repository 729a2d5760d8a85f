//! # Subscription handles returned by the `subscribe_*` family.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::SubscribeError;
use crate::events::Topic;
use crate::subscribers::{EventReceiver, QueueId, TryRecvError};

use super::Shared;

/// One consumer's view of a topic: a bounded event queue plus its cancel handle.
///
/// Dropping the queue (the `Subscription` itself, or the [`EventReceiver`]
/// taken from [`into_parts`](Self::into_parts)) cancels it. Dropping a
/// [`CancelHandle`] does not.
pub struct Subscription<T> {
    receiver: EventReceiver<T>,
    cancel: CancelHandle,
}

impl<T> Subscription<T> {
    pub(crate) fn new(receiver: EventReceiver<T>, cancel: CancelHandle) -> Self {
        Self { receiver, cancel }
    }

    /// Topic this subscription receives.
    pub fn topic(&self) -> Topic {
        self.cancel.topic
    }

    /// Waits for the next event; `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Takes the next event without waiting.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Blocking receive for consumers on plain threads.
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.receiver.blocking_recv()
    }

    /// Mutable access to the underlying queue.
    pub fn receiver(&mut self) -> &mut EventReceiver<T> {
        &mut self.receiver
    }

    /// Removes this queue from the subscriber and closes it.
    ///
    /// See [`CancelHandle::cancel`].
    pub fn cancel(&self) -> Result<(), SubscribeError> {
        self.cancel.cancel()
    }

    /// A cloneable handle that cancels this subscription from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Splits into the queue and its cancel handle.
    pub fn into_parts(self) -> (EventReceiver<T>, CancelHandle) {
        (self.receiver, self.cancel)
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.cancel.topic)
            .field("id", &self.cancel.id)
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// Cancels one subscription.
///
/// Clones refer to the same queue, so cancelling through any of them is
/// equivalent.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
    topic: Topic,
    id: QueueId,
}

impl CancelHandle {
    pub(crate) fn new(shared: Arc<Shared>, topic: Topic, id: QueueId) -> Self {
        Self { shared, topic, id }
    }

    /// Removes the queue from its topic, sends `unsubscribe <topic>` if it was
    /// the last one, and closes the queue.
    ///
    /// ### Rules
    /// - Idempotent: once removed, further calls return `Ok(())`.
    /// - After shutdown started, returns [`SubscribeError::Exited`]; the
    ///   handler has already closed the queue.
    /// - If the `unsubscribe` frame cannot be sent the queue is still closed
    ///   and the send error is returned.
    pub fn cancel(&self) -> Result<(), SubscribeError> {
        self.shared.cancel(self.topic, self.id)
    }

    /// Topic of the subscription.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Cancel path run when the queue's receiver is dropped. Shutdown
    /// already closed the queue, so `Exited` is not reported.
    pub(crate) fn release(&self) {
        match self.cancel() {
            Ok(()) | Err(SubscribeError::Exited) => {}
            Err(e) => debug!(
                topic = %self.topic,
                id = self.id,
                error = %e,
                "releasing dropped subscription failed"
            ),
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}
