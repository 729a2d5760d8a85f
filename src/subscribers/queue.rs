//! # Bounded drop-oldest consumer queue.
//!
//! Each subscription owns one queue: the handler thread is the only producer,
//! the subscription owner is the only consumer.
//!
//! ## Rules
//! - **Bounded**: at most `capacity` events are buffered.
//! - **Drop-oldest**: pushing into a full queue evicts the head and appends the new event.
//! - **Non-blocking producer**: [`QueueSender::push`] never waits on the consumer.
//! - **Close once**: [`QueueSender::close`] reports `true` only to the call that closed it.
//! - **Drain after close**: buffered events stay readable; `recv` yields `None` once empty.
//! - **Release on drop**: dropping the receiver runs its release hook, which
//!   unregisters the queue from its subscriber.
//!
//! ```text
//! push(e5) on full [e1 e2 e3]  ──►  [e2 e3 e5]   (Push::DisplacedOldest)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Outcome of a [`QueueSender::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Push {
    /// Enqueued without loss.
    Delivered,
    /// Queue was full; the oldest event was dropped to make room.
    DisplacedOldest,
    /// Queue is closed; the event was discarded.
    Closed,
}

/// Error returned by [`EventReceiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    /// Nothing buffered right now.
    #[error("queue empty")]
    Empty,
    /// Closed and fully drained.
    #[error("queue closed")]
    Closed,
}

/// Runs once when an [`EventReceiver`] is dropped.
pub(crate) type Release = Box<dyn FnOnce() + Send + Sync>;

struct State<T> {
    buf: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

/// Creates a queue holding at most `capacity` events (minimum 1).
pub(crate) fn channel<T>(capacity: usize) -> (QueueSender<T>, EventReceiver<T>) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            buf: VecDeque::with_capacity(capacity),
            closed: false,
        }),
        notify: Notify::new(),
        capacity,
    });
    (
        QueueSender {
            shared: Arc::clone(&shared),
        },
        EventReceiver {
            shared,
            release: None,
        },
    )
}

/// Producer half, kept in the subscription registry.
pub(crate) struct QueueSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueSender<T> {
    /// Appends `item`, evicting the oldest event if the queue is full.
    pub(crate) fn push(&self, item: T) -> Push {
        let outcome = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Push::Closed;
            }
            let outcome = if state.buf.len() >= self.shared.capacity {
                state.buf.pop_front();
                Push::DisplacedOldest
            } else {
                Push::Delivered
            };
            state.buf.push_back(item);
            outcome
        };
        // Single consumer: a stored permit is enough to wake it.
        self.shared.notify.notify_one();
        outcome
    }

    /// Closes the queue. Returns `true` only for the call that closed it.
    pub(crate) fn close(&self) -> bool {
        let first = {
            let mut state = self.shared.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            self.shared.notify.notify_one();
        }
        first
    }
}

/// Consumer half of a subscription queue.
///
/// Yields events of a single topic in publication order, minus any events
/// evicted by the drop-oldest policy. Use the embedded sequence counters to
/// detect gaps.
pub struct EventReceiver<T> {
    shared: Arc<Shared<T>>,
    release: Option<Release>,
}

impl<T> EventReceiver<T> {
    /// Installs the hook run when this receiver is dropped.
    pub(crate) fn on_release(&mut self, release: Release) {
        self.release = Some(release);
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the queue is closed and every buffered event has
    /// been taken.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => self.shared.notify.notified().await,
            }
        }
    }

    /// Takes the next event without waiting.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let mut state = self.shared.state.lock();
        match state.buf.pop_front() {
            Some(item) => Ok(item),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for consumers running on plain threads.
    ///
    /// # Panics
    /// Must not be called from within an async runtime thread.
    pub fn blocking_recv(&mut self) -> Option<T> {
        futures::executor::block_on(self.recv())
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.shared.state.lock().buf.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered events.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// True once the queue has been closed (buffered events may remain).
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Converts the receiver into a [`Stream`] that ends when the queue closes.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send
    where
        T: Send,
    {
        futures::stream::unfold(self, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
    }
}

impl<T> Drop for EventReceiver<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<T> std::fmt::Debug for EventReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("len", &self.len())
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
