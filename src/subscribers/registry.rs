//! # Subscription registry: per-topic consumer queues.
//!
//! The registry maps each [`Topic`] to the ordered list of live consumer
//! queues for that topic, and fans decoded notifications out to them.
//!
//! ## Architecture
//! ```text
//! dispatch(Notification::HashBlock(ev))      (read lock, handler thread)
//!     │
//!     ├──► [queue 1] push (drop-oldest) ──► consumer 1
//!     ├──► [queue 2] push (drop-oldest) ──► consumer 2
//!     └──► [queue N] push (drop-oldest) ──► consumer N
//! ```
//!
//! ## Rules
//! - **One list per queue**: a queue id is inserted into exactly one topic list.
//! - **Removal by identity**: `remove` finds a queue by id and keeps the order of the rest.
//! - **Non-blocking**: dispatch never waits on a consumer.
//! - **Close once**: a queue leaves the registry either through `remove` or
//!   `close_all`, and is closed by whichever happens first.
//!
//! The registry itself holds no lock; the subscriber wraps it in an `RwLock`
//! (write mode for structural changes, read mode for dispatch).

use crate::events::{HashEvent, Notification, RawEvent, SequenceEvent, Topic};

use super::queue::{Push, QueueSender};

/// Identity of a consumer queue, unique per subscriber.
pub(crate) type QueueId = u64;

/// Counters for one dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DispatchStats {
    /// Queues that accepted the event without loss.
    pub(crate) delivered: usize,
    /// Queues that dropped their oldest event to accept this one.
    pub(crate) displaced: usize,
}

/// Result of removing a queue from its topic list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removed {
    /// The queue was not (or no longer) registered.
    Absent,
    /// The queue was removed and closed.
    Closed {
        /// The topic list became empty with this removal.
        now_empty: bool,
    },
}

/// Ordered consumer queues of one topic.
pub(crate) struct TopicQueues<T> {
    entries: Vec<(QueueId, QueueSender<T>)>,
}

impl<T> Default for TopicQueues<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> TopicQueues<T> {
    pub(crate) fn insert(&mut self, id: QueueId, sender: QueueSender<T>) {
        self.entries.push((id, sender));
    }

    fn remove(&mut self, id: QueueId) -> Removed {
        let Some(pos) = self.entries.iter().position(|(qid, _)| *qid == id) else {
            return Removed::Absent;
        };
        let (_, sender) = self.entries.remove(pos);
        sender.close();
        Removed::Closed {
            now_empty: self.entries.is_empty(),
        }
    }

    fn dispatch(&self, event: &T) -> DispatchStats {
        let mut stats = DispatchStats::default();
        for (_, sender) in &self.entries {
            match sender.push(event.clone()) {
                Push::Delivered => stats.delivered += 1,
                Push::DisplacedOldest => stats.displaced += 1,
                Push::Closed => {}
            }
        }
        stats
    }

    /// Closes and forgets every queue; returns how many were closed.
    fn close_all(&mut self) -> usize {
        self.entries
            .drain(..)
            .filter(|(_, sender)| sender.close())
            .count()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Per-topic table of consumer queues.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) hash_tx: TopicQueues<HashEvent>,
    pub(crate) hash_block: TopicQueues<HashEvent>,
    pub(crate) raw_tx: TopicQueues<RawEvent>,
    pub(crate) raw_block: TopicQueues<RawEvent>,
    pub(crate) sequence: TopicQueues<SequenceEvent>,
}

impl Registry {
    /// Number of live queues for `topic`.
    pub(crate) fn live(&self, topic: Topic) -> usize {
        match topic {
            Topic::HashTx => self.hash_tx.len(),
            Topic::HashBlock => self.hash_block.len(),
            Topic::RawTx => self.raw_tx.len(),
            Topic::RawBlock => self.raw_block.len(),
            Topic::Sequence => self.sequence.len(),
        }
    }

    /// True if no consumer is registered for `topic`.
    pub(crate) fn is_empty(&self, topic: Topic) -> bool {
        self.live(topic) == 0
    }

    /// Removes the queue `id` from `topic` and closes it.
    pub(crate) fn remove(&mut self, topic: Topic, id: QueueId) -> Removed {
        match topic {
            Topic::HashTx => self.hash_tx.remove(id),
            Topic::HashBlock => self.hash_block.remove(id),
            Topic::RawTx => self.raw_tx.remove(id),
            Topic::RawBlock => self.raw_block.remove(id),
            Topic::Sequence => self.sequence.remove(id),
        }
    }

    /// Fans a notification out to every queue of its topic.
    pub(crate) fn dispatch(&self, notification: &Notification) -> DispatchStats {
        match notification {
            Notification::HashTx(ev) => self.hash_tx.dispatch(ev),
            Notification::HashBlock(ev) => self.hash_block.dispatch(ev),
            Notification::RawTx(ev) => self.raw_tx.dispatch(ev),
            Notification::RawBlock(ev) => self.raw_block.dispatch(ev),
            Notification::Sequence(ev) => self.sequence.dispatch(ev),
        }
    }

    /// Closes every queue. Returns the topics that had consumers, with the
    /// number of queues closed for each.
    pub(crate) fn close_all(&mut self) -> Vec<(Topic, usize)> {
        let mut closed = Vec::new();
        for topic in Topic::ALL {
            if self.is_empty(topic) {
                continue;
            }
            let n = match topic {
                Topic::HashTx => self.hash_tx.close_all(),
                Topic::HashBlock => self.hash_block.close_all(),
                Topic::RawTx => self.raw_tx.close_all(),
                Topic::RawBlock => self.raw_block.close_all(),
                Topic::Sequence => self.sequence.close_all(),
            };
            closed.push((topic, n));
        }
        closed
    }
}
