//! # Consumer side: queues, registry and worker helper.
//!
//! ```text
//! handler thread
//!     │ dispatch(notification)              (registry read lock)
//!     ▼
//! Registry ── topic list ──┬──► [queue 1] ──► Subscription / EventReceiver
//!                          ├──► [queue 2] ──► spawn_consumer ──► Consume::on_event
//!                          └──► [queue N] ──► ...
//! ```
//!
//! ## Rules
//! - **Bounded**: each queue holds at most `capacity` events.
//! - **Drop-oldest**: a full queue discards its oldest event to admit the newest.
//! - **Non-blocking**: dispatch never waits on a consumer.
//! - **Per-queue FIFO**: each consumer sees surviving events in publication order.
//! - **Closed once**: a queue is closed by cancel or by shutdown, never both.

mod consumer;
mod queue;
mod registry;

pub use consumer::{Consume, ConsumerHandle, spawn_consumer};
pub use queue::{EventReceiver, TryRecvError};

pub(crate) use queue::channel;
pub(crate) use registry::{QueueId, Registry, Removed, TopicQueues};
