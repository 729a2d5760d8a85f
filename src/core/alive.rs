//! # Liveness: lifecycle state and "last event seen" tracking.
//!
//! ## Lifecycle
//! ```text
//! Initializing ──new() ok──► Running ──close() / fatal transport error──► ShuttingDown
//!                                                                            │
//!                      queues closed, sockets released ◄────────────────────┘
//!                                   │
//!                                   ▼
//!                                 Exited
//! ```
//!
//! ## Readiness
//! The handler stamps [`LastSeen`] on every frame received from the
//! publisher, before decoding. `ready(max_staleness)` is advisory: a quiet
//! node (no mempool traffic, no new block) looks stale too.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Lifecycle state of a [`Subscriber`](crate::Subscriber).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Transport is being set up.
    Initializing,
    /// Handler is polling; subscriptions are accepted.
    Running,
    /// `close` was called or the handler hit a fatal error; queues are being closed.
    ShuttingDown,
    /// Handler finished; all queues closed and transport released.
    Exited,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Lifecycle {
        match v {
            0 => Lifecycle::Initializing,
            1 => Lifecycle::Running,
            2 => Lifecycle::ShuttingDown,
            _ => Lifecycle::Exited,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Lifecycle::Initializing => 0,
            Lifecycle::Running => 1,
            Lifecycle::ShuttingDown => 2,
            Lifecycle::Exited => 3,
        }
    }
}

/// Atomic lifecycle cell; transitions only move forward.
#[derive(Debug)]
pub(crate) struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Lifecycle::Initializing.as_u8()))
    }

    pub(crate) fn get(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advances to `next`; a request to move backwards is ignored.
    pub(crate) fn advance(&self, next: Lifecycle) {
        self.0.fetch_max(next.as_u8(), Ordering::AcqRel);
    }
}

/// Timestamp of the most recent publisher frame.
#[derive(Debug, Default)]
pub(crate) struct LastSeen {
    at: Mutex<Option<Instant>>,
}

impl LastSeen {
    pub(crate) fn mark(&self) {
        *self.at.lock() = Some(Instant::now());
    }

    pub(crate) fn get(&self) -> Option<Instant> {
        *self.at.lock()
    }

    /// True if a frame arrived within `max_staleness`.
    pub(crate) fn within(&self, max_staleness: Duration) -> bool {
        self.get().is_some_and(|at| at.elapsed() <= max_staleness)
    }
}
