//! # Subscriber configuration.
//!
//! Provides [`Config`], the construction options for a [`Subscriber`](crate::Subscriber).
//!
//! ## Sentinel values
//! - `address = ""` → subscriptions disabled (every `subscribe_*` returns
//!   [`SubscribeError::Disabled`](crate::SubscribeError::Disabled)); no transport is opened
//! - `capacity = 0` → [`DEFAULT_QUEUE_CAPACITY`]

/// Queue capacity used when [`Config::capacity`] is `0`.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Construction options for the subscriber.
///
/// ## Field semantics
/// - `address`: publisher endpoint, e.g. `tcp://127.0.0.1:28332` (empty = disabled)
/// - `capacity`: per-consumer bounded FIFO size (`0` = default of 2)
///
/// ## Notes
/// Fields are public; prefer the accessors to avoid sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// ZeroMQ endpoint of the node's publish socket.
    pub address: String,

    /// Capacity of each consumer queue.
    ///
    /// When a queue is full the oldest event is dropped to make room for the
    /// newest one. Consumers detect gaps through the embedded sequence counters.
    pub capacity: usize,
}

impl Config {
    /// Creates a configuration for the given publisher address with the default capacity.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            capacity: 0,
        }
    }

    /// Sets the per-consumer queue capacity (`0` = default).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// True when a publisher address is configured.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.address.is_empty()
    }

    /// Returns the effective queue capacity.
    ///
    /// ```
    /// use vigilante_zmq::Config;
    ///
    /// assert_eq!(Config::new("tcp://127.0.0.1:28332").queue_capacity(), 2);
    /// assert_eq!(Config::default().with_capacity(16).queue_capacity(), 16);
    /// ```
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        if self.capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            self.capacity
        }
    }
}
