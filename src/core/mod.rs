//! Subscriber core: public API, handler thread and lifecycle.
//!
//! The public types from this module are [`Subscriber`], [`Subscription`],
//! [`CancelHandle`] and [`Lifecycle`].
//!
//! Internal modules:
//! - [`subscriber`]: public entry point, subscribe/cancel bookkeeping, close;
//! - [`subscription`]: per-consumer queue handle and its cancel handle;
//! - [`handler`]: poll loop on the dedicated handler thread;
//! - [`shutdown`]: closes every queue once the handler stops;
//! - [`alive`]: lifecycle state and last-event tracking.

mod alive;
mod handler;
mod shutdown;
mod subscriber;
mod subscription;

pub use alive::Lifecycle;
pub use subscriber::Subscriber;
pub use subscription::{CancelHandle, Subscription};

pub(crate) use subscriber::Shared;
