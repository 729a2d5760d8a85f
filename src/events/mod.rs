//! Publisher events: topics, typed payloads and the frame decoder.
//!
//! ## Contents
//! - [`Topic`] wire labels and subscription filters
//! - [`HashEvent`], [`RawEvent`], [`SequenceEvent`] typed payloads
//! - [`Notification`] a decoded frame tagged with its topic
//! - [`decode`] multipart frame → [`Notification`]
//!
//! ## Quick reference
//! - **Producer**: the handler thread decodes every frame received on the
//!   publisher socket and dispatches it through the registry.
//! - **Consumers**: [`Subscription`](crate::Subscription) owners, one typed
//!   queue per subscription.

mod decode;
mod event;
mod topic;

pub use decode::decode;
pub use event::{Hash, HashEvent, Notification, RawEvent, SequenceEvent, SequenceKind};
pub use topic::Topic;
