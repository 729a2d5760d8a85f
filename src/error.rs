//! Error types used by the subscriber and its consumers.
//!
//! This module defines the error enums surfaced to callers:
//!
//! - [`BuildError`]: transport setup failed; the subscriber was not created.
//! - [`SubscribeError`]: returned by `subscribe_*` and by subscription cancellation.
//! - [`CloseError`]: returned by [`Subscriber::close`](crate::Subscriber::close).
//! - [`DecodeError`]: a publisher frame could not be decoded (the handler drops it).
//!
//! Fatal transport errors inside the handler are never returned to a caller.
//! They trigger the shutdown sequence and surface as queue closure and as
//! [`SubscribeError::Exited`] on later calls.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use thiserror::Error;

use crate::events::Topic;

/// # Errors produced while opening the transport.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// A socket could not be created or configured.
    #[error("failed to create {socket} socket: {source}")]
    Socket {
        /// Which socket failed (`publisher`, `control-back`, `control-front`).
        socket: &'static str,
        /// Underlying ZeroMQ error.
        #[source]
        source: zmq::Error,
    },

    /// The publisher socket could not connect to the configured address.
    #[error("failed to connect to publisher {address}: {source}")]
    Connect {
        /// Configured publisher address.
        address: String,
        /// Underlying ZeroMQ error.
        #[source]
        source: zmq::Error,
    },

    /// The in-process control pair could not be bound or connected.
    #[error("failed to set up control transport at {endpoint}: {source}")]
    Control {
        /// In-process endpoint of the control pair.
        endpoint: &'static str,
        /// Underlying ZeroMQ error.
        #[source]
        source: zmq::Error,
    },

    /// The handler thread could not be spawned.
    #[error("failed to spawn handler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::Socket { .. } => "build_socket",
            BuildError::Connect { .. } => "build_connect",
            BuildError::Control { .. } => "build_control",
            BuildError::Spawn(_) => "build_spawn",
        }
    }
}

/// # Errors produced by subscription management.
///
/// Returned by the `subscribe_*` family and by
/// [`CancelHandle::cancel`](crate::CancelHandle::cancel).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SubscribeError {
    /// The subscriber was built without a publisher address.
    #[error("subscribe disabled")]
    Disabled,

    /// Shutdown is in progress or complete; no subscription can be changed.
    #[error("subscription backend exited")]
    Exited,

    /// Sending a control frame to the handler failed.
    #[error("failed to send {verb} {topic} to handler: {source}")]
    Control {
        /// Control verb that failed (`subscribe` or `unsubscribe`).
        verb: &'static str,
        /// Topic the frame referred to.
        topic: Topic,
        /// Underlying ZeroMQ error.
        #[source]
        source: zmq::Error,
    },
}

impl SubscribeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use vigilante_zmq::SubscribeError;
    ///
    /// assert_eq!(SubscribeError::Exited.as_label(), "subscribe_exited");
    /// assert_eq!(SubscribeError::Exited.to_string(), "subscription backend exited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscribeError::Disabled => "subscribe_disabled",
            SubscribeError::Exited => "subscribe_exited",
            SubscribeError::Control { .. } => "subscribe_control",
        }
    }
}

/// # Errors produced by [`Subscriber::close`](crate::Subscriber::close).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CloseError {
    /// Another `close` call already won.
    #[error("already closed")]
    AlreadyClosed,

    /// The `term` frame could not be delivered to the handler.
    #[error("failed to send term to handler: {0}")]
    Control(#[source] zmq::Error),
}

impl CloseError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CloseError::AlreadyClosed => "close_already_closed",
            CloseError::Control(_) => "close_control",
        }
    }
}

/// # Reasons a publisher frame was dropped.
///
/// Unknown topics and unknown sequence tags are expected when the node
/// publishes more than this crate understands; they are not failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame had no parts at all.
    #[error("empty frame")]
    Empty,

    /// The topic label is not one of the five known topics.
    #[error("unknown topic {0:?}")]
    UnknownTopic(String),

    /// A required part is missing.
    #[error("{topic}: missing part {index}")]
    MissingPart {
        /// Topic of the frame.
        topic: Topic,
        /// Zero-based index of the missing part.
        index: usize,
    },

    /// A part is shorter than the field it must carry.
    #[error("{topic}: {field} needs {need} bytes, got {got}")]
    Truncated {
        /// Topic of the frame.
        topic: Topic,
        /// Field being decoded.
        field: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        got: usize,
    },

    /// The sequence event tag is not one of `C`, `D`, `R`, `A`.
    #[error("unknown sequence tag {0:#04x}")]
    UnknownSequenceTag(u8),
}

impl DecodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DecodeError::Empty => "decode_empty",
            DecodeError::UnknownTopic(_) => "decode_unknown_topic",
            DecodeError::MissingPart { .. } => "decode_missing_part",
            DecodeError::Truncated { .. } => "decode_truncated",
            DecodeError::UnknownSequenceTag(_) => "decode_unknown_sequence_tag",
        }
    }

    /// True for frames a newer publisher may legitimately send
    /// (unknown topic or tag), as opposed to malformed ones.
    pub fn is_unrecognized(&self) -> bool {
        matches!(
            self,
            DecodeError::UnknownTopic(_) | DecodeError::UnknownSequenceTag(_)
        )
    }
}
