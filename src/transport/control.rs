//! # Control protocol between the public API and the handler.
//!
//! Two-part frames on the in-process PAIR sockets:
//! ```text
//! [b"subscribe",   b"<topic>"]   install topic filter on the publisher socket
//! [b"unsubscribe", b"<topic>"]   remove topic filter
//! [b"term",        b""]          leave the handler loop
//! ```

use crate::events::Topic;

const SUBSCRIBE: &[u8] = b"subscribe";
const UNSUBSCRIBE: &[u8] = b"unsubscribe";
const TERM: &[u8] = b"term";

/// Request sent from the API side to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    Subscribe(Topic),
    Unsubscribe(Topic),
    Term,
}

impl ControlCommand {
    pub(crate) fn verb(&self) -> &'static str {
        match self {
            ControlCommand::Subscribe(_) => "subscribe",
            ControlCommand::Unsubscribe(_) => "unsubscribe",
            ControlCommand::Term => "term",
        }
    }

    /// Wire parts of the command.
    pub(crate) fn encode(&self) -> [&'static [u8]; 2] {
        match self {
            ControlCommand::Subscribe(t) => [SUBSCRIBE, t.as_bytes()],
            ControlCommand::Unsubscribe(t) => [UNSUBSCRIBE, t.as_bytes()],
            ControlCommand::Term => [TERM, b""],
        }
    }

    /// Parses a received control frame. Unknown verbs and topics yield `None`.
    pub(crate) fn decode(frames: &[Vec<u8>]) -> Option<ControlCommand> {
        let verb = frames.first()?.as_slice();
        if verb == TERM {
            return Some(ControlCommand::Term);
        }
        let topic = Topic::from_label(frames.get(1)?)?;
        match verb {
            SUBSCRIBE => Some(ControlCommand::Subscribe(topic)),
            UNSUBSCRIBE => Some(ControlCommand::Unsubscribe(topic)),
            _ => None,
        }
    }
}

/// API-side end of the control pair.
///
/// Only used while the registry write lock is held, which serializes
/// registry changes with the frames that accompany them.
pub(crate) struct ControlFront {
    socket: zmq::Socket,
}

impl ControlFront {
    pub(crate) fn new(socket: zmq::Socket) -> Self {
        Self { socket }
    }

    pub(crate) fn send(&self, cmd: ControlCommand) -> Result<(), zmq::Error> {
        self.socket.send_multipart(cmd.encode(), 0)
    }
}
