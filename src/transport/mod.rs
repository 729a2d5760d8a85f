//! ZeroMQ transport: publisher subscription socket and in-process control pair.
//!
//! ```text
//!   node PUB ──tcp──► [SUB publisher] ─┐
//!                                      ├─► zmq::poll ─► handler thread
//!   API calls ─► [PAIR front] ─inproc─► [PAIR back]
//! ```
//!
//! The control pair exists so the handler can block on a single poll over two
//! sockets instead of needing a second wait primitive. One context is created
//! per subscriber; the in-process endpoint is therefore private to it.

mod control;

pub(crate) use control::{ControlCommand, ControlFront};

use tracing::debug;

use crate::error::BuildError;

/// In-process endpoint of the control pair.
pub(crate) const CONTROL_ENDPOINT: &str = "inproc://vigilante-zmq/control";

/// Sockets owned by one subscriber.
///
/// Dropping a partially built value releases whatever was created so far.
pub(crate) struct Transport {
    pub(crate) context: zmq::Context,
    /// SUB socket connected to the node; handler-only.
    pub(crate) publisher: zmq::Socket,
    /// PAIR end polled by the handler.
    pub(crate) back: zmq::Socket,
    /// PAIR end used by subscription management.
    pub(crate) front: zmq::Socket,
}

impl Transport {
    /// Creates the context and sockets and connects to `address`.
    pub(crate) fn open(address: &str) -> Result<Self, BuildError> {
        let context = zmq::Context::new();

        let publisher = socket(&context, zmq::SUB, "publisher")?;
        publisher
            .connect(address)
            .map_err(|source| BuildError::Connect {
                address: address.to_string(),
                source,
            })?;

        let back = socket(&context, zmq::PAIR, "control-back")?;
        back.bind(CONTROL_ENDPOINT)
            .map_err(|source| BuildError::Control {
                endpoint: CONTROL_ENDPOINT,
                source,
            })?;

        let front = socket(&context, zmq::PAIR, "control-front")?;
        front
            .connect(CONTROL_ENDPOINT)
            .map_err(|source| BuildError::Control {
                endpoint: CONTROL_ENDPOINT,
                source,
            })?;

        debug!(address, "transport opened");
        Ok(Self {
            context,
            publisher,
            back,
            front,
        })
    }
}

/// Creates a socket with linger disabled so context termination never waits
/// on undelivered frames.
fn socket(
    context: &zmq::Context,
    kind: zmq::SocketType,
    name: &'static str,
) -> Result<zmq::Socket, BuildError> {
    let sock = context
        .socket(kind)
        .map_err(|source| BuildError::Socket { socket: name, source })?;
    sock.set_linger(0)
        .map_err(|source| BuildError::Socket { socket: name, source })?;
    Ok(sock)
}
