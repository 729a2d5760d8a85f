//! Shared fixture: a fake node publisher driven deterministically by tests.

#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Context, anyhow};
use vigilante_zmq::events::{Hash, HashEvent, RawEvent, SequenceEvent, Topic};
use vigilante_zmq::{Subscription, TryRecvError};

/// Hash carried by warm-up frames.
pub const MARKER_HASH: [u8; 32] = [0xEE; 32];
/// Payload carried by warm-up frames on raw topics.
pub const MARKER_PAYLOAD: &[u8] = b"marker";

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// PUB socket bound to an ephemeral local port.
pub struct FakePublisher {
    socket: zmq::Socket,
    endpoint: String,
}

impl FakePublisher {
    pub fn bind() -> anyhow::Result<Self> {
        let ctx = zmq::Context::new();
        let socket = ctx.socket(zmq::PUB).context("create PUB socket")?;
        socket.set_linger(0)?;
        socket.bind("tcp://127.0.0.1:*").context("bind PUB socket")?;
        let endpoint = socket
            .get_last_endpoint()?
            .map_err(|_| anyhow!("endpoint is not utf-8"))?;
        Ok(Self { socket, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn send(&self, parts: &[&[u8]]) -> anyhow::Result<()> {
        self.socket
            .send_multipart(parts.iter().copied(), 0)
            .context("publish frame")
    }

    pub fn hash(&self, topic: Topic, hash: [u8; 32], seq: u32) -> anyhow::Result<()> {
        self.send(&[topic.as_bytes(), &hash, &seq.to_le_bytes()])
    }

    pub fn raw(&self, topic: Topic, payload: &[u8], seq: u32) -> anyhow::Result<()> {
        self.send(&[topic.as_bytes(), payload, &seq.to_le_bytes()])
    }

    pub fn sequence(&self, hash: [u8; 32], tag: u8, mempool: Option<u64>, seq: u32) -> anyhow::Result<()> {
        let mut body = hash.to_vec();
        body.push(tag);
        if let Some(m) = mempool {
            body.extend_from_slice(&m.to_le_bytes());
        }
        self.send(&[Topic::Sequence.as_bytes(), &body, &seq.to_le_bytes()])
    }

    fn marker(&self, topic: Topic) -> anyhow::Result<()> {
        match topic {
            Topic::HashTx | Topic::HashBlock => self.hash(topic, MARKER_HASH, 0),
            Topic::RawTx | Topic::RawBlock => self.raw(topic, MARKER_PAYLOAD, 0),
            Topic::Sequence => self.sequence(MARKER_HASH, b'C', None, 0),
        }
    }

    /// Publishes marker frames until `sub` receives one, so the topic filter is
    /// known to have reached the publisher. Leftover markers are drained.
    pub async fn warm_up<T>(&self, sub: &mut Subscription<T>) -> anyhow::Result<()> {
        let topic = sub.topic();
        for _ in 0..250 {
            self.marker(topic)?;
            if tokio::time::timeout(Duration::from_millis(20), sub.recv())
                .await
                .is_ok()
            {
                settle().await;
                drain(sub);
                return Ok(());
            }
        }
        Err(anyhow!("{topic} filter never reached the publisher"))
    }
}

/// Lets in-flight frames reach the queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Discards everything currently buffered.
pub fn drain<T>(sub: &mut Subscription<T>) {
    while sub.try_recv().is_ok() {}
}

pub fn hash_of(b: u8) -> [u8; 32] {
    [b; 32]
}

pub fn is_marker_hash(ev: &HashEvent) -> bool {
    ev.hash == Hash(MARKER_HASH)
}

pub fn is_marker_raw(ev: &RawEvent) -> bool {
    &*ev.payload == MARKER_PAYLOAD
}

pub fn is_marker_sequence(ev: &SequenceEvent) -> bool {
    ev.hash == Hash(MARKER_HASH)
}

/// Next event not matching `skip`, or an error after [`WAIT`].
pub async fn next_real<T>(
    sub: &mut Subscription<T>,
    skip: impl Fn(&T) -> bool,
) -> anyhow::Result<Option<T>> {
    loop {
        let ev = tokio::time::timeout(WAIT, sub.recv())
            .await
            .context("timed out waiting for event")?;
        match ev {
            Some(ev) if skip(&ev) => continue,
            other => return Ok(other),
        }
    }
}

/// True if the queue is closed and fully drained.
pub fn is_finished<T>(sub: &mut Subscription<T>) -> bool {
    loop {
        match sub.try_recv() {
            Ok(_) => continue,
            Err(TryRecvError::Closed) => return true,
            Err(TryRecvError::Empty) => return false,
        }
    }
}
