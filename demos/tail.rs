//! Tails every topic of a node's ZeroMQ publisher until Ctrl-C.
//!
//! ```text
//! cargo run --example tail -- tcp://127.0.0.1:28332 16
//! RUST_LOG=vigilante_zmq=debug cargo run --example tail
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigilante_zmq::events::{HashEvent, RawEvent, SequenceEvent};
use vigilante_zmq::{Config, Consume, Subscriber, spawn_consumer};

/// Logs hash announcements and reports counter gaps.
struct HashTail {
    name: &'static str,
    last: AtomicU32,
}

impl HashTail {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            last: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Consume<HashEvent> for HashTail {
    async fn on_event(&self, ev: HashEvent) {
        let prev = self.last.swap(ev.sequence, Ordering::Relaxed);
        if prev != 0 && ev.sequence != prev.wrapping_add(1) {
            warn!(topic = self.name, prev, next = ev.sequence, "gap in publisher counter");
        }
        info!(topic = self.name, hash = %ev.hash, seq = ev.sequence);
    }

    async fn on_closed(&self) {
        info!(topic = self.name, "stream closed");
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

struct RawTail(&'static str);

#[async_trait]
impl Consume<RawEvent> for RawTail {
    async fn on_event(&self, ev: RawEvent) {
        info!(topic = self.0, bytes = ev.payload.len(), seq = ev.sequence);
    }

    fn name(&self) -> &'static str {
        self.0
    }
}

struct SequenceTail;

#[async_trait]
impl Consume<SequenceEvent> for SequenceTail {
    async fn on_event(&self, ev: SequenceEvent) {
        info!(
            topic = "sequence",
            kind = ?ev.kind,
            hash = %ev.hash,
            mempool = ?ev.mempool_sequence
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "tcp://127.0.0.1:28332".to_string());
    let capacity = args.next().map(|c| c.parse()).transpose()?.unwrap_or(0);

    let subscriber = Subscriber::new(Config::new(address).with_capacity(capacity))?;

    let workers = vec![
        spawn_consumer(subscriber.subscribe_hash_block()?, HashTail::new("hashblock")),
        spawn_consumer(subscriber.subscribe_hash_tx()?, HashTail::new("hashtx")),
        spawn_consumer(subscriber.subscribe_raw_block()?, Arc::new(RawTail("rawblock"))),
        spawn_consumer(subscriber.subscribe_raw_tx()?, Arc::new(RawTail("rawtx"))),
        spawn_consumer(subscriber.subscribe_sequence()?, Arc::new(SequenceTail)),
    ];

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");

    subscriber.close().await?;
    for worker in workers {
        worker.join().await;
    }
    Ok(())
}
