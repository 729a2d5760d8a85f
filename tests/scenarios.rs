//! End-to-end behaviour against a fake node publisher.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use common::{FakePublisher, WAIT, hash_of, is_marker_hash, is_marker_raw, is_marker_sequence, next_real, settle};
use vigilante_zmq::events::{Hash, HashEvent, SequenceKind, Topic};
use vigilante_zmq::{CloseError, Config, Consume, Lifecycle, SubscribeError, Subscriber, TryRecvError, spawn_consumer};

fn subscriber(publisher: &FakePublisher, capacity: usize) -> Subscriber {
    Subscriber::new(Config::new(publisher.endpoint()).with_capacity(capacity)).expect("subscriber")
}

#[tokio::test]
async fn test_single_hashblock_consumer_keeps_newest() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    let mut blocks = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut blocks).await?;

    for seq in 1..=3u32 {
        publisher.hash(Topic::HashBlock, hash_of(seq as u8), seq)?;
    }
    settle().await;

    let mut seen = Vec::new();
    while let Some(ev) = next_real(&mut blocks, is_marker_hash).await? {
        seen.push(ev);
        if ev.sequence == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let last = seen.last().expect("at least one event");
    assert_eq!(last.sequence, 3, "newest event must survive: {seen:?}");
    assert_eq!(last.hash, Hash(hash_of(3)));
    assert!(
        seen.windows(2).all(|w| w[0].sequence < w[1].sequence),
        "counters must strictly increase: {seen:?}"
    );
    // Losses come from the oldest end: whatever survived is a contiguous tail.
    let first = seen[0].sequence;
    assert_eq!(
        seen.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        (first..=3).collect::<Vec<_>>()
    );

    sub.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_rawtx_fans_out_to_every_consumer() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let mut a = sub.subscribe_raw_tx()?;
    let mut b = sub.subscribe_raw_tx()?;
    publisher.warm_up(&mut a).await?;
    common::drain(&mut b);

    let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 10 + i as usize]).collect();
    for (i, p) in payloads.iter().enumerate() {
        publisher.raw(Topic::RawTx, p, i as u32 + 1)?;
    }

    for rx in [&mut a, &mut b] {
        for (i, p) in payloads.iter().enumerate() {
            let ev = next_real(rx, is_marker_raw).await?.expect("open queue");
            assert_eq!(&*ev.payload, p.as_slice());
            assert_eq!(ev.sequence, i as u32 + 1);
        }
    }

    sub.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sequence_unknown_tag_is_dropped() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let mut seq = sub.subscribe_sequence()?;
    publisher.warm_up(&mut seq).await?;

    publisher.sequence(hash_of(1), b'C', None, 1)?;
    publisher.sequence(hash_of(2), b'X', None, 2)?;
    publisher.sequence(hash_of(3), b'A', Some(0x1122_3344_5566_7788), 3)?;

    let connected = next_real(&mut seq, is_marker_sequence).await?.expect("open queue");
    assert_eq!(connected.kind, SequenceKind::BlockConnected);
    assert_eq!(connected.hash, Hash(hash_of(1)));
    assert_eq!(connected.mempool_sequence, None);

    let added = next_real(&mut seq, is_marker_sequence).await?.expect("open queue");
    assert_eq!(added.kind, SequenceKind::TransactionAddedToMempool);
    assert_eq!(added.hash, Hash(hash_of(3)));
    assert_eq!(added.mempool_sequence, Some(0x1122_3344_5566_7788));

    settle().await;
    assert_eq!(seq.try_recv().unwrap_err(), TryRecvError::Empty);

    sub.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_filter_stays_while_any_consumer_remains() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let first = sub.subscribe_hash_tx()?;
    let mut second = sub.subscribe_hash_tx()?;
    publisher.warm_up(&mut second).await?;

    first.cancel()?;
    first.cancel()?;
    let (mut first_rx, _) = first.into_parts();
    assert!(first_rx.is_closed());

    publisher.hash(Topic::HashTx, hash_of(9), 1)?;
    let ev = next_real(&mut second, is_marker_hash).await?.expect("still subscribed");
    assert_eq!(ev.hash, Hash(hash_of(9)));
    while let Ok(ev) = first_rx.try_recv() {
        assert!(is_marker_hash(&ev), "cancelled queue received {ev:?}");
    }

    second.cancel()?;
    assert_eq!(next_real(&mut second, is_marker_hash).await?, None);

    sub.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_with_live_subscriptions() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    let mut tx = sub.subscribe_hash_tx()?;
    let mut blocks = sub.subscribe_raw_block()?;
    let mut seq = sub.subscribe_sequence()?;
    assert_eq!(sub.state(), Lifecycle::Running);

    sub.close().await?;
    assert_eq!(sub.state(), Lifecycle::Exited);

    assert_eq!(tokio::time::timeout(WAIT, tx.recv()).await?, None);
    assert_eq!(tokio::time::timeout(WAIT, blocks.recv()).await?, None);
    assert_eq!(tokio::time::timeout(WAIT, seq.recv()).await?, None);

    assert!(matches!(sub.subscribe_hash_block(), Err(SubscribeError::Exited)));
    assert!(matches!(tx.cancel(), Err(SubscribeError::Exited)));
    assert!(matches!(sub.close().await, Err(CloseError::AlreadyClosed)));
    Ok(())
}

#[tokio::test]
async fn test_slow_consumer_sees_most_recent_events() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    // Registered first, so dispatch reaches it before the watcher.
    let mut lazy = sub.subscribe_hash_block()?;
    let mut watcher = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut watcher).await?;

    for seq in 1..=100u32 {
        publisher.hash(Topic::HashBlock, hash_of(seq as u8), seq)?;
    }
    loop {
        let ev = next_real(&mut watcher, is_marker_hash).await?.expect("open queue");
        if ev.sequence == 100 {
            break;
        }
    }

    let a = lazy.try_recv()?;
    let b = lazy.try_recv()?;
    assert_eq!((a.sequence, b.sequence), (99, 100));
    assert_eq!(lazy.try_recv().unwrap_err(), TryRecvError::Empty);

    sub.close().await?;
    Ok(())
}

#[test]
fn test_close_without_tokio_runtime() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    let mut tx = sub.subscribe_hash_tx()?;

    futures::executor::block_on(sub.close())?;
    assert_eq!(sub.state(), Lifecycle::Exited);
    assert_eq!(tx.blocking_recv(), None);
    assert!(matches!(
        futures::executor::block_on(sub.close()),
        Err(CloseError::AlreadyClosed)
    ));
    Ok(())
}

#[tokio::test]
async fn test_dropped_subscriptions_do_not_accumulate() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    for _ in 0..1000 {
        drop(sub.subscribe_raw_block()?);
    }

    // The filter was removed and can be installed again.
    let mut blocks = sub.subscribe_raw_block()?;
    publisher.warm_up(&mut blocks).await?;
    publisher.raw(Topic::RawBlock, b"block", 1)?;
    let ev = next_real(&mut blocks, is_marker_raw).await?.expect("open queue");
    assert_eq!(&*ev.payload, b"block");

    sub.close().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_close_has_one_winner() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = Arc::new(subscriber(&publisher, 2));
    let _held = sub.subscribe_hash_tx()?;

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move { sub.close().await })
        })
        .collect();

    let mut ok = 0;
    for call in calls {
        match call.await? {
            Ok(()) => ok += 1,
            Err(CloseError::AlreadyClosed) => {}
            Err(e) => panic!("unexpected close error: {e}"),
        }
    }
    assert_eq!(ok, 1, "exactly one close must succeed");
    assert_eq!(sub.state(), Lifecycle::Exited);
    Ok(())
}

#[tokio::test]
async fn test_disabled_subscriber() -> anyhow::Result<()> {
    let sub = Subscriber::new(Config::new(""))?;
    assert!(!sub.is_enabled());
    assert_eq!(sub.capacity(), 2);

    for err in [
        sub.subscribe_hash_tx().err(),
        sub.subscribe_hash_block().err(),
        sub.subscribe_sequence().err(),
    ] {
        let err = err.expect("subscribe must fail");
        assert_eq!(err.to_string(), "subscribe disabled");
    }
    assert!(sub.subscribe_raw_tx().is_err());
    assert!(sub.subscribe_raw_block().is_err());

    sub.close().await?;
    assert_eq!(
        sub.close().await.unwrap_err().to_string(),
        "already closed"
    );
    Ok(())
}

#[tokio::test]
async fn test_readiness_tracks_publisher_frames() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    assert!(!sub.ready(Duration::from_secs(60)));
    assert!(sub.last_event_at().is_none());

    let mut blocks = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut blocks).await?;

    assert!(sub.ready(Duration::from_secs(60)));
    assert!(sub.last_event_at().is_some());

    sub.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_drop_without_close_closes_queues() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 2);
    let mut tx = sub.subscribe_hash_tx()?;

    drop(sub);
    assert_eq!(tokio::time::timeout(WAIT, tx.recv()).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_malformed_frames_do_not_disturb_handler() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let mut blocks = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut blocks).await?;

    publisher.send(&[b"hashblock"])?;
    publisher.send(&[b"hashblock", &[1, 2, 3], &1u32.to_le_bytes()])?;
    publisher.send(&[b"hashblock", &hash_of(4), &[1]])?;
    publisher.hash(Topic::HashBlock, hash_of(5), 5)?;

    let ev = next_real(&mut blocks, is_marker_hash).await?.expect("open queue");
    assert_eq!(ev.sequence, 5);
    assert_eq!(sub.state(), Lifecycle::Running);

    sub.close().await?;
    Ok(())
}

/// Records every block counter it sees and panics on one of them.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<u32>>,
    panic_on: Option<u32>,
    closed: AtomicBool,
    progress: Notify,
}

#[async_trait]
impl Consume<HashEvent> for Recorder {
    async fn on_event(&self, ev: HashEvent) {
        if is_marker_hash(&ev) {
            return;
        }
        self.seen.lock().push(ev.sequence);
        self.progress.notify_one();
        if self.panic_on == Some(ev.sequence) {
            panic!("recorder refuses block {}", ev.sequence);
        }
    }

    async fn on_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

impl Recorder {
    async fn wait_for(&self, n: usize) -> anyhow::Result<()> {
        tokio::time::timeout(WAIT, async {
            while self.seen.lock().len() < n {
                self.progress.notified().await;
            }
        })
        .await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_consumer_survives_panics_and_sees_closure() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let mut blocks = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut blocks).await?;

    let recorder = Arc::new(Recorder {
        panic_on: Some(2),
        ..Recorder::default()
    });
    let worker = spawn_consumer(blocks, Arc::clone(&recorder));
    assert_eq!(worker.name(), "recorder");

    for seq in 1..=3u32 {
        publisher.hash(Topic::HashBlock, hash_of(seq as u8), seq)?;
    }
    recorder.wait_for(3).await?;
    assert_eq!(*recorder.seen.lock(), vec![1, 2, 3]);

    sub.close().await?;
    tokio::time::timeout(WAIT, worker.join()).await?;
    assert!(recorder.closed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn test_stopped_consumer_releases_topic() -> anyhow::Result<()> {
    let publisher = FakePublisher::bind()?;
    let sub = subscriber(&publisher, 8);
    let mut blocks = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut blocks).await?;

    let recorder = Arc::new(Recorder::default());
    let worker = spawn_consumer(blocks, Arc::clone(&recorder));
    tokio::time::timeout(WAIT, worker.stop()).await??;
    assert!(!recorder.closed.load(Ordering::SeqCst));

    let mut again = sub.subscribe_hash_block()?;
    publisher.warm_up(&mut again).await?;

    sub.close().await?;
    Ok(())
}
