//! # vigilante-zmq
//!
//! Subscriber for the ZeroMQ event stream of a Bitcoin node.
//!
//! The node publishes five topics (`hashtx`, `hashblock`, `rawtx`,
//! `rawblock`, `sequence`). A [`Subscriber`] connects once, installs a topic
//! filter only while somebody listens to that topic, and fans each event out
//! to every interested consumer through its own bounded queue. A consumer
//! that falls behind loses its oldest events; it never slows down the others.
//!
//! ## Architecture
//! ```text
//!  node PUB ──tcp──► SUB publisher ─┐
//!                                   │  zmq::poll
//!  subscribe_*() / cancel() ──►     ├──────────────► handler thread
//!    PAIR front ──inproc──► PAIR back                  │
//!                                                      │ decode
//!                                                      ▼
//!                                    ┌──────────────────────────────────┐
//!                                    │ Registry (RwLock)                │
//!                                    │  hashtx    [q1, q2]              │
//!                                    │  hashblock [q3]                  │
//!                                    │  rawtx     []                    │
//!                                    │  rawblock  []                    │
//!                                    │  sequence  [q4]                  │
//!                                    └──┬──────┬──────┬──────┬──────────┘
//!                                       ▼      ▼      ▼      ▼
//!                                      q1     q2     q3     q4   (drop-oldest)
//!                                       ▼      ▼      ▼      ▼
//!                                   Subscription::recv / spawn_consumer
//! ```
//!
//! ### Lifecycle
//! ```text
//! Subscriber::new(cfg)
//!   ├─ address empty ─► disabled: subscribe_* → SubscribeError::Disabled
//!   └─ open transport, spawn handler ─► Running
//!
//! close().await  (or Drop)
//!   ├─ send term ─► handler leaves its loop
//!   ├─ handler closes every queue, signals exited ─► consumers see None
//!   └─ join handler, release context ─► Exited
//! ```
//!
//! ## Features
//! | Area              | Description                                           | Key types                                   |
//! |-------------------|-------------------------------------------------------|---------------------------------------------|
//! | **Subscriber**    | Connect, subscribe per topic, shut down.              | [`Subscriber`], [`Subscription`]            |
//! | **Events**        | Typed payloads decoded from multipart frames.         | [`events::Notification`], [`events::Topic`] |
//! | **Queues**        | Bounded drop-oldest per-consumer queues.              | [`EventReceiver`]                           |
//! | **Workers**       | Drive a subscription from a tokio task.               | [`Consume`], [`spawn_consumer`]             |
//! | **Errors**        | Typed errors with stable labels.                      | [`SubscribeError`], [`CloseError`]          |
//! | **Configuration** | Publisher address and queue capacity.                 | [`Config`]                                  |
//!
//! ## Example
//! ```no_run
//! use vigilante_zmq::{Config, Subscriber};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subscriber = Subscriber::new(Config::new("tcp://127.0.0.1:28332"))?;
//!
//!     let mut seq = subscriber.subscribe_sequence()?;
//!     if let Some(ev) = seq.recv().await {
//!         println!("{:?} {} {:?}", ev.kind, ev.hash, ev.mempool_sequence);
//!     }
//!
//!     seq.cancel()?;
//!     subscriber.close().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod subscribers;
mod transport;

pub mod events;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_QUEUE_CAPACITY};
pub use core::{CancelHandle, Lifecycle, Subscriber, Subscription};
pub use error::{BuildError, CloseError, DecodeError, SubscribeError};
pub use subscribers::{Consume, ConsumerHandle, EventReceiver, TryRecvError, spawn_consumer};
