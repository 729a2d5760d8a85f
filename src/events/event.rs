//! # Typed events decoded from the node's publish socket.
//!
//! One event type per payload shape:
//! - [`HashEvent`] for `hashtx` / `hashblock`
//! - [`RawEvent`] for `rawtx` / `rawblock`
//! - [`SequenceEvent`] for `sequence`
//!
//! [`Notification`] tags an event with the topic it arrived on; it is what
//! the handler dispatches.
//!
//! ## Ordering
//! `HashEvent::sequence` and `RawEvent::sequence` are the publisher's
//! per-topic counters. They increase by one per message, so a consumer that
//! sees a jump knows the drop-oldest policy (or the network) lost events.

use std::fmt;
use std::sync::Arc;

use super::Topic;

/// 32-byte block or transaction hash, in the byte order it was published.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Length of a hash on the wire.
    pub const LEN: usize = 32;

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// Hash announcement (`hashtx`, `hashblock`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEvent {
    /// Transaction or block hash.
    pub hash: Hash,
    /// Publisher sequence counter for the topic.
    pub sequence: u32,
}

/// Serialized transaction or block (`rawtx`, `rawblock`).
///
/// The payload is shared between all consumers of the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Opaque serialized bytes.
    pub payload: Arc<[u8]>,
    /// Publisher sequence counter for the topic.
    pub sequence: u32,
}

/// Kind of a `sequence` notification, keyed by its one-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// `C`: block connected to the active chain.
    BlockConnected,
    /// `D`: block disconnected from the active chain.
    BlockDisconnected,
    /// `R`: transaction removed from the mempool.
    TransactionRemovedFromMempool,
    /// `A`: transaction added to the mempool.
    TransactionAddedToMempool,
}

impl SequenceKind {
    /// Maps a wire tag to a kind; unknown tags yield `None`.
    pub fn from_tag(tag: u8) -> Option<SequenceKind> {
        match tag {
            b'C' => Some(SequenceKind::BlockConnected),
            b'D' => Some(SequenceKind::BlockDisconnected),
            b'R' => Some(SequenceKind::TransactionRemovedFromMempool),
            b'A' => Some(SequenceKind::TransactionAddedToMempool),
            _ => None,
        }
    }

    /// Wire tag of this kind.
    pub fn tag(self) -> u8 {
        match self {
            SequenceKind::BlockConnected => b'C',
            SequenceKind::BlockDisconnected => b'D',
            SequenceKind::TransactionRemovedFromMempool => b'R',
            SequenceKind::TransactionAddedToMempool => b'A',
        }
    }

    /// Mempool events carry an 8-byte mempool sequence after the tag.
    pub fn carries_mempool_sequence(self) -> bool {
        matches!(
            self,
            SequenceKind::TransactionRemovedFromMempool | SequenceKind::TransactionAddedToMempool
        )
    }
}

/// Chain or mempool change (`sequence`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEvent {
    /// Block hash (`C`/`D`) or transaction hash (`R`/`A`).
    pub hash: Hash,
    /// What happened.
    pub kind: SequenceKind,
    /// Mempool sequence; `Some` iff `kind.carries_mempool_sequence()`.
    pub mempool_sequence: Option<u64>,
}

/// A decoded frame, tagged by topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `hashtx`
    HashTx(HashEvent),
    /// `hashblock`
    HashBlock(HashEvent),
    /// `rawtx`
    RawTx(RawEvent),
    /// `rawblock`
    RawBlock(RawEvent),
    /// `sequence`
    Sequence(SequenceEvent),
}

impl Notification {
    /// Topic this notification was published on.
    pub fn topic(&self) -> Topic {
        match self {
            Notification::HashTx(_) => Topic::HashTx,
            Notification::HashBlock(_) => Topic::HashBlock,
            Notification::RawTx(_) => Topic::RawTx,
            Notification::RawBlock(_) => Topic::RawBlock,
            Notification::Sequence(_) => Topic::Sequence,
        }
    }
}
