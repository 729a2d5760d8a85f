use std::fmt;

/// Event stream published by the node.
///
/// The label is the ASCII string carried in the first part of each
/// multipart frame and used as the subscription filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Transaction hash announcements.
    HashTx,
    /// Block hash announcements.
    HashBlock,
    /// Serialized transactions.
    RawTx,
    /// Serialized blocks.
    RawBlock,
    /// Chain and mempool sequence notifications.
    Sequence,
}

impl Topic {
    /// All topics, in wire-label order.
    pub const ALL: [Topic; 5] = [
        Topic::HashTx,
        Topic::HashBlock,
        Topic::RawTx,
        Topic::RawBlock,
        Topic::Sequence,
    ];

    /// Wire label of the topic.
    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::HashTx => "hashtx",
            Topic::HashBlock => "hashblock",
            Topic::RawTx => "rawtx",
            Topic::RawBlock => "rawblock",
            Topic::Sequence => "sequence",
        }
    }

    /// Wire label as bytes (the subscription filter prefix).
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Parses a wire label. Matching is exact, not by prefix.
    pub fn from_label(label: &[u8]) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.as_bytes() == label)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
