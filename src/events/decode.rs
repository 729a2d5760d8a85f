//! # Publisher frame decoding.
//!
//! ## Wire format
//! ```text
//! part 0: topic label         hashtx | hashblock | rawtx | rawblock | sequence
//! part 1: body
//!           hash topics       32-byte hash
//!           raw topics        serialized tx/block (opaque)
//!           sequence          32-byte hash ‖ tag (C|D|R|A) [‖ u64 LE mempool seq, R|A only]
//! part 2: u32 LE counter      (ignored for `sequence`)
//! ```
//!
//! Only the fields above are extracted; payloads are never parsed.

use std::sync::Arc;

use crate::error::DecodeError;

use super::{Hash, HashEvent, Notification, RawEvent, SequenceEvent, SequenceKind, Topic};

const TAG_OFFSET: usize = Hash::LEN;
const MEMPOOL_SEQ_OFFSET: usize = TAG_OFFSET + 1;

/// Decodes one multipart frame received on the publisher socket.
///
/// # Example
/// ```
/// use vigilante_zmq::events::{decode, Notification};
///
/// let frame = vec![b"hashblock".to_vec(), vec![7u8; 32], 3u32.to_le_bytes().to_vec()];
/// match decode(&frame).unwrap() {
///     Notification::HashBlock(ev) => assert_eq!(ev.sequence, 3),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn decode(frames: &[Vec<u8>]) -> Result<Notification, DecodeError> {
    let label = frames.first().ok_or(DecodeError::Empty)?;
    let topic = Topic::from_label(label)
        .ok_or_else(|| DecodeError::UnknownTopic(String::from_utf8_lossy(label).into_owned()))?;

    match topic {
        Topic::HashTx => decode_hash(topic, frames).map(Notification::HashTx),
        Topic::HashBlock => decode_hash(topic, frames).map(Notification::HashBlock),
        Topic::RawTx => decode_raw(topic, frames).map(Notification::RawTx),
        Topic::RawBlock => decode_raw(topic, frames).map(Notification::RawBlock),
        Topic::Sequence => decode_sequence(frames).map(Notification::Sequence),
    }
}

fn decode_hash(topic: Topic, frames: &[Vec<u8>]) -> Result<HashEvent, DecodeError> {
    let body = part(topic, frames, 1)?;
    Ok(HashEvent {
        hash: read_hash(topic, body)?,
        sequence: read_counter(topic, frames)?,
    })
}

fn decode_raw(topic: Topic, frames: &[Vec<u8>]) -> Result<RawEvent, DecodeError> {
    let body = part(topic, frames, 1)?;
    Ok(RawEvent {
        payload: Arc::from(body.as_slice()),
        sequence: read_counter(topic, frames)?,
    })
}

fn decode_sequence(frames: &[Vec<u8>]) -> Result<SequenceEvent, DecodeError> {
    let topic = Topic::Sequence;
    let body = part(topic, frames, 1)?;
    let hash = read_hash(topic, body)?;

    let tag = *body.get(TAG_OFFSET).ok_or(DecodeError::Truncated {
        topic,
        field: "tag",
        need: TAG_OFFSET + 1,
        got: body.len(),
    })?;
    let kind = SequenceKind::from_tag(tag).ok_or(DecodeError::UnknownSequenceTag(tag))?;

    let mempool_sequence = if kind.carries_mempool_sequence() {
        let bytes = fixed::<8>(topic, "mempool sequence", body, MEMPOOL_SEQ_OFFSET)?;
        Some(u64::from_le_bytes(bytes))
    } else {
        None
    };

    Ok(SequenceEvent {
        hash,
        kind,
        mempool_sequence,
    })
}

fn part(topic: Topic, frames: &[Vec<u8>], index: usize) -> Result<&Vec<u8>, DecodeError> {
    frames
        .get(index)
        .ok_or(DecodeError::MissingPart { topic, index })
}

fn read_hash(topic: Topic, body: &[u8]) -> Result<Hash, DecodeError> {
    fixed::<32>(topic, "hash", body, 0).map(Hash)
}

fn read_counter(topic: Topic, frames: &[Vec<u8>]) -> Result<u32, DecodeError> {
    let bytes = fixed::<4>(topic, "sequence", part(topic, frames, 2)?, 0)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Copies `N` bytes starting at `offset`.
fn fixed<const N: usize>(
    topic: Topic,
    field: &'static str,
    buf: &[u8],
    offset: usize,
) -> Result<[u8; N], DecodeError> {
    buf.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::Truncated {
            topic,
            field,
            need: offset + N,
            got: buf.len(),
        })
}
