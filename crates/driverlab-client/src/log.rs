//! Bounded message log.
//!
//! Every frame sent or received by a session is recorded here in order.
//! The log holds at most `capacity` entries; appending to a full log evicts
//! the oldest one. Storage is allocated once, so a chatty keepalive driver
//! never causes reallocation.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use driverlab_core::{ClientFrame, InboundFrame};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Default number of entries a session keeps.
pub const DEFAULT_CAPACITY: usize = 500;

/// Largest capacity a [`SessionConfig`](crate::SessionConfig) accepts.
pub const MAX_CAPACITY: usize = 100_000;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique entry id.
///
/// Ordered by sequence number, so entries captured within the same
/// millisecond still sort in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId {
    seq: u64,
    millis: i64,
}

impl EntryId {
    fn next(at: DateTime<Utc>) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            millis: at.timestamp_millis(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}-{}", self.millis, self.seq)
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which way a frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// One logged frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEntry {
    pub id: EntryId,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// The frame discriminator (`exec`, `stdout`, `meta`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// The frame body with its envelope stripped.
    pub payload: Value,
    /// The frame as it went over the wire.
    #[serde(skip)]
    pub raw: Value,
}

impl MessageEntry {
    pub fn new(direction: Direction, kind: impl Into<String>, payload: Value, raw: Value) -> Self {
        let timestamp = Utc::now();
        Self {
            id: EntryId::next(timestamp),
            timestamp,
            direction,
            kind: kind.into(),
            payload,
            raw,
        }
    }

    pub fn sent(frame: &ClientFrame) -> Self {
        let raw = serde_json::to_value(frame).unwrap_or_default();
        Self::new(Direction::Sent, frame.kind(), frame.payload(), raw)
    }

    pub fn received(frame: &InboundFrame) -> Self {
        Self::new(Direction::Received, frame.kind(), frame.payload(), frame.raw())
    }
}

/// Ordered, capacity-bounded sequence of [`MessageEntry`]s.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<MessageEntry>,
    capacity: usize,
    evicted: u64,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageLog {
    /// Create an empty log. A capacity of zero is raised to one.
    ///
    /// Storage for at most [`DEFAULT_CAPACITY`] entries is reserved up
    /// front; larger logs grow on demand until they reach `capacity`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    /// Append an entry, returning the one evicted to make room, if any.
    pub fn append(&mut self, entry: MessageEntry) -> Option<MessageEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.evicted += 1;
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Drop all entries and reset the eviction count.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.evicted = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted since the log was created or last cleared.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MessageEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &MessageEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn latest(&self) -> Option<&MessageEntry> {
        self.entries.back()
    }

    pub fn get(&self, id: EntryId) -> Option<&MessageEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}
