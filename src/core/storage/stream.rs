// src/core/storage/stream.rs

//! The stream store: an append-only, per-key ordered log of entries keyed by
//! strictly monotonic (ms, sequence) identifiers, plus range and read-after
//! queries over that log.

use crate::core::errors::FerriteError;
use bytes::Bytes;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// A stream entry identifier: a (ms-timestamp, sequence) pair, totally
/// ordered lexicographically on the pair and printed as `MS-SEQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = FerriteError;

    /// Parses a fully-specified `MS-SEQ` or bare `MS` literal. Does not
    /// handle `*`, `MS-*`, `-`, `+`, or `$` — those are resolved by the
    /// commands that accept them, since their meaning depends on stream
    /// state at the time of the call.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((ms, seq)) => Ok(StreamId {
                ms: ms.parse().map_err(|_| FerriteError::SyntaxError)?,
                seq: seq.parse().map_err(|_| FerriteError::SyntaxError)?,
            }),
            None => Ok(StreamId {
                ms: s.parse().map_err(|_| FerriteError::SyntaxError)?,
                seq: 0,
            }),
        }
    }
}

/// A single appended entry: an ID plus an ordered sequence of field/value
/// pairs. Field order is insertion order; a duplicate field name within one
/// `XADD` call overwrites the earlier value in place rather than appending a
/// second copy, so wire output stays deterministic.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: IndexMap<Bytes, Bytes>,
}

/// The how-to-generate-an-ID request parsed from an `XADD` command's ID
/// argument.
#[derive(Debug, Clone, Copy)]
pub enum IdSpec {
    /// `*`: fully auto-generated.
    Auto,
    /// `MS-*`: timestamp fixed, sequence auto-generated.
    Partial(u64),
    /// `MS-SEQ`: fully specified, validated against the current last ID.
    Full(StreamId),
}

impl IdSpec {
    pub fn parse(raw: &str) -> Result<Self, FerriteError> {
        if raw == "*" {
            return Ok(IdSpec::Auto);
        }
        if let Some(ms_part) = raw.strip_suffix("-*") {
            let ms = ms_part.parse().map_err(|_| FerriteError::SyntaxError)?;
            return Ok(IdSpec::Partial(ms));
        }
        Ok(IdSpec::Full(raw.parse::<StreamId>()?))
    }
}

/// An append-only, ordered log of entries for one stream key. `entries` is a
/// `BTreeMap` so it is simultaneously the log and the ordered-by-ID index;
/// `last_id` is cached so validation and auto-generation never need a scan.
#[derive(Debug, Default)]
pub struct Stream {
    entries: BTreeMap<StreamId, StreamEntry>,
    last_id: StreamId,
}

impl Stream {
    fn current_time_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    /// Resolves an `IdSpec` against this stream's current state and appends
    /// the entry, per `spec.md` §4.3's three ID syntaxes.
    fn add_entry(
        &mut self,
        id_spec: IdSpec,
        fields: IndexMap<Bytes, Bytes>,
    ) -> Result<StreamId, FerriteError> {
        let new_id = match id_spec {
            IdSpec::Auto => {
                let now_ms = Self::current_time_ms();
                if now_ms > self.last_id.ms {
                    StreamId::new(now_ms, 0)
                } else {
                    // Clock hasn't advanced past the last entry's timestamp;
                    // keep the stream strictly increasing by bumping the
                    // sequence (or the timestamp itself, whichever the last
                    // entry used).
                    StreamId::new(self.last_id.ms, self.last_id.seq + 1)
                }
            }
            IdSpec::Partial(ms) => {
                let seq = if self.entries.is_empty() {
                    if ms == 0 { 1 } else { 0 }
                } else if ms == self.last_id.ms {
                    self.last_id.seq + 1
                } else if ms > self.last_id.ms {
                    0
                } else {
                    return Err(FerriteError::XAddIdNotIncreasing);
                };
                StreamId::new(ms, seq)
            }
            IdSpec::Full(id) => id,
        };

        if new_id == StreamId::MIN {
            return Err(FerriteError::XAddIdZero);
        }
        if !self.entries.is_empty() && new_id <= self.last_id {
            return Err(FerriteError::XAddIdNotIncreasing);
        }

        self.entries.insert(new_id, StreamEntry { id: new_id, fields });
        self.last_id = new_id;
        Ok(new_id)
    }

    fn range(&self, start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        self.entries
            .range(start..=end)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn read_after(&self, after: StreamId) -> Vec<StreamEntry> {
        self.entries
            .range((
                std::ops::Bound::Excluded(after),
                std::ops::Bound::Unbounded,
            ))
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn last_id(&self) -> StreamId {
        self.last_id
    }

    fn len(&self) -> u64 {
        self.entries.len() as u64
    }
}

/// The store of all streams, keyed by stream key. Each stream is behind its
/// own `RwLock`, matching `spec.md` §5: readers/writers serialise per-stream,
/// not globally.
#[derive(Debug, Default)]
pub struct StreamStore {
    streams: DashMap<Bytes, Arc<RwLock<Stream>>>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.streams.contains_key(key)
    }

    fn handle(&self, key: &Bytes) -> Arc<RwLock<Stream>> {
        self.streams
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Stream::default())))
            .value()
            .clone()
    }

    /// Appends an entry, creating the stream if it does not already exist.
    pub async fn xadd(
        &self,
        key: &Bytes,
        id_spec: IdSpec,
        fields: IndexMap<Bytes, Bytes>,
    ) -> Result<StreamId, FerriteError> {
        let handle = self.handle(key);
        let mut guard = handle.write().await;
        guard.add_entry(id_spec, fields)
    }

    /// Returns the entries in `[start, end]` inclusive, or an empty vector if
    /// the key does not exist or the range is empty.
    pub async fn xrange(&self, key: &[u8], start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        match self.streams.get(key) {
            Some(handle) => handle.value().clone().read_owned().await.range(start, end),
            None => Vec::new(),
        }
    }

    /// Returns entries with ID strictly greater than `after`.
    pub async fn read_after(&self, key: &[u8], after: StreamId) -> Vec<StreamEntry> {
        match self.streams.get(key) {
            Some(handle) => handle.value().clone().read_owned().await.read_after(after),
            None => Vec::new(),
        }
    }

    /// Returns the last ID currently stored for `key`, or `0-0` if the
    /// stream does not exist. Used to resolve the `$` sentinel in `XREAD`.
    pub async fn last_id(&self, key: &[u8]) -> StreamId {
        match self.streams.get(key) {
            Some(handle) => handle.value().clone().read_owned().await.last_id(),
            None => StreamId::MIN,
        }
    }

    pub async fn len(&self, key: &[u8]) -> u64 {
        match self.streams.get(key) {
            Some(handle) => handle.value().clone().read_owned().await.len(),
            None => 0,
        }
    }
}
