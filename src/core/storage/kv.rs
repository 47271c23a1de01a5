// src/core/storage/kv.rs

//! The key/value store: a concurrent map from key to (value, optional
//! expiry), with lazy expiration on read.

use bytes::Bytes;
use dashmap::DashMap;
use std::time::SystemTime;

/// A single key/value entry. `expires_at` is an absolute wall-clock instant;
/// a key is unobservable once `expires_at <= now`, even if it has not yet
/// been physically removed.
#[derive(Debug, Clone)]
pub struct KvEntry {
    pub value: Bytes,
    pub expires_at: Option<SystemTime>,
}

impl KvEntry {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= SystemTime::now(),
            None => false,
        }
    }
}

/// A concurrent key/value store. `DashMap` gives us per-shard locking, which
/// satisfies `spec.md`'s "single-writer-per-key suffices" concurrency
/// contract without a single global lock.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: DashMap<Bytes, KvEntry>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` with an optional absolute expiry.
    pub fn set(&self, key: Bytes, value: Bytes, expires_at: Option<SystemTime>) {
        self.entries.insert(key, KvEntry { value, expires_at });
    }

    /// Returns the value for `key`, removing it first if it has expired.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            return Some(entry.value.clone());
        }
        None
    }

    /// Returns whether `key` currently holds a live (non-expired) value,
    /// removing it first if it has expired. Used by `TYPE`.
    pub fn contains_live(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Loaded directly by the RDB loader at startup; bypasses the normal
    /// `set` path only in name, not in semantics.
    pub fn load(&self, key: Bytes, value: Bytes, expires_at: Option<SystemTime>) {
        self.set(key, value, expires_at);
    }
}
