// src/core/stream_blocking.rs

//! Implements the `BLOCK` option of `XREAD`: wait for new entries to appear
//! on one or more streams, or until a deadline passes.

use crate::core::pubsub::PubSub;
use crate::core::storage::{StreamEntry, StreamId, StreamStore};
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

/// The default block duration when a client passes `BLOCK 0`. `spec.md`
/// resolves the source's ambiguous "0 means wait forever" behavior in favor
/// of a bounded default, so a stalled client can never wedge a connection
/// slot open indefinitely.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for new entries on any of `keys` (each paired with the ID the
/// caller has already seen), returning as soon as any of them has new data,
/// or once `timeout` elapses.
///
/// Subscribes to every key's notification topic *before* checking for
/// existing data, so a publish racing with this call is never missed: it
/// either lands before the check (and the check already sees it) or after
/// (and the subscription's buffered channel holds it until `recv` is
/// called).
pub async fn block_on_streams(
    pubsub: &PubSub,
    streams: &StreamStore,
    keys: &[(Bytes, StreamId)],
    timeout: Duration,
) -> Vec<(Bytes, Vec<StreamEntry>)> {
    let mut subs = Vec::with_capacity(keys.len());
    for (key, _) in keys {
        subs.push(pubsub.subscribe(key.clone()).await);
    }

    if let Some(ready) = collect_ready(streams, keys).await {
        return ready;
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Vec::new();
        }

        let woke = tokio::select! {
            _ = tokio::time::sleep(remaining) => false,
            _ = wait_any(&mut subs) => true,
        };

        if let Some(ready) = collect_ready(streams, keys).await {
            return ready;
        }
        if !woke {
            return Vec::new();
        }
    }
}

async fn wait_any(subs: &mut [crate::core::pubsub::Subscription]) {
    if subs.is_empty() {
        std::future::pending::<()>().await;
    }
    let waiters = subs.iter_mut().map(|s| Box::pin(s.recv()));
    futures::future::select_all(waiters).await;
}

async fn collect_ready(
    streams: &StreamStore,
    keys: &[(Bytes, StreamId)],
) -> Option<Vec<(Bytes, Vec<StreamEntry>)>> {
    let mut ready = Vec::new();
    for (key, after) in keys {
        let entries = streams.read_after(key, *after).await;
        if !entries.is_empty() {
            ready.push((key.clone(), entries));
        }
    }
    if ready.is_empty() {
        None
    } else {
        Some(ready)
    }
}
