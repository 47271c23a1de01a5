// src/core/state/replica.rs

//! A primary's view of one connected replica: its advertised listening port,
//! the outbox used to propagate command frames to it, and the offset it has
//! most recently acknowledged.

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Capacity of a replica's outbound frame queue. Propagation is fire-and-forget
/// from the dispatcher's perspective; a full queue means the replica's writer
/// task is falling behind and the send is treated as a failure.
const REPLICA_OUTBOX_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct ReplicaHandle {
    pub id: u64,
    pub listening_port: u16,
    ack_offset: Arc<AtomicU64>,
    tx: mpsc::Sender<Bytes>,
}

impl ReplicaHandle {
    /// Creates a handle plus the receiving half of its outbox, which the
    /// connection's writer task drains and forwards to the socket.
    pub fn new(id: u64, listening_port: u16) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(REPLICA_OUTBOX_CAPACITY);
        (
            Self {
                id,
                listening_port,
                ack_offset: Arc::new(AtomicU64::new(0)),
                tx,
            },
            rx,
        )
    }

    /// Queues a raw, already-encoded frame for propagation. Returns `Err` if
    /// the replica's writer task is gone or its outbox is full, either of
    /// which means the replica should be deregistered.
    pub fn propagate(&self, frame: Bytes) -> Result<(), ()> {
        self.tx.try_send(frame).map_err(|_| ())
    }

    pub fn ack_offset_handle(&self) -> Arc<AtomicU64> {
        self.ack_offset.clone()
    }

    pub fn ack_offset(&self) -> u64 {
        self.ack_offset.load(Ordering::SeqCst)
    }
}
