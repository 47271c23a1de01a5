// src/core/state/core.rs

//! The central `ServerState`: the single handle threaded through every
//! connection task and background task, holding the kv store, stream store,
//! pub/sub bus, and role-specific replication state.

use super::history::CommandHistoryRing;
use super::replica::ReplicaHandle;
use crate::config::Config;
use crate::core::pubsub::PubSub;
use crate::core::storage::{KvStore, StreamStore};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

/// The replication ID this server always advertises. Fixed rather than
/// randomly generated at startup: `spec.md` pins this exact value as a wire
/// literal, matching what a reference client test suite expects.
pub const REPL_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Hex encoding of the empty RDB file a primary sends immediately after
/// `+FULLRESYNC` on every PSYNC, since this server never implements partial
/// resync or backlog-based catch-up.
pub const EMPTY_RDB_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

/// This server's replication role, fixed for the process lifetime at
/// startup based on `--replicaof`. A sum type over role, not a class
/// hierarchy: the dispatcher selects a handler table from this, rather than
/// branching on a mutable "is replica" flag.
#[derive(Debug)]
pub enum Role {
    Primary(PrimaryState),
    Replica(ReplicaRoleState),
}

impl Role {
    pub fn as_info_str(&self) -> &'static str {
        match self {
            Role::Primary(_) => "master",
            Role::Replica(_) => "slave",
        }
    }

    pub fn as_primary(&self) -> Option<&PrimaryState> {
        match self {
            Role::Primary(p) => Some(p),
            Role::Replica(_) => None,
        }
    }
}

/// Primary-side replication state: the replica registry and the cumulative
/// byte offset of propagated commands.
#[derive(Debug, Default)]
pub struct PrimaryState {
    pub master_repl_offset: AtomicU64,
    replicas: DashMap<u64, ReplicaHandle>,
    next_replica_id: AtomicU64,
}

impl PrimaryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly PSYNC'd replica, returning its ID, the receiving
    /// half of its outbox (handed to the connection's writer loop), and a
    /// shared handle to its acknowledged-offset counter (updated by the
    /// connection's reader loop as `REPLCONF ACK` frames arrive).
    pub fn register_replica(
        &self,
        listening_port: u16,
    ) -> (u64, mpsc::Receiver<Bytes>, std::sync::Arc<AtomicU64>) {
        let id = self.next_replica_id.fetch_add(1, Ordering::SeqCst);
        let (handle, rx) = ReplicaHandle::new(id, listening_port);
        let ack_offset = handle.ack_offset_handle();
        self.replicas.insert(id, handle);
        (id, rx, ack_offset)
    }

    pub fn deregister_replica(&self, id: u64) {
        self.replicas.remove(&id);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn replica_ack_offsets(&self) -> Vec<(u64, u64)> {
        self.replicas
            .iter()
            .map(|entry| (*entry.key(), entry.value().ack_offset()))
            .collect()
    }

    /// Propagates an already-encoded command frame to every registered
    /// replica, advancing the master offset by its length regardless of how
    /// many replicas are attached. Replicas whose outbox rejects the send
    /// are deregistered here — write failure is the sole owner of replica
    /// removal, avoiding a double-deregistration race.
    pub fn propagate(&self, frame: Bytes) {
        self.master_repl_offset
            .fetch_add(frame.len() as u64, Ordering::SeqCst);

        let mut dead = Vec::new();
        for entry in self.replicas.iter() {
            if entry.value().propagate(frame.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.replicas.remove(&id);
        }
    }
}

/// Replica-side replication state: the primary this server follows, and how
/// many bytes of its replication stream have been processed so far.
#[derive(Debug)]
pub struct ReplicaRoleState {
    pub primary_host: String,
    pub primary_port: u16,
    pub processed_offset: AtomicU64,
}

impl ReplicaRoleState {
    pub fn new(primary_host: String, primary_port: u16) -> Self {
        Self {
            primary_host,
            primary_port,
            processed_offset: AtomicU64::new(0),
        }
    }

    pub fn add_processed_bytes(&self, n: u64) {
        self.processed_offset.fetch_add(n, Ordering::SeqCst);
    }

    pub fn processed_offset(&self) -> u64 {
        self.processed_offset.load(Ordering::SeqCst)
    }
}

/// The handle shared across every connection and background task.
#[derive(Debug)]
pub struct ServerState {
    pub kv: KvStore,
    pub streams: StreamStore,
    pub pubsub: PubSub,
    pub config: Config,
    pub command_history: Mutex<CommandHistoryRing>,
    pub role: Role,
}

impl ServerState {
    pub fn new(config: Config, role: Role) -> Self {
        Self {
            kv: KvStore::new(),
            streams: StreamStore::new(),
            pubsub: PubSub::spawn(),
            config,
            command_history: Mutex::new(CommandHistoryRing::new()),
            role,
        }
    }

    /// The exact `INFO replication` bulk payload. `master_replid` and
    /// `master_repl_offset` are fixed wire literals per `spec.md` §6 — only
    /// the role token reflects this server's actual state.
    pub fn info_replication(&self) -> String {
        format!(
            "# Replication\nrole:{}\nmaster_replid:{}\nmaster_repl_offset:0\n",
            self.role.as_info_str(),
            REPL_ID,
        )
    }
}

#[cfg(test)]
impl ServerState {
    /// A minimal primary-role state for command unit tests.
    pub fn test_primary() -> Self {
        Self::new(
            crate::config::Config {
                port: 6379,
                dir: ".".to_string(),
                dbfilename: "dump.rdb".to_string(),
                replicaof: None,
            },
            Role::Primary(PrimaryState::new()),
        )
    }
}
