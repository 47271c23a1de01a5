// src/core/state/mod.rs

//! Server-wide shared state: the central `ServerState` handle plus its
//! role-specific replication sub-states.

mod core;
mod history;
mod replica;

pub use self::core::{PrimaryState, ReplicaRoleState, Role, ServerState, EMPTY_RDB_HEX, REPL_ID};
pub use history::CommandHistoryRing;
pub use replica::ReplicaHandle;
