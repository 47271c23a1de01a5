// src/core/replication/mod.rs

//! Replica-side replication: the handshake against a primary and the
//! ongoing loop applying its command stream. (Primary-side state —
//! the replica registry, offsets, propagation — lives in `core::state`,
//! since it's shared with every ordinary client connection too.)

mod handshake;

pub use handshake::{connect_and_handshake, run_apply_loop};
