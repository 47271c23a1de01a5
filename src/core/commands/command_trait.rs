// src/core/commands/command_trait.rs

//! The traits every command implements: parsing from RESP arguments, and
//! execution against the shared server state.

use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bitflags::bitflags;

bitflags! {
    /// Flags describing a command's properties. Only `WRITE` currently
    /// drives behavior (propagation and the command-history ring's
    /// mutation check, per `spec.md` §4.4's "(currently: SET)"), but it is
    /// kept as a bitflag set rather than a bare `bool` so a new command's
    /// flags read the same way a reviewer would expect from any command
    /// table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        /// Replicated to attached replicas and counted as a mutation by WAIT.
        const WRITE = 1 << 0;
    }
}

/// Whether a command's execution should be treated as a mutation for
/// replication and `WAIT` purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    DidNotWrite,
    Wrote,
}

/// Parses a command's arguments (the elements after the command name) into
/// the command's own struct.
pub trait ParseCommand: Sized {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError>;
}

/// Executes a parsed command against shared server state, producing the
/// reply frame and whether it counted as a write.
#[async_trait]
pub trait ExecutableCommand {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError>;

    fn flags(&self) -> CommandFlags {
        CommandFlags::empty()
    }
}
