// src/core/command.rs

//! The top-level `Command` enum: every command this server understands,
//! parsed from a request's argument list and dispatched by the connection
//! layer. Command names are case-insensitive on the wire; everywhere else
//! they're compared uppercased.

use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::generic::{Echo, Info, Ping, Psync, Replconf, Type};
use crate::core::commands::replication::Wait;
use crate::core::commands::streams::{XAdd, XLen, XRange, XRead};
use crate::core::commands::string::{Get, Set};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;

/// A fully parsed command, ready to be role-checked and executed.
#[derive(Debug, Clone)]
pub enum Command {
    Ping(Ping),
    Echo(Echo),
    Set(Set),
    Get(Get),
    Info(Info),
    Type(Type),
    Replconf(Replconf),
    Psync(Psync),
    Wait(Wait),
    XAdd(XAdd),
    XRange(XRange),
    XRead(XRead),
    XLen(XLen),
}

impl Command {
    /// Parses a command's name and argument list into a `Command`. The name
    /// comes pre-split from the request's array of bulk strings.
    pub fn parse(name: &str, args: &[RespFrame]) -> Result<Self, FerriteError> {
        match name.to_ascii_uppercase().as_str() {
            "PING" => Ok(Command::Ping(Ping::parse(args)?)),
            "ECHO" => Ok(Command::Echo(Echo::parse(args)?)),
            "SET" => Ok(Command::Set(Set::parse(args)?)),
            "GET" => Ok(Command::Get(Get::parse(args)?)),
            "INFO" => Ok(Command::Info(Info::parse(args)?)),
            "TYPE" => Ok(Command::Type(Type::parse(args)?)),
            "REPLCONF" => Ok(Command::Replconf(Replconf::parse(args)?)),
            "PSYNC" => Ok(Command::Psync(Psync::parse(args)?)),
            "WAIT" => Ok(Command::Wait(Wait::parse(args)?)),
            "XADD" => Ok(Command::XAdd(XAdd::parse(args)?)),
            "XRANGE" => Ok(Command::XRange(XRange::parse(args)?)),
            "XREAD" => Ok(Command::XRead(XRead::parse(args)?)),
            "XLEN" => Ok(Command::XLen(XLen::parse(args)?)),
            other => Err(FerriteError::UnknownCommand(other.to_string())),
        }
    }

    /// The uppercased command name, used for the command-history ring and
    /// for tracing spans.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping(_) => "PING",
            Command::Echo(_) => "ECHO",
            Command::Set(_) => "SET",
            Command::Get(_) => "GET",
            Command::Info(_) => "INFO",
            Command::Type(_) => "TYPE",
            Command::Replconf(_) => "REPLCONF",
            Command::Psync(_) => "PSYNC",
            Command::Wait(_) => "WAIT",
            Command::XAdd(_) => "XADD",
            Command::XRange(_) => "XRANGE",
            Command::XRead(_) => "XREAD",
            Command::XLen(_) => "XLEN",
        }
    }

    /// Commands reserved to the primary's handler table, per `spec.md` §4.5.
    pub fn requires_primary_role(&self) -> bool {
        matches!(
            self,
            Command::Psync(_) | Command::Wait(_) | Command::XAdd(_) | Command::XRange(_) | Command::XRead(_) | Command::XLen(_)
        )
    }

    /// `true` for `PSYNC`: the connection layer handles it entirely outside
    /// the ordinary request/reply path (FULLRESYNC + RDB bulk + handoff).
    pub fn is_psync(&self) -> bool {
        matches!(self, Command::Psync(_))
    }
}

#[async_trait]
impl ExecutableCommand for Command {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        match self {
            Command::Ping(c) => c.execute(state).await,
            Command::Echo(c) => c.execute(state).await,
            Command::Set(c) => c.execute(state).await,
            Command::Get(c) => c.execute(state).await,
            Command::Info(c) => c.execute(state).await,
            Command::Type(c) => c.execute(state).await,
            Command::Wait(c) => c.execute(state).await,
            Command::XAdd(c) => c.execute(state).await,
            Command::XRange(c) => c.execute(state).await,
            Command::XRead(c) => c.execute(state).await,
            Command::XLen(c) => c.execute(state).await,
            Command::Replconf(_) | Command::Psync(_) => Err(FerriteError::Internal(
                "REPLCONF/PSYNC carry connection-level side effects and must be dispatched specially"
                    .to_string(),
            )),
        }
    }

    fn flags(&self) -> CommandFlags {
        match self {
            Command::Set(c) => c.flags(),
            _ => CommandFlags::empty(),
        }
    }
}
