// src/core/commands/generic/psync.rs

//! `PSYNC <replid> <offset>` has no ordinary RESP reply: it replies with the
//! `+FULLRESYNC` simple string followed immediately by an RDB bulk transfer,
//! then hands the connection off to replica-propagation mode. Parsed here,
//! dispatched specially by the connection layer.

use crate::core::commands::command_trait::ParseCommand;
use crate::core::commands::helpers::{extract_string, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;

#[derive(Debug, Clone)]
pub struct Psync {
    pub replid: String,
    pub offset: String,
}

impl ParseCommand for Psync {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 2, "PSYNC")?;
        Ok(Psync {
            replid: extract_string(&args[0])?,
            offset: extract_string(&args[1])?,
        })
    }
}
