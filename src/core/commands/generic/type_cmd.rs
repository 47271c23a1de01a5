// src/core/commands/generic/type_cmd.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct Type {
    pub key: Bytes,
}

impl ParseCommand for Type {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 1, "TYPE")?;
        Ok(Type {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Type {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let type_name = if state.kv.contains_live(&self.key) {
            "string"
        } else if state.streams.contains(&self.key) {
            "stream"
        } else {
            "none"
        };
        Ok((RespFrame::SimpleString(type_name.to_string()), WriteOutcome::DidNotWrite))
    }
}
