// src/core/commands/generic/ping.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::extract_bytes;
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct Ping {
    pub message: Option<Bytes>,
}

impl ParseCommand for Ping {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        match args.len() {
            0 => Ok(Ping { message: None }),
            1 => Ok(Ping {
                message: Some(extract_bytes(&args[0])?),
            }),
            _ => Err(FerriteError::WrongArgumentCount("PING".to_string())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for Ping {
    async fn execute(&self, _state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let reply = match &self.message {
            Some(msg) => RespFrame::BulkString(msg.clone()),
            None => RespFrame::SimpleString("PONG".to_string()),
        };
        Ok((reply, WriteOutcome::DidNotWrite))
    }
}
