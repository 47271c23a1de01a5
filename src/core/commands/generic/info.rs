// src/core/commands/generic/info.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::extract_string;
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct Info {
    pub section: Option<String>,
}

impl ParseCommand for Info {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        match args.len() {
            0 => Ok(Info { section: None }),
            1 => Ok(Info {
                section: Some(extract_string(&args[0])?.to_ascii_lowercase()),
            }),
            _ => Err(FerriteError::WrongArgumentCount("INFO".to_string())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for Info {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let body = state.info_replication();
        Ok((
            RespFrame::BulkString(bytes::Bytes::from(body)),
            WriteOutcome::DidNotWrite,
        ))
    }
}
