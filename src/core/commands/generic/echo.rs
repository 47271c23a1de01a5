// src/core/commands/generic/echo.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct Echo {
    pub message: Bytes,
}

impl ParseCommand for Echo {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 1, "ECHO")?;
        Ok(Echo {
            message: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Echo {
    async fn execute(&self, _state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        Ok((RespFrame::BulkString(self.message.clone()), WriteOutcome::DidNotWrite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_the_message_verbatim() {
        let state = ServerState::test_primary();
        let echo = Echo {
            message: Bytes::from_static(b"hey"),
        };
        let (frame, _) = echo.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::BulkString(Bytes::from_static(b"hey")));
    }

    #[test]
    fn parse_rejects_wrong_arg_count() {
        assert!(Echo::parse(&[]).is_err());
    }
}
