// src/core/commands/string/get.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct Get {
    pub key: Bytes,
}

impl ParseCommand for Get {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 1, "GET")?;
        Ok(Get {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Get {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let reply = match state.kv.get(&self.key) {
            Some(value) => RespFrame::BulkString(value),
            None => RespFrame::Null,
        };
        Ok((reply, WriteOutcome::DidNotWrite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_missing_key_returns_null() {
        let state = ServerState::test_primary();
        let get = Get {
            key: Bytes::from_static(b"missing"),
        };
        let (frame, _) = get.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Null);
    }

    #[tokio::test]
    async fn get_returns_stored_value() {
        let state = ServerState::test_primary();
        state.kv.set(Bytes::from_static(b"k"), Bytes::from_static(b"v"), None);
        let get = Get {
            key: Bytes::from_static(b"k"),
        };
        let (frame, _) = get.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::BulkString(Bytes::from_static(b"v")));
    }
}
