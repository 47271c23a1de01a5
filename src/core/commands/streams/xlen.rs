// src/core/commands/streams/xlen.rs

//! `XLEN key`: not part of the distilled command surface but a natural
//! companion to the rest of the stream store, so it's included for
//! completeness alongside XADD/XRANGE/XREAD.

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct XLen {
    pub key: Bytes,
}

impl ParseCommand for XLen {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 1, "XLEN")?;
        Ok(XLen { key: extract_bytes(&args[0])? })
    }
}

#[async_trait]
impl ExecutableCommand for XLen {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let len = state.streams.len(&self.key).await;
        Ok((RespFrame::Integer(len as i64), WriteOutcome::DidNotWrite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{IdSpec, StreamId};
    use indexmap::IndexMap;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[tokio::test]
    async fn reports_entry_count() {
        let state = ServerState::test_primary();
        let key = Bytes::from_static(b"s");
        state
            .streams
            .xadd(&key, IdSpec::Full(StreamId::new(1, 0)), IndexMap::new())
            .await
            .unwrap();

        let cmd = XLen::parse(&[bulk("s")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Integer(1));
    }

    #[tokio::test]
    async fn missing_key_reports_zero() {
        let state = ServerState::test_primary();
        let cmd = XLen::parse(&[bulk("missing")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Integer(0));
    }
}
