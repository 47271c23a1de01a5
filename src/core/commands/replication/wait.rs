// src/core/commands/replication/wait.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_string, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5000);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct Wait {
    pub num_replicas: u64,
    pub timeout_ms: u64,
}

impl ParseCommand for Wait {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 2, "WAIT")?;
        Ok(Wait {
            num_replicas: extract_string(&args[0])?
                .parse()
                .map_err(|_| FerriteError::NotAnInteger)?,
            timeout_ms: extract_string(&args[1])?
                .parse()
                .map_err(|_| FerriteError::NotAnInteger)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Wait {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let Some(primary) = state.role.as_primary() else {
            return Err(FerriteError::Internal("WAIT issued against a replica".to_string()));
        };

        let replica_count = primary.replica_count();
        if replica_count == 0 || self.num_replicas == 0 {
            return Ok((RespFrame::Integer(replica_count as i64), WriteOutcome::DidNotWrite));
        }

        let last_was_mutation = state
            .command_history
            .lock()
            .await
            .last()
            .map(|name| name == "SET")
            .unwrap_or(false);
        if !last_was_mutation {
            return Ok((RespFrame::Integer(replica_count as i64), WriteOutcome::DidNotWrite));
        }

        let timeout = if self.timeout_ms == 0 {
            DEFAULT_WAIT_TIMEOUT
        } else {
            Duration::from_millis(self.timeout_ms)
        };

        let baseline = primary.replica_ack_offsets();
        let getack = RespFrame::command(&[b"REPLCONF", b"GETACK", b"*"])
            .encode_to_vec()
            .map(bytes::Bytes::from)?;
        primary.propagate(getack);

        let deadline = Instant::now() + timeout;
        let acked = loop {
            let current = primary.replica_ack_offsets();
            let acked = current
                .iter()
                .filter(|(id, offset)| {
                    baseline
                        .iter()
                        .find(|(bid, _)| bid == id)
                        .is_some_and(|(_, base_offset)| offset > base_offset)
                })
                .count();

            if acked as u64 >= self.num_replicas || Instant::now() >= deadline {
                break acked;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        Ok((RespFrame::Integer(acked as i64), WriteOutcome::DidNotWrite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[tokio::test]
    async fn wait_with_no_replicas_returns_zero_immediately() {
        let state = ServerState::test_primary();
        let wait = Wait::parse(&[bulk("2"), bulk("100")]).unwrap();
        let (frame, _) = wait.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Integer(0));
    }

    #[tokio::test]
    async fn wait_returns_replica_count_when_last_command_was_not_a_mutation() {
        let state = ServerState::test_primary();
        let primary = state.role.as_primary().unwrap();
        let (_id, _rx, _ack) = primary.register_replica(6380);
        state.command_history.lock().await.push("GET");

        let wait = Wait::parse(&[bulk("1"), bulk("100")]).unwrap();
        let (frame, _) = wait.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Integer(1));
    }

    #[tokio::test]
    async fn wait_counts_replica_that_acks_before_deadline() {
        let state = ServerState::test_primary();
        let primary = state.role.as_primary().unwrap();
        let (_id, mut rx, ack_offset) = primary.register_replica(6380);
        state.command_history.lock().await.push("SET");

        let acker = tokio::spawn(async move {
            // Wait for the GETACK frame, then simulate the replica's reply.
            rx.recv().await;
            ack_offset.fetch_add(37, std::sync::atomic::Ordering::SeqCst);
        });

        let wait = Wait::parse(&[bulk("1"), bulk("500")]).unwrap();
        let (frame, _) = wait.execute(&state).await.unwrap();
        acker.await.unwrap();
        assert_eq!(frame, RespFrame::Integer(1));
    }
}
