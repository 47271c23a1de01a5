// src/connection/dispatcher.rs

//! Routes a single parsed command against shared state: ordinary commands
//! go through `ExecutableCommand::execute`, with a successful `SET`
//! propagated to attached replicas; `REPLCONF` is handled directly since it
//! only ever mutates connection-local state. `PSYNC` is handled separately
//! by `take_over_as_replica`, since it consumes the connection outright.

use crate::core::command::Command;
use crate::core::commands::command_trait::{ExecutableCommand, WriteOutcome};
use crate::core::errors::FerriteError;
use crate::core::protocol::{encode_rdb_bulk, RespFrame, RespFrameCodec};
use crate::core::state::{ServerState, EMPTY_RDB_HEX, REPL_ID};
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Framed};
use tracing::{info, warn};

/// Dispatches every command except `PSYNC`. `REPLCONF` replies `+OK` and
/// records the advertised listening port for a PSYNC that may follow on the
/// same connection; everything else runs through `ExecutableCommand`.
pub async fn dispatch_ordinary(
    state: &Arc<ServerState>,
    command: Command,
    raw_frame: RespFrame,
    listening_port: &mut Option<u16>,
) -> Result<RespFrame, FerriteError> {
    if let Command::Replconf(r) = &command {
        if let Some(port) = r.listening_port() {
            *listening_port = Some(port);
        }
        return Ok(RespFrame::SimpleString("OK".to_string()));
    }

    if command.requires_primary_role() && state.role.as_primary().is_none() {
        return Err(FerriteError::ReplicationError(
            "this command is only available on a primary".to_string(),
        ));
    }

    let (reply, outcome) = command.execute(state).await?;

    state.command_history.lock().await.push(command.name());

    if outcome == WriteOutcome::Wrote {
        if let Some(primary) = state.role.as_primary() {
            let bytes = Bytes::from(raw_frame.encode_to_vec()?);
            primary.propagate(bytes);
        }
    }

    Ok(reply)
}

/// Writes `+FULLRESYNC`, the fixed empty RDB snapshot, and then splits the
/// connection: a spawned reader task watches for `REPLCONF ACK`, while this
/// task drains the replica's propagation outbox onto the write half until
/// either side gives up. Consumes `framed`: once a connection becomes a
/// replica's feed, it never goes back to ordinary command dispatch.
pub async fn take_over_as_replica(
    state: &Arc<ServerState>,
    framed: Framed<TcpStream, RespFrameCodec>,
    listening_port: Option<u16>,
) -> Result<(), FerriteError> {
    let primary = state.role.as_primary().ok_or_else(|| {
        FerriteError::ReplicationError("PSYNC is only valid against a primary".to_string())
    })?;
    let listening_port = listening_port.ok_or_else(|| {
        FerriteError::ReplicationError("PSYNC received before REPLCONF listening-port".to_string())
    })?;

    let rdb_bytes = hex::decode(EMPTY_RDB_HEX)
        .map_err(|e| FerriteError::Internal(format!("invalid empty RDB literal: {e}")))?;

    let mut parts = framed.into_parts();
    let header = format!("+FULLRESYNC {REPL_ID} 0\r\n");
    parts.io.write_all(header.as_bytes()).await?;
    parts.io.write_all(&encode_rdb_bulk(&rdb_bytes)).await?;

    let (replica_id, mut outbox, ack_offset) = primary.register_replica(listening_port);
    info!(replica_id, listening_port, "replica attached via PSYNC");

    let (mut read_half, mut write_half) = tokio::io::split(parts.io);
    let leftover = parts.read_buf;

    tokio::spawn(async move {
        watch_for_acks(leftover, &mut read_half, ack_offset).await;
    });

    while let Some(frame) = outbox.recv().await {
        if write_half.write_all(&frame).await.is_err() {
            break;
        }
    }
    primary.deregister_replica(replica_id);
    info!(replica_id, "replica detached");
    Ok(())
}

/// Watches a replica's half of its PSYNC connection for `REPLCONF ACK
/// <offset>` frames, updating the shared offset the primary's `WAIT` polls.
/// Any other frame (there shouldn't be any) or a parse error ends the task.
async fn watch_for_acks(
    mut buf: BytesMut,
    read_half: &mut (impl tokio::io::AsyncRead + Unpin),
    ack_offset: Arc<AtomicU64>,
) {
    let mut codec = RespFrameCodec;
    loop {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(RespFrame::Array(mut parts))) if !parts.is_empty() => {
                    let name = crate::core::commands::helpers::extract_string(&parts[0]);
                    if name.is_ok_and(|n| n.eq_ignore_ascii_case("REPLCONF")) {
                        if let Ok(replconf) = crate::core::commands::generic::Replconf::parse(&parts.split_off(1)) {
                            if let Some(offset) = replconf.ack_offset() {
                                ack_offset.store(offset, Ordering::SeqCst);
                            }
                        }
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "malformed frame on a replica's ack channel");
                    return;
                }
            }
        }
        let mut chunk = [0u8; 4096];
        match read_half.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
