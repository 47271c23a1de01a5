// src/core/replication/handshake.rs

//! Connects to a configured primary, performs the four-step replication
//! handshake (`PING` / `REPLCONF listening-port` / `REPLCONF capa psync2` /
//! `PSYNC`), discards the `FULLRESYNC` RDB snapshot, and then runs the
//! ongoing command-stream apply loop for the lifetime of the connection.

use crate::core::command::Command;
use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, ParseCommand};
use crate::core::commands::generic::Replconf;
use crate::core::commands::helpers::extract_string;
use crate::core::errors::FerriteError;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::state::ServerState;
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;
use tracing::{info, warn};

const READ_CHUNK: usize = 8 * 1024;

async fn fill_more(buf: &mut BytesMut, stream: &mut TcpStream) -> Result<(), FerriteError> {
    let mut chunk = [0u8; READ_CHUNK];
    let n = stream.read(&mut chunk).await?;
    if n == 0 {
        return Err(FerriteError::ReplicationError(
            "primary closed the connection".to_string(),
        ));
    }
    buf.extend_from_slice(&chunk[..n]);
    Ok(())
}

async fn next_frame(
    codec: &mut RespFrameCodec,
    buf: &mut BytesMut,
    stream: &mut TcpStream,
) -> Result<RespFrame, FerriteError> {
    loop {
        if let Some(frame) = codec.decode(buf)? {
            return Ok(frame);
        }
        fill_more(buf, stream).await?;
    }
}

async fn send_command(stream: &mut TcpStream, parts: &[&[u8]]) -> Result<(), FerriteError> {
    let bytes = RespFrame::command(parts).encode_to_vec()?;
    stream.write_all(&bytes).await?;
    Ok(())
}

async fn expect_simple_string(
    codec: &mut RespFrameCodec,
    buf: &mut BytesMut,
    stream: &mut TcpStream,
) -> Result<String, FerriteError> {
    match next_frame(codec, buf, stream).await? {
        RespFrame::SimpleString(s) => Ok(s),
        RespFrame::Error(e) => Err(FerriteError::ReplicationError(e)),
        other => Err(FerriteError::ReplicationError(format!(
            "expected a simple string reply, got {other:?}"
        ))),
    }
}

/// Reads the `$<len>\r\n<bytes>` RDB bulk transfer that follows
/// `+FULLRESYNC`, with no trailing CRLF. The payload is discarded: the
/// primary always sends the same fixed empty snapshot regardless of its
/// actual keyspace, so there is nothing in it worth loading.
async fn read_and_discard_rdb_bulk(buf: &mut BytesMut, stream: &mut TcpStream) -> Result<(), FerriteError> {
    let header_end = loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            break pos;
        }
        fill_more(buf, stream).await?;
    };
    let header = buf.split_to(header_end);
    buf.advance(2); // the header's own CRLF

    if header.first() != Some(&b'$') {
        return Err(FerriteError::ReplicationError(
            "expected an RDB bulk header after FULLRESYNC".to_string(),
        ));
    }
    let len: usize = std::str::from_utf8(&header[1..])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| FerriteError::ReplicationError("malformed RDB bulk length".to_string()))?;

    while buf.len() < len {
        fill_more(buf, stream).await?;
    }
    buf.advance(len);
    Ok(())
}

/// Performs the handshake and hands back the live socket, positioned right
/// at the start of the primary's ongoing command stream, plus any bytes of
/// that stream already read ahead into `buf`.
async fn handshake(stream: &mut TcpStream, my_port: u16) -> Result<BytesMut, FerriteError> {
    let mut codec = RespFrameCodec;
    let mut buf = BytesMut::new();

    send_command(stream, &[b"PING"]).await?;
    let reply = expect_simple_string(&mut codec, &mut buf, stream).await?;
    if !reply.eq_ignore_ascii_case("PONG") {
        return Err(FerriteError::ReplicationError(format!(
            "unexpected reply to PING: {reply}"
        )));
    }

    let port_str = my_port.to_string();
    send_command(stream, &[b"REPLCONF", b"listening-port", port_str.as_bytes()]).await?;
    expect_simple_string(&mut codec, &mut buf, stream).await?;

    send_command(stream, &[b"REPLCONF", b"capa", b"psync2"]).await?;
    expect_simple_string(&mut codec, &mut buf, stream).await?;

    send_command(stream, &[b"PSYNC", b"?", b"-1"]).await?;
    let reply = expect_simple_string(&mut codec, &mut buf, stream).await?;
    if !reply.to_ascii_uppercase().starts_with("FULLRESYNC") {
        return Err(FerriteError::ReplicationError(format!(
            "expected FULLRESYNC, got {reply}"
        )));
    }
    info!(%reply, "received FULLRESYNC");

    read_and_discard_rdb_bulk(&mut buf, stream).await?;
    Ok(buf)
}

/// Splits a decoded command frame's array elements into a name and its
/// remaining arguments, mirroring the shape the client-facing dispatcher
/// expects.
fn split_command_frame(frame: RespFrame) -> Result<(String, Vec<RespFrame>), FerriteError> {
    match frame {
        RespFrame::Array(mut parts) if !parts.is_empty() => {
            let name = extract_string(&parts[0])?;
            let args = parts.split_off(1);
            Ok((name, args))
        }
        other => Err(FerriteError::ReplicationError(format!(
            "expected a command array on the replication stream, got {other:?}"
        ))),
    }
}

/// Applies the primary's ongoing command stream until the connection drops.
/// Only `SET` mutates state; `PING`/`ECHO` are keepalive-style no-ops on this
/// side; `REPLCONF GETACK *` triggers an immediate `REPLCONF ACK <offset>`
/// reply. Every other command is logged and ignored, since nothing else is
/// ever propagated.
async fn apply_stream(state: &Arc<ServerState>, mut stream: TcpStream, mut buf: BytesMut) -> Result<(), FerriteError> {
    let mut codec = RespFrameCodec;
    let role = match &state.role {
        crate::core::state::Role::Replica(r) => r,
        crate::core::state::Role::Primary(_) => {
            return Err(FerriteError::Internal(
                "apply_stream called on a primary-role server".to_string(),
            ))
        }
    };

    loop {
        let frame = next_frame(&mut codec, &mut buf, &mut stream).await?;
        let frame_len = frame.encode_to_vec()?.len() as u64;
        let (name, args) = split_command_frame(frame)?;

        match name.to_ascii_uppercase().as_str() {
            "PING" | "ECHO" => {}
            "SET" => {
                let cmd = Command::parse("SET", &args)?;
                if cmd.flags().contains(CommandFlags::WRITE) {
                    cmd.execute(state).await?;
                }
            }
            "REPLCONF" => {
                let replconf = Replconf::parse(&args)?;
                if replconf.is_getack() {
                    let offset = role.processed_offset() + frame_len;
                    let offset_str = offset.to_string();
                    send_command(&mut stream, &[b"REPLCONF", b"ACK", offset_str.as_bytes()]).await?;
                }
            }
            other => {
                warn!(command = %other, "ignoring unexpected command on the replication stream");
            }
        }

        role.add_processed_bytes(frame_len);
    }
}

/// Connects to the configured primary and performs the handshake,
/// returning the live socket positioned at the start of the ongoing command
/// stream. Any failure here is fatal to the caller: a server configured as
/// a replica that cannot reach or sync with its primary should not start.
pub async fn connect_and_handshake(
    primary_host: &str,
    primary_port: u16,
    my_port: u16,
) -> Result<(TcpStream, BytesMut), FerriteError> {
    let mut stream = TcpStream::connect((primary_host, primary_port))
        .await
        .map_err(FerriteError::from)?;
    info!(host = %primary_host, port = primary_port, "connecting to primary");

    let buf = handshake(&mut stream, my_port).await?;
    info!("replication handshake complete");
    Ok((stream, buf))
}

/// Runs the apply loop for the lifetime of the connection. Meant to be
/// spawned as a background task once the handshake has succeeded: a drop
/// partway through is logged and simply ends the task, since this server
/// does not attempt reconnection.
pub async fn run_apply_loop(state: Arc<ServerState>, stream: TcpStream, buf: BytesMut) {
    if let Err(e) = apply_stream(&state, stream, buf).await {
        warn!(error = %e, "replication stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::state::{Role, ReplicaRoleState};
    use tokio::io::AsyncReadExt as _;
    use tokio::net::TcpListener;

    fn replica_state(host: &str, port: u16) -> Arc<ServerState> {
        Arc::new(ServerState::new(
            Config {
                port: 0,
                dir: ".".to_string(),
                dbfilename: "dump.rdb".to_string(),
                replicaof: None,
            },
            Role::Replica(ReplicaRoleState::new(host.to_string(), port)),
        ))
    }

    /// Drives the primary side of the handshake against a raw socket,
    /// replying exactly as a real primary would, then sends a SET and a
    /// GETACK over the established stream.
    async fn act_as_primary(mut sock: TcpStream) {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::new();

        let _ping = next_frame(&mut codec, &mut buf, &mut sock).await.unwrap();
        sock.write_all(b"+PONG\r\n").await.unwrap();

        let _replconf1 = next_frame(&mut codec, &mut buf, &mut sock).await.unwrap();
        sock.write_all(b"+OK\r\n").await.unwrap();

        let _replconf2 = next_frame(&mut codec, &mut buf, &mut sock).await.unwrap();
        sock.write_all(b"+OK\r\n").await.unwrap();

        let _psync = next_frame(&mut codec, &mut buf, &mut sock).await.unwrap();
        sock.write_all(b"+FULLRESYNC abc 0\r\n").await.unwrap();
        sock.write_all(b"$5\r\nhello").await.unwrap();

        let set_frame = RespFrame::command(&[b"SET", b"foo", b"bar"]).encode_to_vec().unwrap();
        sock.write_all(&set_frame).await.unwrap();

        let getack_frame = RespFrame::command(&[b"REPLCONF", b"GETACK", b"*"]).encode_to_vec().unwrap();
        sock.write_all(&getack_frame).await.unwrap();

        let mut ack_buf = [0u8; 128];
        let n = sock.read(&mut ack_buf).await.unwrap();
        assert!(String::from_utf8_lossy(&ack_buf[..n]).to_uppercase().contains("ACK"));
    }

    #[tokio::test]
    async fn handshake_and_apply_loop_processes_a_propagated_set() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let primary_task = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            act_as_primary(sock).await;
        });

        let (stream, buf) = connect_and_handshake(&addr.ip().to_string(), addr.port(), 7000)
            .await
            .unwrap();

        let state = replica_state(&addr.ip().to_string(), addr.port());
        let state_for_loop = state.clone();
        let apply_task = tokio::spawn(async move {
            run_apply_loop(state_for_loop, stream, buf).await;
        });

        primary_task.await.unwrap();
        let _ = tokio::time::timeout(std::time::Duration::from_millis(500), apply_task).await;

        assert_eq!(state.kv.get(b"foo"), Some(bytes::Bytes::from_static(b"bar")));
    }
}
