// src/connection/session.rs

//! The per-connection read loop: decode one request frame, parse it into a
//! `Command`, dispatch it, and write back a reply — until the client
//! disconnects or `PSYNC` hands the connection off to replica-feed mode.

use super::dispatcher;
use crate::core::command::Command;
use crate::core::commands::helpers::extract_string;
use crate::core::errors::FerriteError;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::state::ServerState;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Splits a request's `RespFrame::Array` of bulk strings into a command name
/// and its remaining arguments.
fn split_request(frame: &RespFrame) -> Result<(String, Vec<RespFrame>), FerriteError> {
    match frame {
        RespFrame::Array(parts) if !parts.is_empty() => {
            let name = extract_string(&parts[0])?;
            Ok((name, parts[1..].to_vec()))
        }
        RespFrame::Array(_) => Err(FerriteError::SyntaxError),
        _ => Err(FerriteError::InvalidRequest(
            "expected a command as an array of bulk strings".to_string(),
        )),
    }
}

/// Drives a single accepted connection to completion.
pub async fn handle_connection(state: Arc<ServerState>, stream: TcpStream) {
    let mut framed = Framed::new(stream, RespFrameCodec);
    let mut listening_port: Option<u16> = None;

    loop {
        let frame = match framed.next().await {
            None => return,
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!(error = %e, "connection error while reading a frame");
                return;
            }
        };

        let (name, args) = match split_request(&frame) {
            Ok(v) => v,
            Err(e) => {
                if framed.send(RespFrame::Error(e.to_resp_message())).await.is_err() {
                    return;
                }
                continue;
            }
        };

        if name.eq_ignore_ascii_case("exit") {
            debug!("connection closed by client exit command");
            return;
        }

        let command = match Command::parse(&name, &args) {
            Ok(c) => c,
            Err(e) => {
                if framed.send(RespFrame::Error(e.to_resp_message())).await.is_err() {
                    return;
                }
                continue;
            }
        };

        debug!(command = command.name(), "dispatching command");

        if command.is_psync() {
            if let Err(e) = dispatcher::take_over_as_replica(&state, framed, listening_port).await {
                warn!(error = %e, "PSYNC handshake failed");
            }
            return;
        }

        match dispatcher::dispatch_ordinary(&state, command, frame, &mut listening_port).await {
            Ok(reply) => {
                if framed.send(reply).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                if framed.send(RespFrame::Error(e.to_resp_message())).await.is_err() {
                    return;
                }
            }
        }
    }
}
