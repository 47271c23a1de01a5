// src/server/mod.rs

//! The TCP accept loop: binds the configured port and spawns one task per
//! accepted connection.

use crate::connection::handle_connection;
use crate::core::errors::FerriteError;
use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub async fn run(state: Arc<ServerState>) -> Result<(), FerriteError> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&addr).await.map_err(FerriteError::from)?;
    info!(%addr, "listening for connections");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to accept a connection");
                continue;
            }
        };
        debug!(%peer, "accepted connection");
        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(state, stream).await;
        });
    }
}
