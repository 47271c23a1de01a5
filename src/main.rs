// src/main.rs

//! The main entry point for the Ferrite server application.

use anyhow::Result;
use clap::Parser;
use ferrite::config::Config;
use ferrite::core::persistence::RdbLoader;
use ferrite::core::replication;
use ferrite::core::state::{PrimaryState, ReplicaRoleState, Role, ServerState};
use ferrite::server;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if let Err(e) = run_app().await {
        error!("fatal error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_app() -> Result<()> {
    let config = Config::parse();
    let replica_of = config.replica_of();
    let my_port = config.port;
    let rdb_path = config.rdb_path();

    let role = match &replica_of {
        Some((host, port)) => Role::Replica(ReplicaRoleState::new(host.clone(), *port)),
        None => Role::Primary(PrimaryState::new()),
    };

    let state = Arc::new(ServerState::new(config, role));

    if state.role.as_primary().is_some() {
        RdbLoader::load_into(&rdb_path, &state.kv).await?;
    }

    if let Some((host, port)) = replica_of {
        let (stream, buf) = replication::connect_and_handshake(&host, port, my_port).await?;
        info!(host = %host, port, "replicating from primary");
        let state_for_loop = state.clone();
        tokio::spawn(async move {
            replication::run_apply_loop(state_for_loop, stream, buf).await;
        });
    }

    server::run(state).await?;
    Ok(())
}
