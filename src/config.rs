// src/config.rs

//! Server configuration, parsed from command-line flags.

use clap::Parser;

/// Ferrite: a Redis-compatible in-memory data server.
#[derive(Parser, Debug, Clone)]
#[command(name = "ferrite", about = "A Redis-compatible in-memory data server", version)]
pub struct Config {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 6379)]
    pub port: u16,

    /// Directory the RDB file is loaded from at startup.
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Name of the RDB file to load at startup, relative to `--dir`.
    #[arg(long, default_value = "dump.rdb")]
    pub dbfilename: String,

    /// `<host> <port>` of the primary to replicate from. Absent means this
    /// server starts as a primary.
    #[arg(long, num_args = 2, value_names = ["HOST", "PORT"])]
    pub replicaof: Option<Vec<String>>,
}

impl Config {
    /// The role implied by `--replicaof`, resolved once at startup.
    pub fn replica_of(&self) -> Option<(String, u16)> {
        let parts = self.replicaof.as_ref()?;
        let host = parts.first()?.clone();
        let port = parts.get(1)?.parse().ok()?;
        Some((host, port))
    }

    pub fn rdb_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.dir).join(&self.dbfilename)
    }
}
