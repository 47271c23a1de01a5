// src/core/commands/generic/mod.rs

mod echo;
mod info;
mod ping;
mod psync;
mod replconf;
mod type_cmd;

pub use echo::Echo;
pub use info::Info;
pub use ping::Ping;
pub use psync::Psync;
pub use replconf::Replconf;
pub use type_cmd::Type;
