// src/core/commands/generic/replconf.rs

//! `REPLCONF` carries several unrelated subcommands used only during and
//! after the replication handshake (`listening-port`, `capa`, `GETACK`,
//! `ACK`). It has connection-level side effects (updating replica state,
//! or triggering an immediate ACK reply) that don't fit the ordinary
//! `ExecutableCommand` model, so it is parsed here but dispatched specially
//! by the connection layer.

use crate::core::commands::command_trait::ParseCommand;
use crate::core::commands::helpers::{extract_string, validate_min_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;

#[derive(Debug, Clone)]
pub struct Replconf {
    pub args: Vec<String>,
}

impl ParseCommand for Replconf {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_min_arg_count(args, 1, "REPLCONF")?;
        let args = args.iter().map(extract_string).collect::<Result<Vec<_>, _>>()?;
        Ok(Replconf { args })
    }
}

impl Replconf {
    /// The listening port advertised by `REPLCONF listening-port <port>`.
    pub fn listening_port(&self) -> Option<u16> {
        if self.args.len() == 2 && self.args[0].eq_ignore_ascii_case("listening-port") {
            self.args[1].parse().ok()
        } else {
            None
        }
    }

    pub fn is_getack(&self) -> bool {
        self.args.len() == 2 && self.args[0].eq_ignore_ascii_case("getack")
    }

    /// The offset reported by a replica's `REPLCONF ACK <offset>`.
    pub fn ack_offset(&self) -> Option<u64> {
        if self.args.len() == 2 && self.args[0].eq_ignore_ascii_case("ack") {
            self.args[1].parse().ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn parses_listening_port() {
        let r = Replconf::parse(&[bulk("listening-port"), bulk("6380")]).unwrap();
        assert_eq!(r.listening_port(), Some(6380));
    }

    #[test]
    fn recognizes_getack_star() {
        let r = Replconf::parse(&[bulk("GETACK"), bulk("*")]).unwrap();
        assert!(r.is_getack());
    }

    #[test]
    fn parses_ack_offset() {
        let r = Replconf::parse(&[bulk("ACK"), bulk("42")]).unwrap();
        assert_eq!(r.ack_offset(), Some(42));
    }
}
