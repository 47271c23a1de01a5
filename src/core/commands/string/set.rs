// src/core/commands/string/set.rs

use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, validate_min_arg_count, ArgParser};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Ex(u64),
    Px(u64),
    ExAt(u64),
    PxAt(u64),
}

#[derive(Debug, Clone)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    expiry: Option<Expiry>,
}

impl Set {
    fn expires_at(&self) -> Option<SystemTime> {
        self.expiry.map(|e| match e {
            Expiry::Ex(s) => SystemTime::now() + Duration::from_secs(s),
            Expiry::Px(ms) => SystemTime::now() + Duration::from_millis(ms),
            Expiry::ExAt(s) => UNIX_EPOCH + Duration::from_secs(s),
            Expiry::PxAt(ms) => UNIX_EPOCH + Duration::from_millis(ms),
        })
    }
}

impl ParseCommand for Set {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_min_arg_count(args, 2, "SET")?;
        let key = extract_bytes(&args[0])?;
        let value = extract_bytes(&args[1])?;

        let mut parser = ArgParser::new(&args[2..]);
        let mut expiry = None;
        if let Some(s) = parser.match_option::<u64>("EX")? {
            expiry = Some(Expiry::Ex(s));
        } else if let Some(ms) = parser.match_option::<u64>("PX")? {
            expiry = Some(Expiry::Px(ms));
        } else if let Some(s) = parser.match_option::<u64>("EXAT")? {
            expiry = Some(Expiry::ExAt(s));
        } else if let Some(ms) = parser.match_option::<u64>("PXAT")? {
            expiry = Some(Expiry::PxAt(ms));
        }

        if !parser.is_exhausted() {
            return Err(FerriteError::SyntaxError);
        }

        Ok(Set { key, value, expiry })
    }
}

#[async_trait]
impl ExecutableCommand for Set {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        state
            .kv
            .set(self.key.clone(), self.value.clone(), self.expires_at());
        Ok((RespFrame::SimpleString("OK".to_string()), WriteOutcome::Wrote))
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}
