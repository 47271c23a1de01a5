// src/core/commands/streams/xadd.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_min_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use crate::core::storage::IdSpec;
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct XAdd {
    pub key: Bytes,
    pub id_spec: IdSpec,
    pub fields: IndexMap<Bytes, Bytes>,
}

impl ParseCommand for XAdd {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_min_arg_count(args, 4, "XADD")?;
        let key = extract_bytes(&args[0])?;
        let id_spec = IdSpec::parse(&extract_string(&args[1])?)?;

        let rest = &args[2..];
        if rest.len() % 2 != 0 {
            return Err(FerriteError::WrongArgumentCount("XADD".to_string()));
        }

        let mut fields = IndexMap::new();
        for pair in rest.chunks_exact(2) {
            fields.insert(extract_bytes(&pair[0])?, extract_bytes(&pair[1])?);
        }

        Ok(XAdd { key, id_spec, fields })
    }
}

#[async_trait]
impl ExecutableCommand for XAdd {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let id = state
            .streams
            .xadd(&self.key, self.id_spec, self.fields.clone())
            .await?;
        state.pubsub.publish(self.key.clone()).await;
        Ok((
            RespFrame::BulkString(Bytes::from(id.to_string())),
            WriteOutcome::DidNotWrite,
        ))
    }
}
