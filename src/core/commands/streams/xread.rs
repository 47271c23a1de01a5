// src/core/commands/streams/xread.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use crate::core::storage::{StreamEntry, StreamId};
use crate::core::stream_blocking::{block_on_streams, DEFAULT_BLOCK_TIMEOUT};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// One key paired with the ID spec a client supplied for it. `$` defers
/// resolution to just before blocking begins, per `spec.md` §4.3.
#[derive(Debug, Clone)]
enum IdArg {
    Literal(StreamId),
    LastId,
}

#[derive(Debug, Clone)]
pub struct XRead {
    pub block_ms: Option<u64>,
    keys: Vec<Bytes>,
    ids: Vec<IdArg>,
}

impl ParseCommand for XRead {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        let mut cursor = 0;
        let mut block_ms = None;

        if args
            .get(cursor)
            .map(extract_string)
            .transpose()?
            .is_some_and(|s| s.eq_ignore_ascii_case("block"))
        {
            let ms = args
                .get(cursor + 1)
                .map(extract_string)
                .transpose()?
                .ok_or(FerriteError::SyntaxError)?;
            block_ms = Some(ms.parse().map_err(|_| FerriteError::NotAnInteger)?);
            cursor += 2;
        }

        let streams_kw = args
            .get(cursor)
            .map(extract_string)
            .transpose()?
            .filter(|s| s.eq_ignore_ascii_case("streams"))
            .ok_or(FerriteError::SyntaxError)?;
        let _ = streams_kw;
        cursor += 1;

        let rest = &args[cursor..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(FerriteError::SyntaxError);
        }
        let half = rest.len() / 2;
        let keys = rest[..half]
            .iter()
            .map(extract_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let ids = rest[half..]
            .iter()
            .map(extract_string)
            .map(|r| {
                r.and_then(|s| {
                    if s == "$" {
                        Ok(IdArg::LastId)
                    } else {
                        s.parse::<StreamId>().map(IdArg::Literal)
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(XRead { block_ms, keys, ids })
    }
}

fn entry_to_frame(entry: &StreamEntry) -> RespFrame {
    let mut flat = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in &entry.fields {
        flat.push(RespFrame::BulkString(field.clone()));
        flat.push(RespFrame::BulkString(value.clone()));
    }
    RespFrame::Array(vec![
        RespFrame::BulkString(Bytes::from(entry.id.to_string())),
        RespFrame::Array(flat),
    ])
}

fn build_reply(results: Vec<(Bytes, Vec<StreamEntry>)>) -> RespFrame {
    if results.is_empty() {
        return RespFrame::Null;
    }
    RespFrame::Array(
        results
            .into_iter()
            .map(|(key, entries)| {
                RespFrame::Array(vec![
                    RespFrame::BulkString(key),
                    RespFrame::Array(entries.iter().map(entry_to_frame).collect()),
                ])
            })
            .collect(),
    )
}

#[async_trait]
impl ExecutableCommand for XRead {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let mut resolved = Vec::with_capacity(self.keys.len());
        for (key, id_arg) in self.keys.iter().zip(self.ids.iter()) {
            let after = match id_arg {
                IdArg::Literal(id) => *id,
                IdArg::LastId => state.streams.last_id(key).await,
            };
            resolved.push((key.clone(), after));
        }

        let results = match self.block_ms {
            None => {
                let mut found = Vec::new();
                for (key, after) in &resolved {
                    let entries = state.streams.read_after(key, *after).await;
                    if !entries.is_empty() {
                        found.push((key.clone(), entries));
                    }
                }
                found
            }
            Some(ms) => {
                let timeout = if ms == 0 { DEFAULT_BLOCK_TIMEOUT } else { Duration::from_millis(ms) };
                block_on_streams(&state.pubsub, &state.streams, &resolved, timeout).await
            }
        };

        Ok((build_reply(results), WriteOutcome::DidNotWrite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::IdSpec;
    use indexmap::IndexMap;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    fn fields() -> IndexMap<Bytes, Bytes> {
        let mut m = IndexMap::new();
        m.insert(Bytes::from_static(b"field"), Bytes::from_static(b"value"));
        m
    }

    #[test]
    fn parses_single_stream_without_block() {
        let cmd = XRead::parse(&[bulk("STREAMS"), bulk("s"), bulk("0")]).unwrap();
        assert!(cmd.block_ms.is_none());
        assert_eq!(cmd.keys, vec![Bytes::from_static(b"s")]);
    }

    #[test]
    fn parses_block_option_and_dollar_sentinel() {
        let cmd = XRead::parse(&[bulk("BLOCK"), bulk("100"), bulk("STREAMS"), bulk("s"), bulk("$")]).unwrap();
        assert_eq!(cmd.block_ms, Some(100));
        assert!(matches!(cmd.ids[0], IdArg::LastId));
    }

    #[test]
    fn rejects_mismatched_key_id_pairing() {
        let args = [bulk("STREAMS"), bulk("a"), bulk("b"), bulk("0")];
        assert!(XRead::parse(&args).is_err());
    }

    #[tokio::test]
    async fn non_blocking_read_returns_entries_strictly_after_id() {
        let state = ServerState::test_primary();
        let key = Bytes::from_static(b"s");
        state.streams.xadd(&key, IdSpec::Full(StreamId::new(1, 0)), fields()).await.unwrap();
        state.streams.xadd(&key, IdSpec::Full(StreamId::new(2, 0)), fields()).await.unwrap();

        let cmd = XRead::parse(&[bulk("STREAMS"), bulk("s"), bulk("1-0")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        let RespFrame::Array(streams) = frame else { panic!("expected array") };
        assert_eq!(streams.len(), 1);
    }

    #[tokio::test]
    async fn empty_result_returns_null_bulk() {
        let state = ServerState::test_primary();
        let cmd = XRead::parse(&[bulk("STREAMS"), bulk("missing"), bulk("0")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Null);
    }
}
