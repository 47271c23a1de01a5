// src/core/commands/streams/xrange.rs

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_arg_count};
use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use crate::core::state::ServerState;
use crate::core::storage::{StreamEntry, StreamId};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct XRange {
    pub key: Bytes,
    pub start: Bytes,
    pub end: Bytes,
}

impl ParseCommand for XRange {
    fn parse(args: &[RespFrame]) -> Result<Self, FerriteError> {
        validate_arg_count(args, 3, "XRANGE")?;
        Ok(XRange {
            key: extract_bytes(&args[0])?,
            start: Bytes::from(extract_string(&args[1])?),
            end: Bytes::from(extract_string(&args[2])?),
        })
    }
}

/// Resolves a `XRANGE` bound: `-` is the smallest possible ID, `+` the
/// largest; a bare `MS` (no `-SEQ`) defaults its missing sequence to 0 on
/// both ends, per `spec.md` §4.3.
fn resolve_bound(raw: &Bytes) -> Result<StreamId, FerriteError> {
    let s = std::str::from_utf8(raw).map_err(|_| FerriteError::SyntaxError)?;
    match s {
        "-" => Ok(StreamId::MIN),
        "+" => Ok(StreamId::MAX),
        _ => {
            if s.contains('-') {
                s.parse()
            } else {
                let ms: u64 = s.parse().map_err(|_| FerriteError::SyntaxError)?;
                Ok(StreamId::new(ms, 0))
            }
        }
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

#[async_trait]
impl ExecutableCommand for XRange {
    async fn execute(&self, state: &ServerState) -> Result<(RespFrame, WriteOutcome), FerriteError> {
        let start = resolve_bound(&self.start)?;
        let end = resolve_bound(&self.end)?;

        let entries = state.streams.xrange(&self.key, start, end).await;
        if entries.is_empty() {
            return Ok((RespFrame::Null, WriteOutcome::DidNotWrite));
        }

        let frame = RespFrame::Array(entries.iter().map(entry_to_frame).collect());
        Ok((frame, WriteOutcome::DidNotWrite))
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

    fn fields(pairs: &[(&str, &str)]) -> IndexMap<Bytes, Bytes> {
        pairs
            .iter()
            .map(|(k, v)| (Bytes::copy_from_slice(k.as_bytes()), Bytes::copy_from_slice(v.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn dash_and_plus_bounds_cover_the_whole_stream() {
        let state = ServerState::test_primary();
        let key = Bytes::from_static(b"s");
        for i in 1..=3u64 {
            state
                .streams
                .xadd(&key, IdSpec::Full(StreamId::new(i, 0)), fields(&[("a", "1")]))
                .await
                .unwrap();
        }

        let cmd = XRange::parse(&[bulk("s"), bulk("-"), bulk("+")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        let RespFrame::Array(entries) = frame else { panic!("expected array") };
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn empty_result_returns_null_bulk() {
        let state = ServerState::test_primary();
        let cmd = XRange::parse(&[bulk("missing"), bulk("-"), bulk("+")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Null);
    }

    #[tokio::test]
    async fn bare_ms_bounds_default_their_missing_sequence_to_zero() {
        // `spec.md` §4.3: a missing end-sequence defaults to 0, not to the
        // largest sequence seen for that millisecond, so `5` as an end bound
        // only reaches 5-0 and an entry at 5-3 falls outside the range.
        let state = ServerState::test_primary();
        let key = Bytes::from_static(b"s");
        state
            .streams
            .xadd(&key, IdSpec::Full(StreamId::new(5, 3)), fields(&[("a", "1")]))
            .await
            .unwrap();

        let cmd = XRange::parse(&[bulk("s"), bulk("5"), bulk("5")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        assert_eq!(frame, RespFrame::Null);
    }

    #[tokio::test]
    async fn bare_ms_start_bound_includes_entries_at_that_millisecond() {
        let state = ServerState::test_primary();
        let key = Bytes::from_static(b"s");
        state
            .streams
            .xadd(&key, IdSpec::Full(StreamId::new(5, 3)), fields(&[("a", "1")]))
            .await
            .unwrap();

        let cmd = XRange::parse(&[bulk("s"), bulk("5"), bulk("+")]).unwrap();
        let (frame, _) = cmd.execute(&state).await.unwrap();
        let RespFrame::Array(entries) = frame else { panic!("expected array") };
        assert_eq!(entries.len(), 1);
    }
}
