// src/core/protocol/resp_frame.rs

//! Implements the RESP (REdis Serialization Protocol) frame structure and the
//! corresponding `Encoder`/`Decoder` pair used to drive every client
//! connection's byte stream.

use crate::core::errors::FerriteError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

// Protocol-level limits, guarding against a malicious or malformed frame
// forcing an unbounded allocation before we even know the frame is garbage.
const MAX_FRAME_ELEMENTS: usize = 1_024 * 1_024;
const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024;

/// A single frame in the RESP protocol. This is the wire-level representation;
/// command parsing builds higher-level `Command` values on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
}

impl RespFrame {
    /// Encodes this frame to an owned byte vector. Used by the replication
    /// path, which needs complete byte vectors to propagate to replicas and
    /// to compute byte offsets.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, FerriteError> {
        let mut buf = BytesMut::new();
        RespFrameCodec.encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Builds the array-of-bulk-strings frame used for every command request
    /// and for propagated command frames (`*N\r\n$len\r\n...`).
    pub fn command(parts: &[&[u8]]) -> RespFrame {
        RespFrame::Array(
            parts
                .iter()
                .map(|p| RespFrame::BulkString(Bytes::copy_from_slice(p)))
                .collect(),
        )
    }
}

/// A `tokio_util::codec` implementation for encoding and decoding `RespFrame`s.
#[derive(Debug, Default)]
pub struct RespFrameCodec;

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = FerriteError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            RespFrame::SimpleString(s) => {
                dst.extend_from_slice(b"+");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Error(s) => {
                dst.extend_from_slice(b"-");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Integer(i) => {
                dst.extend_from_slice(b":");
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::BulkString(b) => {
                dst.extend_from_slice(b"$");
                dst.extend_from_slice(b.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Null => {
                dst.extend_from_slice(b"$-1\r\n");
            }
            RespFrame::NullArray => {
                dst.extend_from_slice(b"*-1\r\n");
            }
            RespFrame::Array(arr) => {
                dst.extend_from_slice(b"*");
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    self.encode(frame, dst)?;
                }
            }
        }
        Ok(())
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = FerriteError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_frame(src) {
            Ok((frame, len)) => {
                src.advance(len);
                Ok(Some(frame))
            }
            Err(FerriteError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Encodes the length-prefixed bulk envelope used to transfer the RDB
/// snapshot after a `+FULLRESYNC` reply, per `spec.md` §4.1: the `$<len>\r\n`
/// header is sent, followed by the raw bytes, but the trailing CRLF a normal
/// bulk string frame would carry is suppressed.
pub fn encode_rdb_bulk(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(b"$");
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.extend_from_slice(CRLF);
    out.extend_from_slice(payload);
    out
}

/// The main parsing entry point. Inspects the first byte (the type prefix)
/// and dispatches to the appropriate parser. Returns the parsed frame and the
/// number of bytes it consumed from `src`.
fn parse_frame(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    if src.is_empty() {
        return Err(FerriteError::IncompleteData);
    }
    match src[0] {
        b'+' => parse_simple_string(src),
        b'-' => parse_error(src),
        b':' => parse_integer(src),
        b'$' => parse_bulk_string(src),
        b'*' => parse_array(src),
        _ => Err(FerriteError::SyntaxError),
    }
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|window| window == CRLF)
}

fn parse_line(src: &[u8]) -> Result<(&[u8], usize), FerriteError> {
    find_crlf(src)
        .map(|pos| (&src[..pos], pos + CRLF_LEN))
        .ok_or(FerriteError::IncompleteData)
}

fn parse_simple_string(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::SimpleString(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

fn parse_error(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::Error(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

fn parse_integer(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    let (line, len) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| FerriteError::SyntaxError)?;
    let i = s.parse::<i64>().map_err(|_| FerriteError::SyntaxError)?;
    Ok((RespFrame::Integer(i), len + 1))
}

fn parse_bulk_string(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| FerriteError::SyntaxError)?;
    let str_len = s.parse::<isize>().map_err(|_| FerriteError::SyntaxError)?;

    if str_len == -1 {
        return Ok((RespFrame::Null, len_of_line + 1));
    }
    if str_len < -1 {
        return Err(FerriteError::SyntaxError);
    }

    let str_len = str_len as usize;
    if str_len > MAX_BULK_STRING_SIZE {
        return Err(FerriteError::SyntaxError);
    }

    let total_len_prefix = len_of_line + 1;
    if src.len() < total_len_prefix + str_len + CRLF_LEN {
        return Err(FerriteError::IncompleteData);
    }
    if &src[total_len_prefix + str_len..total_len_prefix + str_len + CRLF_LEN] != CRLF {
        return Err(FerriteError::SyntaxError);
    }

    let data_start = total_len_prefix;
    let data_end = total_len_prefix + str_len;
    let data = Bytes::copy_from_slice(&src[data_start..data_end]);
    Ok((RespFrame::BulkString(data), data_end + CRLF_LEN))
}

fn parse_array(src: &[u8]) -> Result<(RespFrame, usize), FerriteError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| FerriteError::SyntaxError)?;
    let arr_len = s.parse::<isize>().map_err(|_| FerriteError::SyntaxError)?;

    if arr_len == -1 {
        return Ok((RespFrame::NullArray, len_of_line + 1));
    }
    if arr_len < -1 {
        return Err(FerriteError::SyntaxError);
    }

    let arr_len = arr_len as usize;
    if arr_len > MAX_FRAME_ELEMENTS {
        return Err(FerriteError::SyntaxError);
    }

    let mut frames = Vec::with_capacity(arr_len.min(4096));
    let mut cursor = len_of_line + 1;

    for _ in 0..arr_len {
        let (frame, frame_len) = parse_frame(&src[cursor..])?;
        frames.push(frame);
        cursor += frame_len;
    }

    Ok((RespFrame::Array(frames), cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> RespFrame {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(bytes);
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn decodes_ping_array() {
        let frame = decode_one(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(
            frame,
            RespFrame::Array(vec![RespFrame::BulkString(Bytes::from_static(b"PING"))])
        );
    }

    #[test]
    fn encodes_simple_string() {
        let bytes = RespFrame::SimpleString("PONG".into()).encode_to_vec().unwrap();
        assert_eq!(bytes, b"+PONG\r\n");
    }

    #[test]
    fn encodes_null_bulk() {
        let bytes = RespFrame::Null.encode_to_vec().unwrap();
        assert_eq!(bytes, b"$-1\r\n");
    }

    #[test]
    fn roundtrips_bulk_string_binary_safe() {
        let payload = Bytes::from_static(b"foo\r\nbar");
        let frame = RespFrame::BulkString(payload.clone());
        let encoded = frame.encode_to_vec().unwrap();
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decoder_waits_for_split_frame() {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"$3\r\nfoo\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame,
            RespFrame::Array(vec![
                RespFrame::BulkString(Bytes::from_static(b"GET")),
                RespFrame::BulkString(Bytes::from_static(b"foo")),
            ])
        );
    }

    #[test]
    fn decoder_handles_two_commands_in_one_read() {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&b"+OK\r\n+OK\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            RespFrame::SimpleString("OK".into())
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            RespFrame::SimpleString("OK".into())
        );
    }

    #[test]
    fn rejects_negative_non_null_length() {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&b"$-2\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FerriteError::SyntaxError)
        ));
    }

    #[test]
    fn rdb_bulk_suppresses_trailing_crlf() {
        let payload = b"REDIS0011garbage";
        let encoded = encode_rdb_bulk(payload);
        assert_eq!(encoded, b"$16\r\nREDIS0011garbage".to_vec());
    }
}
