// src/core/commands/helpers.rs

//! Helpers for parsing command arguments out of `RespFrame`s, shared across
//! every command's `ParseCommand::parse`.

use crate::core::errors::FerriteError;
use crate::core::protocol::RespFrame;
use bytes::Bytes;
use std::str::FromStr;

/// Extracts a UTF-8 `String` from a `RespFrame::BulkString`. Commands only
/// ever receive bulk strings as arguments; anything else is a protocol
/// violation rather than a `WrongType` data error.
pub fn extract_string(frame: &RespFrame) -> Result<String, FerriteError> {
    match frame {
        RespFrame::BulkString(bytes) => {
            String::from_utf8(bytes.to_vec()).map_err(|_| FerriteError::SyntaxError)
        }
        _ => Err(FerriteError::SyntaxError),
    }
}

/// Extracts raw `Bytes` from a `RespFrame::BulkString`.
pub fn extract_bytes(frame: &RespFrame) -> Result<Bytes, FerriteError> {
    match frame {
        RespFrame::BulkString(bytes) => Ok(bytes.clone()),
        _ => Err(FerriteError::SyntaxError),
    }
}

/// Validates that a command received exactly `expected` arguments.
pub fn validate_arg_count(
    args: &[RespFrame],
    expected: usize,
    cmd: &str,
) -> Result<(), FerriteError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(FerriteError::WrongArgumentCount(cmd.to_string()))
    }
}

/// Validates that a command received at least `min` arguments.
pub fn validate_min_arg_count(
    args: &[RespFrame],
    min: usize,
    cmd: &str,
) -> Result<(), FerriteError> {
    if args.len() >= min {
        Ok(())
    } else {
        Err(FerriteError::WrongArgumentCount(cmd.to_string()))
    }
}

/// A small cursor over a command's trailing optional arguments (flags and
/// `OPTION value` pairs), used by `SET`'s `EX|PX|EXAT|PXAT` options.
pub struct ArgParser<'a> {
    args: &'a [RespFrame],
    cursor: usize,
}

impl<'a> ArgParser<'a> {
    pub fn new(args: &'a [RespFrame]) -> Self {
        Self { args, cursor: 0 }
    }

    fn peek_str(&self) -> Option<String> {
        self.args.get(self.cursor).and_then(|f| extract_string(f).ok())
    }

    /// If the next argument matches `name` case-insensitively, consumes it
    /// and the following value argument, parsing it as `T`.
    pub fn match_option<T: FromStr>(&mut self, name: &str) -> Result<Option<T>, FerriteError> {
        match self.peek_str() {
            Some(s) if s.eq_ignore_ascii_case(name) => {
                let value_frame = self
                    .args
                    .get(self.cursor + 1)
                    .ok_or(FerriteError::SyntaxError)?;
                let value = extract_string(value_frame)?
                    .parse::<T>()
                    .map_err(|_| FerriteError::SyntaxError)?;
                self.cursor += 2;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.args.len()
    }
}
