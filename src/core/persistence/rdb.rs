// src/core/persistence/rdb.rs

//! Loading a classic-format RDB snapshot into the key/value store at
//! startup. Only string values are represented in the data model this
//! server supports, so any other value type is skipped rather than decoded.

use crate::core::errors::FerriteError;
use crate::core::storage::KvStore;
use bytes::{Buf, Bytes};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

const OP_EXPIRETIME_MS: u8 = 0xFC;
const OP_EXPIRETIME: u8 = 0xFD;
const OP_SELECTDB: u8 = 0xFE;
const OP_RESIZEDB: u8 = 0xFB;
const OP_EOF: u8 = 0xFF;

const VALUE_TYPE_STRING: u8 = 0x00;

const MAX_METADATA_SCAN_BYTES: usize = 1024;

/// The result of reading a length-encoded field: either an honest length to
/// read further bytes for, or a value that was itself stored inline as one
/// of the three special integer subtypes. Kept as two separate variants
/// (rather than collapsing the integer case into a length, as the original
/// implementation this loader is modeled on does) since the two cases have
/// to be handled completely differently by every caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Len(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
}

fn read_length(cursor: &mut Bytes) -> Result<Length, FerriteError> {
    if !cursor.has_remaining() {
        return Err(FerriteError::RdbParseError("unexpected end of file reading a length".into()));
    }
    let first = cursor.get_u8();
    match first >> 6 {
        0b00 => Ok(Length::Len((first & 0x3F) as u64)),
        0b01 => {
            if cursor.remaining() < 1 {
                return Err(FerriteError::RdbParseError("truncated 14-bit length".into()));
            }
            let second = cursor.get_u8();
            Ok(Length::Len((((first & 0x3F) as u64) << 8) | second as u64))
        }
        0b10 => {
            if cursor.remaining() < 4 {
                return Err(FerriteError::RdbParseError("truncated 32-bit length".into()));
            }
            Ok(Length::Len(cursor.get_u32() as u64))
        }
        _ => match first & 0x3F {
            0 => {
                if cursor.remaining() < 1 {
                    return Err(FerriteError::RdbParseError("truncated int8 encoding".into()));
                }
                Ok(Length::Int8(cursor.get_i8()))
            }
            1 => {
                if cursor.remaining() < 2 {
                    return Err(FerriteError::RdbParseError("truncated int16 encoding".into()));
                }
                Ok(Length::Int16(cursor.get_i16_le()))
            }
            2 => {
                if cursor.remaining() < 4 {
                    return Err(FerriteError::RdbParseError("truncated int32 encoding".into()));
                }
                Ok(Length::Int32(cursor.get_i32_le()))
            }
            other => Err(FerriteError::RdbParseError(format!(
                "unsupported special string encoding subtype {other}"
            ))),
        },
    }
}

fn read_string(cursor: &mut Bytes) -> Result<Bytes, FerriteError> {
    match read_length(cursor)? {
        Length::Len(len) => {
            let len = len as usize;
            if cursor.remaining() < len {
                return Err(FerriteError::RdbParseError("truncated string".into()));
            }
            Ok(cursor.split_to(len))
        }
        Length::Int8(v) => Ok(Bytes::from(v.to_string().into_bytes())),
        Length::Int16(v) => Ok(Bytes::from(v.to_string().into_bytes())),
        Length::Int32(v) => Ok(Bytes::from(v.to_string().into_bytes())),
    }
}

fn check_magic(cursor: &mut Bytes) -> Result<(), FerriteError> {
    if cursor.remaining() < 9 {
        return Err(FerriteError::RdbParseError("file too short for a header".into()));
    }
    let magic = cursor.split_to(5);
    if &magic[..] != b"REDIS" {
        return Err(FerriteError::RdbParseError("missing REDIS magic number".into()));
    }
    cursor.advance(4); // version, unchecked
    Ok(())
}

/// Scans forward, without interpreting, until it sees the `SELECTDB` opcode.
/// Bails if `EOF` turns up first or the scan runs past a sane metadata size.
fn skip_metadata(cursor: &mut Bytes) -> Result<(), FerriteError> {
    let mut scanned = 0;
    loop {
        if !cursor.has_remaining() {
            return Err(FerriteError::RdbParseError("unexpected end of file skipping metadata".into()));
        }
        let opcode = cursor.get_u8();
        if opcode == OP_SELECTDB {
            return Ok(());
        }
        if opcode == OP_EOF {
            return Err(FerriteError::RdbParseError("EOF opcode before a database selector".into()));
        }
        scanned += 1;
        if scanned >= MAX_METADATA_SCAN_BYTES {
            return Err(FerriteError::RdbParseError("metadata section too large".into()));
        }
    }
}

fn parse(cursor: &mut Bytes, kv: &KvStore) -> Result<(), FerriteError> {
    check_magic(cursor)?;
    skip_metadata(cursor)?;

    // The SELECTDB opcode consumed by skip_metadata is followed by the db
    // number itself.
    let _db_number = read_length(cursor)?;

    loop {
        if !cursor.has_remaining() {
            return Err(FerriteError::RdbParseError("unexpected end of file in key/value section".into()));
        }
        let opcode = cursor.get_u8();

        match opcode {
            OP_EOF => return Ok(()),
            OP_SELECTDB => {
                read_length(cursor)?;
            }
            OP_RESIZEDB => {
                read_length(cursor)?;
                read_length(cursor)?;
            }
            _ => {
                let (expires_at, value_type) = match opcode {
                    OP_EXPIRETIME_MS => {
                        if cursor.remaining() < 8 {
                            return Err(FerriteError::RdbParseError("truncated millisecond expiry".into()));
                        }
                        let ms = cursor.get_u64_le();
                        if !cursor.has_remaining() {
                            return Err(FerriteError::RdbParseError("missing value type after expiry".into()));
                        }
                        (Some(SystemTime::UNIX_EPOCH + Duration::from_millis(ms)), cursor.get_u8())
                    }
                    OP_EXPIRETIME => {
                        if cursor.remaining() < 4 {
                            return Err(FerriteError::RdbParseError("truncated second expiry".into()));
                        }
                        let secs = cursor.get_u32_le();
                        if !cursor.has_remaining() {
                            return Err(FerriteError::RdbParseError("missing value type after expiry".into()));
                        }
                        (Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)), cursor.get_u8())
                    }
                    other => (None, other),
                };

                if value_type != VALUE_TYPE_STRING {
                    // Only string values are in scope; everything else is
                    // skipped without attempting to read its payload, since
                    // the encoding is value-type specific and unknown here.
                    continue;
                }

                let key = read_string(cursor)?;
                let value = read_string(cursor)?;
                kv.load(key, value, expires_at);
            }
        }
    }
}

/// Loads the configured RDB file into `kv`. A missing file is not an error:
/// the server simply starts with an empty keyspace. A present-but-malformed
/// file is fatal and propagated to the caller.
pub struct RdbLoader;

impl RdbLoader {
    pub async fn load_into(path: &Path, kv: &KvStore) -> Result<(), FerriteError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no RDB file found, starting with an empty keyspace");
                return Ok(());
            }
            Err(e) => return Err(FerriteError::from(e)),
        };

        let mut cursor = Bytes::from(bytes);
        match parse(&mut cursor, kv) {
            Ok(()) => {
                info!(path = %path.display(), "loaded RDB file");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse RDB file");
                Err(e)
            }
        }
    }
}
