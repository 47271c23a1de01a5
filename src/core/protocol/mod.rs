// src/core/protocol/mod.rs

//! The RESP wire protocol: frame types, the codec, and the RDB-bulk
//! transfer helper used by `PSYNC`.

mod resp_frame;

pub use resp_frame::{RespFrame, RespFrameCodec, encode_rdb_bulk};
