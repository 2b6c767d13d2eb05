//! Wire frame model (component C7).
//!
//! A 9-octet frame header (`length: u24`, `kind: u8`, `flags: u8`, `R + stream_id: u31`)
//! followed by a payload, per RFC 7540 §4.1. Only the frame kinds this engine actually
//! emits are given a dedicated decode path; `CONTINUATION` is recognized (so framing stays
//! in sync against a frame using it) but its payload is dropped rather than reassembled,
//! and the `PADDED` flag is likewise unhandled, since this engine never emits either and
//! there is no peer in SPEC_FULL.md's scope other than this engine itself (header blocks
//! it produces always fit a single HEADERS/PUSH_PROMISE frame, unpadded; see §3.1).

mod head;
mod headers;
mod pseudo;
mod settings;

pub use head::{
    Head, Kind, StreamId, FLAG_ACK, FLAG_END_HEADERS, FLAG_END_STREAM, FLAG_PADDED, FLAG_PRIORITY,
};
pub use headers::Headers;
pub use pseudo::Pseudo;
pub use settings::Settings;

pub const FRAME_HEADER_LEN: usize = 9;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const MAX_DATA_CHUNK: usize = 16_384;
