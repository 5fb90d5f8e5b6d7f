//! Wire codec and streaming parser for mfpipe entries.
//!
//! Every entry on the wire is laid out as:
//! - a 4-byte sync marker (`FE FD FC FB`) for stream recovery
//! - a u64 little-endian channel length and the channel bytes
//! - a 1-byte type tag (1 = frame, 2 = buffer, 3 = message)
//! - a type-specific body of fixed fields and u64-prefixed byte runs
//!
//! [`Parser`] reassembles entries from arbitrarily chunked input; the
//! `encode_*` functions produce the same bytes in a single pass.

pub mod codec;
pub mod error;
pub mod parser;
pub mod payload;

pub use codec::{
    decode_body, encode_entry, encode_message, encode_payload, CodecConfig, TypeTag,
    AV_PROPS_SIZE, DEFAULT_MAX_FIELD_LEN, LEN_FIELD_SIZE, SYNC_BYTES, SYNC_MARKER,
};
pub use error::{FrameError, Result};
pub use parser::{decode_entry, Discarded, Parser, ParserState};
pub use payload::{
    AudioProps, AvProps, Buffer, BufferFlags, Entry, FourCc, Frame, Item, Message, Payload, Time,
    VideoProps,
};
