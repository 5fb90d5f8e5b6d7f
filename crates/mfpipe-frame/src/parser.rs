use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::{
    decode_body, CodecConfig, TypeTag, AV_PROPS_SIZE, FLAGS_SIZE, LEN_FIELD_SIZE, SYNC_BYTES,
    TIME_SIZE,
};
use crate::error::{FrameError, Result};
use crate::payload::Entry;

/// Position of the [`Parser`] within one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserState {
    Idle,
    ChannelLen,
    Channel,
    TypeTag,

    FrameTime,
    FrameAvProps,
    FrameUserLen,
    FrameUser,
    FrameVidLen,
    FrameVid,
    FrameAudLen,
    FrameAud,
    FrameReady,

    BufFlags,
    BufLen,
    BufData,
    BufferReady,

    MsgNameLen,
    MsgName,
    MsgParamLen,
    MsgParam,
    MessageReady,
}

impl ParserState {
    /// Terminal states: a complete entry is waiting to be drained.
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            ParserState::FrameReady | ParserState::BufferReady | ParserState::MessageReady
        )
    }

    fn is_length_prefix(self) -> bool {
        matches!(
            self,
            ParserState::ChannelLen
                | ParserState::FrameUserLen
                | ParserState::FrameVidLen
                | ParserState::FrameAudLen
                | ParserState::BufLen
                | ParserState::MsgNameLen
                | ParserState::MsgParamLen
        )
    }

    /// States whose size comes from the preceding length prefix.
    fn is_variable(self) -> bool {
        matches!(
            self,
            ParserState::Channel
                | ParserState::FrameUser
                | ParserState::FrameVid
                | ParserState::FrameAud
                | ParserState::BufData
                | ParserState::MsgName
                | ParserState::MsgParam
        )
    }

    fn next(self) -> Self {
        use ParserState::*;
        match self {
            Idle => ChannelLen,
            ChannelLen => Channel,
            Channel => TypeTag,
            // Diverges on the tag byte, see `Parser::on_type_tag`.
            TypeTag => Idle,

            FrameTime => FrameAvProps,
            FrameAvProps => FrameUserLen,
            FrameUserLen => FrameUser,
            FrameUser => FrameVidLen,
            FrameVidLen => FrameVid,
            FrameVid => FrameAudLen,
            FrameAudLen => FrameAud,
            FrameAud => FrameReady,

            BufFlags => BufLen,
            BufLen => BufData,
            BufData => BufferReady,

            MsgNameLen => MsgName,
            MsgName => MsgParamLen,
            MsgParamLen => MsgParam,
            MsgParam => MessageReady,

            ready => ready,
        }
    }
}

/// An entry abandoned mid-stream because a declared length was too large.
#[derive(Debug)]
pub struct Discarded {
    /// Type of the entry, unless the channel length was the offending field.
    pub tag: Option<TypeTag>,
    pub error: FrameError,
}

/// Resumable parser reconstructing entries from an arbitrarily chunked
/// byte stream.
///
/// Feed successive chunks to [`Parser::parse`]. When it reaches a ready
/// state it stops consuming; drain the entry with [`Parser::take_entry`]
/// (or read [`Parser::data`] and call [`Parser::reset`]) before feeding the
/// rest of the chunk.
///
/// Owned by a single reader; not shared across threads.
#[derive(Debug)]
pub struct Parser {
    config: CodecConfig,
    state: ParserState,
    tag: Option<TypeTag>,
    sync_matched: usize,
    remaining: usize,
    declared: usize,
    len_buf: [u8; LEN_FIELD_SIZE],
    len_filled: usize,
    channel: Vec<u8>,
    body: BytesMut,
    discarded: Vec<Discarded>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            state: ParserState::Idle,
            tag: None,
            sync_matched: 0,
            remaining: 0,
            declared: 0,
            len_buf: [0; LEN_FIELD_SIZE],
            len_filled: 0,
            channel: Vec::new(),
            body: BytesMut::new(),
            discarded: Vec::new(),
        }
    }

    /// Return to `Idle`, discarding any partially assembled entry.
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.tag = None;
        self.sync_matched = 0;
        self.remaining = 0;
        self.declared = 0;
        self.len_filled = 0;
        self.channel.clear();
        self.body.clear();
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Whether a partially assembled entry is held.
    pub fn in_progress(&self) -> bool {
        self.state != ParserState::Idle && !self.state.is_ready()
    }

    /// Type of the entry being assembled.
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.tag
    }

    /// Raw channel bytes of the current entry.
    pub fn channel(&self) -> &[u8] {
        &self.channel
    }

    /// Accumulated body of the current entry (everything after the type tag).
    pub fn data(&self) -> &[u8] {
        &self.body
    }

    /// Consume bytes from `input`, returning how many were used.
    ///
    /// Stops early, right after the last byte of an entry, when a ready state
    /// is reached. Returns 0 while already in a ready state.
    pub fn parse(&mut self, input: &[u8]) -> usize {
        let mut pos = 0;
        while pos < input.len() {
            let rest = &input[pos..];
            match self.state {
                state if state.is_ready() => break,
                ParserState::Idle => pos += self.scan_sync(rest),
                ParserState::TypeTag => {
                    self.on_type_tag(rest[0]);
                    pos += 1;
                }
                state if state.is_length_prefix() => pos += self.fill_len(rest),
                ParserState::Channel => {
                    let n = self.remaining.min(rest.len());
                    self.channel.extend_from_slice(&rest[..n]);
                    pos += n;
                    self.consumed(n);
                }
                _ => {
                    let n = self.remaining.min(rest.len());
                    self.body.extend_from_slice(&rest[..n]);
                    pos += n;
                    self.consumed(n);
                }
            }
        }
        pos
    }

    /// Entries dropped by resynchronisation since the last call.
    ///
    /// Unknown type tags are not reported; they are indistinguishable from
    /// stray bytes that happened to match the sync marker.
    pub fn drain_discarded(&mut self) -> std::vec::Drain<'_, Discarded> {
        self.discarded.drain(..)
    }

    /// Decode the completed entry and reset for the next one.
    ///
    /// Returns `None` unless the parser is in a ready state.
    pub fn take_entry(&mut self) -> Option<Result<Entry>> {
        if !self.is_ready() {
            return None;
        }
        let tag = self.tag?;
        let channel = std::mem::take(&mut self.channel);
        let body = self.body.split().freeze();
        self.reset();

        let entry = String::from_utf8(channel)
            .map_err(|_| FrameError::InvalidUtf8 { field: "channel" })
            .and_then(|channel| {
                decode_body(tag, body).map(|item| Entry { channel, item })
            });
        Some(entry)
    }

    fn scan_sync(&mut self, input: &[u8]) -> usize {
        for (i, &byte) in input.iter().enumerate() {
            if byte == SYNC_BYTES[self.sync_matched] {
                self.sync_matched += 1;
            } else if byte == SYNC_BYTES[0] {
                self.sync_matched = 1;
            } else {
                self.sync_matched = 0;
            }

            if self.sync_matched == SYNC_BYTES.len() {
                self.sync_matched = 0;
                self.enter(ParserState::ChannelLen);
                return i + 1;
            }
        }
        input.len()
    }

    fn on_type_tag(&mut self, byte: u8) {
        match TypeTag::try_from(byte) {
            Ok(tag) => {
                self.tag = Some(tag);
                self.enter(match tag {
                    TypeTag::Frame => ParserState::FrameTime,
                    TypeTag::Buffer => ParserState::BufFlags,
                    TypeTag::Message => ParserState::MsgNameLen,
                });
            }
            Err(_) => {
                debug!(tag = byte, "discarding entry with unknown type tag");
                self.reset();
            }
        }
    }

    fn fill_len(&mut self, input: &[u8]) -> usize {
        let n = self.remaining.min(input.len());
        self.len_buf[self.len_filled..self.len_filled + n].copy_from_slice(&input[..n]);
        self.len_filled += n;
        if self.state != ParserState::ChannelLen {
            self.body.extend_from_slice(&input[..n]);
        }
        self.remaining -= n;
        if self.remaining > 0 {
            return n;
        }

        let len = u64::from_le_bytes(self.len_buf);
        self.len_filled = 0;
        match usize::try_from(len) {
            Ok(len) if len <= self.config.max_field_len => {
                self.declared = len;
                self.enter(self.state.next());
            }
            _ => {
                warn!(
                    state = ?self.state,
                    len,
                    max = self.config.max_field_len,
                    "declared length too large; resynchronising"
                );
                self.discarded.push(Discarded {
                    tag: self.tag,
                    error: FrameError::FieldTooLarge {
                        len,
                        max: self.config.max_field_len,
                    },
                });
                self.reset();
            }
        }
        n
    }

    fn consumed(&mut self, n: usize) {
        self.remaining -= n;
        if self.remaining == 0 {
            self.enter(self.state.next());
        }
    }

    fn enter(&mut self, state: ParserState) {
        let mut state = state;
        loop {
            self.state = state;
            self.remaining = match state {
                s if s.is_length_prefix() => LEN_FIELD_SIZE,
                s if s.is_variable() => self.declared,
                ParserState::TypeTag => 1,
                ParserState::FrameTime => TIME_SIZE,
                ParserState::FrameAvProps => AV_PROPS_SIZE,
                ParserState::BufFlags => FLAGS_SIZE,
                _ => 0,
            };
            // Empty fields complete without consuming anything.
            if self.remaining == 0 && state.is_variable() {
                state = state.next();
                continue;
            }
            return;
        }
    }
}

/// Decode the first complete entry in `input` with a fresh parser.
///
/// Returns the decoded entry together with the number of bytes consumed, or
/// `None` if `input` holds no complete entry.
pub fn decode_entry(input: &[u8], config: &CodecConfig) -> Option<(Result<Entry>, usize)> {
    let mut parser = Parser::with_config(config.clone());
    let consumed = parser.parse(input);
    parser.take_entry().map(|entry| (entry, consumed))
}
