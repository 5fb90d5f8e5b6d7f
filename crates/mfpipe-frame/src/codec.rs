use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::payload::{
    AudioProps, AvProps, Buffer, BufferFlags, Entry, FourCc, Frame, Item, Message, Payload, Time,
    VideoProps,
};

/// Sync marker opening every entry.
pub const SYNC_MARKER: u32 = 0xFBFC_FDFE;

/// Sync marker as it appears on the wire.
pub const SYNC_BYTES: [u8; 4] = SYNC_MARKER.to_le_bytes();

/// Width of every length prefix (u64, little-endian).
pub const LEN_FIELD_SIZE: usize = 8;

/// Buffer flag word.
pub const FLAGS_SIZE: usize = 4;

/// Frame start/end ticks.
pub const TIME_SIZE: usize = 16;

/// Fixed audio/video property record.
pub const AV_PROPS_SIZE: usize = 48;

/// Default upper bound for a single declared field length: 128 MiB.
pub const DEFAULT_MAX_FIELD_LEN: usize = 128 * 1024 * 1024;

/// One-byte tag following the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Frame = 1,
    Buffer = 2,
    Message = 3,
}

impl TryFrom<u8> for TypeTag {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(TypeTag::Frame),
            2 => Ok(TypeTag::Buffer),
            3 => Ok(TypeTag::Message),
            other => Err(FrameError::UnknownType(other)),
        }
    }
}

/// Configuration for the codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest length a single prefix may declare. Anything larger is
    /// treated as stream corruption.
    pub max_field_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

impl CodecConfig {
    /// Reject an entry a parser with this configuration would discard.
    pub fn check_entry(&self, entry: &Entry) -> Result<()> {
        self.check_field(entry.channel.len())?;
        match &entry.item {
            Item::Payload(Payload::Buffer(buffer)) => self.check_field(buffer.data.len()),
            Item::Payload(Payload::Frame(frame)) => {
                self.check_field(frame.user_props.len())?;
                self.check_field(frame.video.len())?;
                self.check_field(frame.audio.len())
            }
            Item::Message(message) => {
                self.check_field(message.name.len())?;
                self.check_field(message.param.len())
            }
        }
    }

    fn check_field(&self, len: usize) -> Result<()> {
        if len > self.max_field_len {
            return Err(FrameError::FieldTooLarge {
                len: len as u64,
                max: self.max_field_len,
            });
        }
        Ok(())
    }
}

/// Encode an entry into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬────────────┬───────────┬──────────┬──────────┐
/// │ Sync (4B)   │ ChannelLen │ Channel   │ Type(1B) │ Body     │
/// │ FE FD FC FB │ (8B LE)    │ (N bytes) │ 1/2/3    │ per type │
/// └─────────────┴────────────┴───────────┴──────────┴──────────┘
///
/// Buffer:  Flags(4B) | Len(8B) | Data
/// Frame:   Time(16B) | AvProps(48B) | Len | UserProps | Len | Video | Len | Audio
/// Message: Len | Name | Len | Param
/// ```
pub fn encode_entry(entry: &Entry, dst: &mut BytesMut) {
    match &entry.item {
        Item::Payload(payload) => encode_payload(&entry.channel, payload, dst),
        Item::Message(message) => encode_message(&entry.channel, message, dst),
    }
}

/// Encode a channel-tagged payload.
pub fn encode_payload(channel: &str, payload: &Payload, dst: &mut BytesMut) {
    match payload {
        Payload::Buffer(buffer) => {
            dst.reserve(header_len(channel) + FLAGS_SIZE + LEN_FIELD_SIZE + buffer.data.len());
            put_header(channel, TypeTag::Buffer, dst);
            dst.put_u32_le(buffer.flags.bits());
            put_bytes(&buffer.data, dst);
        }
        Payload::Frame(frame) => {
            dst.reserve(
                header_len(channel)
                    + TIME_SIZE
                    + AV_PROPS_SIZE
                    + 3 * LEN_FIELD_SIZE
                    + frame.user_props.len()
                    + frame.video.len()
                    + frame.audio.len(),
            );
            put_header(channel, TypeTag::Frame, dst);
            dst.put_i64_le(frame.time.start);
            dst.put_i64_le(frame.time.end);
            put_av_props(&frame.av_props, dst);
            put_bytes(frame.user_props.as_bytes(), dst);
            put_bytes(&frame.video, dst);
            put_bytes(&frame.audio, dst);
        }
    }
}

/// Encode a channel-tagged message.
pub fn encode_message(channel: &str, message: &Message, dst: &mut BytesMut) {
    dst.reserve(
        header_len(channel) + 2 * LEN_FIELD_SIZE + message.name.len() + message.param.len(),
    );
    put_header(channel, TypeTag::Message, dst);
    put_bytes(message.name.as_bytes(), dst);
    put_bytes(message.param.as_bytes(), dst);
}

fn header_len(channel: &str) -> usize {
    SYNC_BYTES.len() + LEN_FIELD_SIZE + channel.len() + 1
}

fn put_header(channel: &str, tag: TypeTag, dst: &mut BytesMut) {
    dst.put_slice(&SYNC_BYTES);
    put_bytes(channel.as_bytes(), dst);
    dst.put_u8(tag as u8);
}

fn put_bytes(bytes: &[u8], dst: &mut BytesMut) {
    dst.put_u64_le(bytes.len() as u64);
    dst.put_slice(bytes);
}

fn put_av_props(props: &AvProps, dst: &mut BytesMut) {
    let video = &props.video;
    dst.put_u32_le(video.fourcc.0);
    dst.put_i32_le(video.width);
    dst.put_i32_le(video.height);
    dst.put_i32_le(video.row_bytes);
    dst.put_i16_le(video.aspect_x);
    dst.put_i16_le(video.aspect_y);
    // Alignment padding of the 64-bit C layout before the f64 rate.
    dst.put_bytes(0, 4);
    dst.put_f64_le(video.rate);

    let audio = &props.audio;
    dst.put_i32_le(audio.channels);
    dst.put_i32_le(audio.samples_per_sec);
    dst.put_i32_le(audio.bits_per_sample);
    dst.put_i32_le(audio.track_split_bits);
}

/// Decode the body of an entry (everything after the type tag).
///
/// The body must be exactly one entry's worth of bytes; trailing bytes are an
/// error so that declared lengths always match what was consumed. Data
/// fields are sliced out of `body` without copying.
pub fn decode_body(tag: TypeTag, body: Bytes) -> Result<Item> {
    let mut src = body;
    let item = match tag {
        TypeTag::Buffer => {
            let flags = BufferFlags::from_bits(get_u32(&mut src, "buffer flags")?);
            let data = get_bytes(&mut src, "buffer data")?;
            Item::Payload(Payload::Buffer(Buffer { flags, data }))
        }
        TypeTag::Frame => {
            need(&src, TIME_SIZE, "frame time")?;
            let time = Time {
                start: src.get_i64_le(),
                end: src.get_i64_le(),
            };
            let av_props = get_av_props(&mut src)?;
            let user_props = get_string(&mut src, "frame user props")?;
            let video = get_bytes(&mut src, "frame video")?;
            let audio = get_bytes(&mut src, "frame audio")?;
            Item::Payload(Payload::Frame(Frame {
                time,
                av_props,
                user_props,
                video,
                audio,
            }))
        }
        TypeTag::Message => {
            let name = get_string(&mut src, "message name")?;
            let param = get_string(&mut src, "message param")?;
            Item::Message(Message { name, param })
        }
    };

    if src.has_remaining() {
        return Err(FrameError::TrailingBytes(src.remaining()));
    }
    Ok(item)
}

fn need(src: &Bytes, len: usize, field: &'static str) -> Result<()> {
    if src.remaining() < len {
        return Err(FrameError::Truncated { field });
    }
    Ok(())
}

fn get_u32(src: &mut Bytes, field: &'static str) -> Result<u32> {
    need(src, 4, field)?;
    Ok(src.get_u32_le())
}

fn get_len(src: &mut Bytes, field: &'static str) -> Result<usize> {
    need(src, LEN_FIELD_SIZE, field)?;
    let len = src.get_u64_le();
    usize::try_from(len).map_err(|_| FrameError::FieldTooLarge {
        len,
        max: usize::MAX,
    })
}

fn get_bytes(src: &mut Bytes, field: &'static str) -> Result<Bytes> {
    let len = get_len(src, field)?;
    need(src, len, field)?;
    Ok(src.copy_to_bytes(len))
}

fn get_string(src: &mut Bytes, field: &'static str) -> Result<String> {
    let bytes = get_bytes(src, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| FrameError::InvalidUtf8 { field })
}

fn get_av_props(src: &mut Bytes) -> Result<AvProps> {
    need(src, AV_PROPS_SIZE, "frame av props")?;
    let fourcc = FourCc(src.get_u32_le());
    let width = src.get_i32_le();
    let height = src.get_i32_le();
    let row_bytes = src.get_i32_le();
    let aspect_x = src.get_i16_le();
    let aspect_y = src.get_i16_le();
    src.advance(4);
    let rate = src.get_f64_le();
    let video = VideoProps {
        fourcc,
        width,
        height,
        row_bytes,
        aspect_x,
        aspect_y,
        rate,
    };
    let audio = AudioProps {
        channels: src.get_i32_le(),
        samples_per_sec: src.get_i32_le(),
        bits_per_sample: src.get_i32_le(),
        track_split_bits: src.get_i32_le(),
    };
    Ok(AvProps { video, audio })
}
