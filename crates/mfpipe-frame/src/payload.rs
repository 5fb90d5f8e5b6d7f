//! Values carried over a pipe.

use std::ops::{BitOr, BitOrAssign};

use bytes::Bytes;

/// Semantic tag of a [`Buffer`]. Bits may be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const EMPTY: Self = Self(0);
    pub const BUFFER: Self = Self(0x1);
    pub const PACKET: Self = Self(0x2);
    pub const FRAME: Self = Self(0x3);
    pub const STREAM: Self = Self(0x4);
    pub const SIDE_DATA: Self = Self(0x10);
    pub const VIDEO_DATA: Self = Self(0x20);
    pub const AUDIO_DATA: Self = Self(0x40);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// An opaque byte buffer with a semantic tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Buffer {
    pub flags: BufferFlags,
    pub data: Bytes,
}

impl Buffer {
    pub fn new(flags: BufferFlags, data: impl Into<Bytes>) -> Self {
        Self {
            flags,
            data: data.into(),
        }
    }
}

/// Presentation interval in 100ns reference ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Time {
    pub start: i64,
    pub end: i64,
}

/// Four-character video codec tag, stored as its little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCc(pub u32);

impl FourCc {
    pub const DEFAULT: Self = Self(0);
    pub const I420: Self = Self::from_tag(*b"I420");
    pub const YV12: Self = Self::from_tag(*b"YV12");
    pub const NV12: Self = Self::from_tag(*b"NV12");
    pub const YUY2: Self = Self::from_tag(*b"YUY2");
    pub const YVYU: Self = Self::from_tag(*b"YVYU");
    pub const UYVY: Self = Self::from_tag(*b"UYVY");
    pub const RGB24: Self = Self(0xe436_eb7d);
    pub const RGB32: Self = Self(0xe436_eb7e);

    pub const fn from_tag(tag: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(tag))
    }

    pub const fn tag(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = self.tag();
        if tag.iter().all(|b| b.is_ascii_graphic()) {
            tag.iter().try_for_each(|b| write!(f, "{}", *b as char))
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoProps {
    pub fourcc: FourCc,
    pub width: i32,
    pub height: i32,
    pub row_bytes: i32,
    pub aspect_x: i16,
    pub aspect_y: i16,
    /// Frames per second.
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioProps {
    pub channels: i32,
    pub samples_per_sec: i32,
    pub bits_per_sample: i32,
    pub track_split_bits: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvProps {
    pub video: VideoProps,
    pub audio: AudioProps,
}

/// A timed audio/video frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub time: Time,
    pub av_props: AvProps,
    /// Free-form user properties.
    pub user_props: String,
    pub video: Bytes,
    pub audio: Bytes,
}

/// A media value: either a raw buffer or a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Buffer(Buffer),
    Frame(Frame),
}

impl Payload {
    /// Media bytes carried by this payload.
    pub fn data_len(&self) -> usize {
        match self {
            Payload::Buffer(buffer) => buffer.data.len(),
            Payload::Frame(frame) => frame.video.len() + frame.audio.len(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Buffer(_) => "buffer",
            Payload::Frame(_) => "frame",
        }
    }
}

impl From<Buffer> for Payload {
    fn from(buffer: Buffer) -> Self {
        Payload::Buffer(buffer)
    }
}

impl From<Frame> for Payload {
    fn from(frame: Frame) -> Self {
        Payload::Frame(frame)
    }
}

/// An out-of-band control message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub name: String,
    pub param: String,
}

impl Message {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
        }
    }
}

/// What an entry carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Payload(Payload),
    Message(Message),
}

/// A channel-tagged item, the unit encoded on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub channel: String,
    pub item: Item,
}

impl Entry {
    pub fn payload(channel: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            channel: channel.into(),
            item: Item::Payload(payload.into()),
        }
    }

    pub fn message(channel: impl Into<String>, message: Message) -> Self {
        Self {
            channel: channel.into(),
            item: Item::Message(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_flags_combine() {
        let flags = BufferFlags::VIDEO_DATA | BufferFlags::PACKET;
        assert_eq!(flags.bits(), 0x22);
        assert!(flags.contains(BufferFlags::VIDEO_DATA));
        assert!(!flags.contains(BufferFlags::AUDIO_DATA));
        assert!(BufferFlags::EMPTY.is_empty());
        assert!(BufferFlags::FRAME.contains(BufferFlags::BUFFER));
    }

    #[test]
    fn fourcc_matches_well_known_values() {
        assert_eq!(FourCc::I420.0, 0x3032_3449);
        assert_eq!(FourCc::YV12.0, 0x3231_5659);
        assert_eq!(FourCc::NV12.0, 0x3231_564e);
        assert_eq!(FourCc::UYVY.0, 0x5956_5955);
        assert_eq!(FourCc::I420.to_string(), "I420");
        assert_eq!(FourCc::RGB32.to_string(), "0xe436eb7e");
    }

    #[test]
    fn payload_accessors() {
        let buffer: Payload = Buffer::new(BufferFlags::BUFFER, vec![1u8, 2, 3]).into();
        assert_eq!(buffer.kind(), "buffer");
        assert_eq!(buffer.data_len(), 3);

        let frame: Payload = Frame {
            video: Bytes::from_static(b"vv"),
            audio: Bytes::from_static(b"a"),
            ..Frame::default()
        }
        .into();
        assert_eq!(frame.kind(), "frame");
        assert_eq!(frame.data_len(), 3);
    }
}
