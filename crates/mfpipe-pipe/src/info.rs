use std::ops::BitOr;

use serde::Serialize;

use crate::config::OpenMode;

/// Occupancy and counters of one queue lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueStats {
    /// Entries queued for the queried channel.
    pub have: usize,
    /// Capacity of the lane (shared by all channels).
    pub max: usize,
    /// Entries discarded without delivery.
    pub dropped: u64,
    /// Entries removed by [`Pipe::flush`](crate::Pipe::flush).
    pub flushed: u64,
}

/// Snapshot returned by [`Pipe::info`](crate::Pipe::info).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipeInfo {
    pub mode: OpenMode,
    /// Distinct channels with at least one queued entry.
    pub channels: usize,
    pub objects: QueueStats,
    pub messages: QueueStats,
}

/// What [`Pipe::flush`](crate::Pipe::flush) removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlushFlags(u32);

impl FlushFlags {
    /// Tear down the channel itself. Not supported.
    pub const REMOVE_CHANNEL: Self = Self(0x1);
    pub const RESET_COUNTERS: Self = Self(0x2);
    pub const FLUSH_OBJECTS: Self = Self(0x20);
    pub const FLUSH_MESSAGES: Self = Self(0x40);
    pub const FLUSH_ALL: Self = Self(0xf0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn objects(self) -> bool {
        self.contains(Self::FLUSH_OBJECTS)
    }

    pub(crate) fn messages(self) -> bool {
        self.contains(Self::FLUSH_MESSAGES)
    }

    pub(crate) fn reset_counters(self) -> bool {
        self.contains(Self::RESET_COUNTERS)
    }
}

impl BitOr for FlushFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_all_covers_both_lanes() {
        assert!(FlushFlags::FLUSH_ALL.objects());
        assert!(FlushFlags::FLUSH_ALL.messages());
        assert!(!FlushFlags::FLUSH_ALL.reset_counters());

        let flags = FlushFlags::FLUSH_MESSAGES | FlushFlags::RESET_COUNTERS;
        assert!(flags.messages() && flags.reset_counters() && !flags.objects());
    }

    #[test]
    fn info_serializes() {
        let info = PipeInfo {
            mode: OpenMode::ReadWrite,
            channels: 2,
            objects: QueueStats {
                have: 1,
                max: 8,
                dropped: 0,
                flushed: 3,
            },
            messages: QueueStats::default(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["mode"], "RW");
        assert_eq!(json["objects"]["max"], 8);
        assert_eq!(json["messages"]["have"], 0);
    }
}
