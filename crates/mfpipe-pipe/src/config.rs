use std::time::Duration;

use mfpipe_frame::CodecConfig;
use serde::Serialize;

use crate::error::{PipeError, Result};

/// Default size of one transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default pause between retries when the transport is not ready.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default bound on draining the write queue during close.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for a [`Pipe`](crate::Pipe) and its background loops.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Bytes requested from the transport per read.
    pub read_chunk_size: usize,
    /// How long the loops sleep before retrying a transport that is not ready.
    pub poll_interval: Duration,
    /// How long `close` lets the writer flush queued entries.
    pub drain_timeout: Duration,
    pub codec: CodecConfig,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            codec: CodecConfig::default(),
        }
    }
}

/// Directions a pipe is open for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpenMode {
    #[serde(rename = "R")]
    Read,
    #[serde(rename = "W")]
    Write,
    #[serde(rename = "RW")]
    ReadWrite,
}

impl OpenMode {
    /// Parse open hints: any non-empty combination of `R` and `W`,
    /// case-insensitive.
    pub fn from_hints(hints: &str) -> Result<Self> {
        let mut read = false;
        let mut write = false;
        for c in hints.chars() {
            match c.to_ascii_uppercase() {
                'R' => read = true,
                'W' => write = true,
                _ => {
                    return Err(PipeError::InvalidArgument(format!(
                        "open hints must contain only R and W, got '{hints}'"
                    )))
                }
            }
        }
        match (read, write) {
            (true, true) => Ok(OpenMode::ReadWrite),
            (true, false) => Ok(OpenMode::Read),
            (false, true) => Ok(OpenMode::Write),
            (false, false) => Err(PipeError::InvalidArgument(
                "open hints must not be empty".into(),
            )),
        }
    }

    pub fn reads(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Read => f.write_str("R"),
            OpenMode::Write => f.write_str("W"),
            OpenMode::ReadWrite => f.write_str("RW"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_parse() {
        assert_eq!(OpenMode::from_hints("R").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::from_hints("w").unwrap(), OpenMode::Write);
        assert_eq!(OpenMode::from_hints("RW").unwrap(), OpenMode::ReadWrite);
        assert_eq!(OpenMode::from_hints("wr").unwrap(), OpenMode::ReadWrite);
        assert!(OpenMode::ReadWrite.reads() && OpenMode::ReadWrite.writes());
        assert!(!OpenMode::Read.writes());
    }

    #[test]
    fn bad_hints_rejected() {
        for hints in ["", "X", "R W", "RWX"] {
            assert!(
                matches!(OpenMode::from_hints(hints), Err(PipeError::InvalidArgument(_))),
                "{hints:?}"
            );
        }
    }

    #[test]
    fn defaults() {
        let config = PipeConfig::default();
        assert_eq!(config.read_chunk_size, 64 * 1024);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
    }
}
