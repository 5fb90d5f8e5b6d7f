use std::io::ErrorKind;
use std::time::Duration;

use crate::error::Result;

/// Direction a transport handle is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Read,
    Write,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Read => f.write_str("read"),
            Mode::Write => f.write_str("write"),
        }
    }
}

/// A byte-oriented connection beneath the pipe protocol.
///
/// One handle serves one direction. Reads and writes never block for long:
/// a transport that has nothing to deliver (or cannot accept bytes yet)
/// reports `WouldBlock`, or `Ok(0)` on read when no peer is attached.
/// Callers treat both as "retry later", see [`is_transient`].
pub trait Transport: Send {
    /// Backend name for diagnostics.
    fn kind(&self) -> &'static str;

    /// Provision the underlying resource (FIFO file, socket).
    fn create(&mut self) -> Result<()>;

    /// Connect for `mode`, retrying until `timeout` elapses.
    fn open(&mut self, mode: Mode, timeout: Duration) -> Result<()>;

    /// Release the handle. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write a prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn create(&mut self) -> Result<()> {
        (**self).create()
    }

    fn open(&mut self, mode: Mode, timeout: Duration) -> Result<()> {
        (**self).open(mode, timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        (**self).write(buf)
    }
}

/// Whether an I/O error only means "not ready yet".
///
/// Would-block, interruption and a missing peer are all retried by the pipe
/// loops; nothing short of an explicit stop ends them.
pub fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(is_transient(&std::io::Error::from(ErrorKind::WouldBlock)));
        assert!(is_transient(&std::io::Error::from(ErrorKind::BrokenPipe)));
        assert!(!is_transient(&std::io::Error::from(
            ErrorKind::PermissionDenied
        )));
    }

    #[test]
    fn mode_display() {
        assert_eq!(Mode::Read.to_string(), "read");
        assert_eq!(Mode::Write.to_string(), "write");
    }
}
