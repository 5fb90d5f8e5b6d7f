//! In-memory transport double for loop and facade tests.

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mfpipe_transport::{Mode, Transport};
use parking_lot::Mutex;

/// Both ends of a [`MemoryTransport`] share one byte queue.
#[derive(Clone, Default)]
pub(crate) struct MemoryTransport {
    wire: Arc<Mutex<VecDeque<u8>>>,
    closed: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
    write_limit: Option<usize>,
    stalled: bool,
    block_next: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload bytes for the read side.
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let transport = Self::new();
        transport.push_bytes(bytes);
        transport
    }

    /// Accept at most `limit` bytes per write and report would-block on every
    /// other call.
    pub fn choppy(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Never accept a byte.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.wire.lock().extend(bytes.iter().copied());
    }

    pub fn contents(&self) -> Vec<u8> {
        self.wire.lock().iter().copied().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn create(&mut self) -> mfpipe_transport::Result<()> {
        Ok(())
    }

    fn open(&mut self, _mode: Mode, _timeout: Duration) -> mfpipe_transport::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> mfpipe_transport::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock();
        if wire.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(wire.len());
        for (slot, byte) in buf.iter_mut().zip(wire.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            return Err(ErrorKind::WouldBlock.into());
        }
        if self.write_limit.is_some() {
            self.block_next = !self.block_next;
            if self.block_next {
                return Err(ErrorKind::WouldBlock.into());
            }
        }
        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.wire.lock().extend(buf[..n].iter().copied());
        Ok(n)
    }
}
