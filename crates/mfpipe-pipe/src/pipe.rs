use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mfpipe_frame::{Entry, Message, Payload};
use mfpipe_transport::{Endpoint, Mode, Transport, TransportError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{OpenMode, PipeConfig};
use crate::error::{PipeError, Result};
use crate::info::{FlushFlags, PipeInfo};
use crate::queue::ChannelQueue;
use crate::reader::ReaderLoop;
use crate::writer::WriterLoop;

/// Default deadline for [`Pipe::open`] to connect the transport.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(1000);

/// One direction of an open pipe: its queue and background loop.
struct Side {
    queue: Arc<ChannelQueue>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Side {
    fn spawn_reader(
        transport: Box<dyn Transport>,
        depth: usize,
        config: &PipeConfig,
    ) -> Result<Self> {
        let (queue, stop) = Self::channel(depth);
        let worker = ReaderLoop::new(transport, Arc::clone(&queue), Arc::clone(&stop), config)
            .spawn()
            .map_err(|err| PipeError::ResourceUnavailable(TransportError::Io(err)))?;
        Ok(Self::with_worker(queue, stop, worker))
    }

    fn spawn_writer(
        transport: Box<dyn Transport>,
        depth: usize,
        config: &PipeConfig,
    ) -> Result<Self> {
        let (queue, stop) = Self::channel(depth);
        let worker = WriterLoop::new(transport, Arc::clone(&queue), Arc::clone(&stop), config)
            .spawn()
            .map_err(|err| PipeError::ResourceUnavailable(TransportError::Io(err)))?;
        Ok(Self::with_worker(queue, stop, worker))
    }

    fn channel(depth: usize) -> (Arc<ChannelQueue>, Arc<AtomicBool>) {
        (
            Arc::new(ChannelQueue::new(depth)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn with_worker(
        queue: Arc<ChannelQueue>,
        stop: Arc<AtomicBool>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            queue,
            stop,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Signal the loop, wake queue waiters and wait for the loop to finish.
    fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        self.queue.close();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("pipe worker thread panicked");
            }
        }
    }
}

/// A multi-channel media pipe.
///
/// Payloads and messages put on the pipe are queued and written by a
/// background writer; a background reader parses incoming bytes into a
/// read queue served by `get`, `peek` and `message_get`. Every blocking call
/// takes its own timeout.
///
/// `create` and `open` need exclusive access; everything else takes `&self`,
/// so an opened pipe can be shared between threads behind an `Arc`.
///
/// ```no_run
/// use std::time::Duration;
/// use mfpipe_frame::{Buffer, BufferFlags};
/// use mfpipe_pipe::Pipe;
///
/// let mut pipe = Pipe::new();
/// pipe.create("/tmp/mfpipe-demo")?;
/// pipe.open("/tmp/mfpipe-demo", 16, "RW", Duration::from_secs(1))?;
/// pipe.put("", Buffer::new(BufferFlags::BUFFER, vec![1u8, 2, 3]), Duration::from_secs(1))?;
/// let payload = pipe.get("", Duration::from_secs(1))?;
/// # let _ = payload;
/// # Ok::<(), mfpipe_pipe::PipeError>(())
/// ```
pub struct Pipe {
    config: PipeConfig,
    id: Option<String>,
    provisioned: Mutex<Option<(String, Box<dyn Transport>)>>,
    mode: Option<OpenMode>,
    reader: Option<Side>,
    writer: Option<Side>,
    closed: AtomicBool,
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Pipe {
    pub fn new() -> Self {
        Self::with_config(PipeConfig::default())
    }

    pub fn with_config(config: PipeConfig) -> Self {
        Self {
            config,
            id: None,
            provisioned: Mutex::new(None),
            mode: None,
            reader: None,
            writer: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Start a pipe over already-connected transports.
    ///
    /// At least one of `reader` and `writer` must be given.
    pub fn attach(
        reader: Option<Box<dyn Transport>>,
        writer: Option<Box<dyn Transport>>,
        depth: usize,
        config: PipeConfig,
    ) -> Result<Self> {
        let mode = match (reader.is_some(), writer.is_some()) {
            (true, true) => OpenMode::ReadWrite,
            (true, false) => OpenMode::Read,
            (false, true) => OpenMode::Write,
            (false, false) => {
                return Err(PipeError::InvalidArgument(
                    "attach needs a reader or a writer transport".into(),
                ))
            }
        };
        validate_depth(depth)?;
        let mut pipe = Self::with_config(config);
        pipe.start(mode, depth, reader, writer)?;
        Ok(pipe)
    }

    /// Provision the resource named by `id`: a FIFO for a path, a socket for
    /// `udp://<ipv4>:<port>`.
    ///
    /// A following [`open`](Self::open) of the same `id` reuses it.
    pub fn create(&mut self, id: &str) -> Result<()> {
        let endpoint = Endpoint::parse(id)?;
        let mut transport = endpoint.transport();
        transport.create()?;
        info!(id, kind = endpoint.kind(), "pipe created");
        *self.provisioned.get_mut() = Some((id.to_string(), transport));
        Ok(())
    }

    /// Connect to `id` in the directions named by `hints` (`R`, `W` or `RW`)
    /// and start the background loops. `depth` bounds each queue lane.
    pub fn open(&mut self, id: &str, depth: usize, hints: &str, timeout: Duration) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipeError::Closed);
        }
        if self.mode.is_some() {
            return Err(PipeError::InvalidArgument(format!(
                "pipe is already open as {}",
                self.id.as_deref().unwrap_or_default()
            )));
        }
        let mode = OpenMode::from_hints(hints)?;
        validate_depth(depth)?;
        let endpoint = Endpoint::parse(id)?;

        // The read side connects first so a FIFO write-open finds a reader.
        let reader = if mode.reads() {
            let mut transport = self.transport_for(id, &endpoint);
            transport.open(Mode::Read, timeout)?;
            Some(transport)
        } else {
            None
        };

        let writer = if mode.writes() {
            let mut transport = self.transport_for(id, &endpoint);
            if let Err(err) = transport.open(Mode::Write, timeout) {
                if let Some(mut reader) = reader {
                    if let Err(close_err) = reader.close() {
                        warn!(id, error = %close_err, "failed to close read side after open failure");
                    }
                }
                return Err(err.into());
            }
            Some(transport)
        } else {
            None
        };

        self.start(mode, depth, reader, writer)?;
        self.id = Some(id.to_string());
        info!(id, %mode, depth, "pipe opened");
        Ok(())
    }

    /// Queue `payload` for transmission on `channel`.
    ///
    /// An entry with a field longer than [`CodecConfig::max_field_len`] is
    /// refused, since the receiving parser would discard it.
    ///
    /// [`CodecConfig::max_field_len`]: mfpipe_frame::CodecConfig::max_field_len
    pub fn put(&self, channel: &str, payload: impl Into<Payload>, timeout: Duration) -> Result<()> {
        self.send(Entry::payload(channel, payload), timeout)
    }

    /// Remove and return the oldest received payload of `channel`.
    pub fn get(&self, channel: &str, timeout: Duration) -> Result<Payload> {
        self.reader_side()?.queue.pop(channel, timeout)
    }

    /// Return the `index`-th received payload of `channel` without removing it.
    pub fn peek(&self, channel: &str, index: usize, timeout: Duration) -> Result<Payload> {
        self.reader_side()?.queue.peek(channel, index, timeout)
    }

    pub fn message_put(
        &self,
        channel: &str,
        name: &str,
        param: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.send(Entry::message(channel, Message::new(name, param)), timeout)
    }

    pub fn message_get(&self, channel: &str, timeout: Duration) -> Result<Message> {
        self.reader_side()?.queue.pop(channel, timeout)
    }

    fn send(&self, entry: Entry, timeout: Duration) -> Result<()> {
        let side = self.writer_side()?;
        self.config
            .codec
            .check_entry(&entry)
            .map_err(|err| PipeError::InvalidArgument(format!("channel '{}': {err}", entry.channel)))?;
        side.queue.push(entry, timeout)
    }

    /// Snapshot of the read queue, or the write queue of a write-only pipe.
    pub fn info(&self, channel: &str) -> Result<PipeInfo> {
        let (mode, side) = self.info_side()?;
        let (objects, messages, channels) = side.queue.stats(channel);
        Ok(PipeInfo {
            mode,
            channels,
            objects,
            messages,
        })
    }

    /// Drop queued entries of `channel` from the read queue (the write queue
    /// of a write-only pipe). Returns how many were removed.
    pub fn flush(&self, channel: &str, flags: FlushFlags) -> Result<usize> {
        let (_, side) = self.info_side()?;
        if flags.contains(FlushFlags::REMOVE_CHANNEL) {
            return Err(PipeError::NotImplemented("channel removal"));
        }
        let removed = side.queue.flush(channel, flags);
        debug!(channel, flags = flags.bits(), removed, "pipe flushed");
        Ok(removed)
    }

    /// Stop both loops, letting the writer drain first, and release the
    /// transports. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(writer) = &self.writer {
            writer.shutdown();
        }
        if let Some(reader) = &self.reader {
            reader.shutdown();
        }
        let provisioned = self.provisioned.lock().take();
        if let Some((_, mut transport)) = provisioned {
            transport.close()?;
        }
        if self.mode.is_some() {
            info!(id = self.id.as_deref().unwrap_or_default(), "pipe closed");
        }
        Ok(())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some() && !self.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    fn start(
        &mut self,
        mode: OpenMode,
        depth: usize,
        reader: Option<Box<dyn Transport>>,
        writer: Option<Box<dyn Transport>>,
    ) -> Result<()> {
        let reader = reader
            .map(|transport| Side::spawn_reader(transport, depth, &self.config))
            .transpose()?;
        let writer = match writer
            .map(|transport| Side::spawn_writer(transport, depth, &self.config))
            .transpose()
        {
            Ok(writer) => writer,
            Err(err) => {
                if let Some(reader) = &reader {
                    reader.shutdown();
                }
                return Err(err);
            }
        };
        self.reader = reader;
        self.writer = writer;
        self.mode = Some(mode);
        Ok(())
    }

    /// The provisioned transport when `id` matches, else a fresh one.
    fn transport_for(&mut self, id: &str, endpoint: &Endpoint) -> Box<dyn Transport> {
        self.provisioned
            .get_mut()
            .take_if(|(provisioned, _)| provisioned == id)
            .map(|(_, transport)| transport)
            .unwrap_or_else(|| endpoint.transport())
    }

    fn reader_side(&self) -> Result<&Side> {
        self.ensure_not_closed()?;
        self.reader.as_ref().ok_or(PipeError::NotOpen(Mode::Read))
    }

    fn writer_side(&self) -> Result<&Side> {
        self.ensure_not_closed()?;
        self.writer.as_ref().ok_or(PipeError::NotOpen(Mode::Write))
    }

    fn info_side(&self) -> Result<(OpenMode, &Side)> {
        self.ensure_not_closed()?;
        let mode = self.mode.ok_or(PipeError::NotOpen(Mode::Read))?;
        let side = self
            .reader
            .as_ref()
            .or(self.writer.as_ref())
            .ok_or(PipeError::NotOpen(Mode::Read))?;
        Ok((mode, side))
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipeError::Closed);
        }
        Ok(())
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close pipe on drop");
        }
    }
}

fn validate_depth(depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(PipeError::InvalidArgument(
            "queue depth must be at least 1".into(),
        ));
    }
    Ok(())
}
