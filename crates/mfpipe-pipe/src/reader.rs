use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mfpipe_frame::{Entry, Message, Parser, Payload, TypeTag};
use mfpipe_transport::{is_transient, Transport};
use tracing::{debug, trace, warn};

use crate::config::PipeConfig;
use crate::queue::ChannelQueue;

/// Longest a loop parks on the queue before re-checking its stop flag.
pub(crate) const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Pulls bytes from a transport, reassembles entries and queues them for
/// `get`/`message_get`.
///
/// Stops reading while either lane of the queue is full, so a slow consumer
/// pushes back on the transport instead of growing memory.
pub(crate) struct ReaderLoop {
    transport: Box<dyn Transport>,
    parser: Parser,
    queue: Arc<ChannelQueue>,
    stop: Arc<AtomicBool>,
    chunk_size: usize,
    poll_interval: Duration,
    delivered: u64,
}

impl ReaderLoop {
    pub fn new(
        transport: Box<dyn Transport>,
        queue: Arc<ChannelQueue>,
        stop: Arc<AtomicBool>,
        config: &PipeConfig,
    ) -> Self {
        Self {
            transport,
            parser: Parser::with_config(config.codec.clone()),
            queue,
            stop,
            chunk_size: config.read_chunk_size.max(1),
            poll_interval: config.poll_interval,
            delivered: 0,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("mfpipe-reader".into())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        debug!(transport = self.transport.kind(), "reader loop started");
        let mut chunk = vec![0u8; self.chunk_size];
        let mut failing = false;

        while !self.stopped() {
            if !self.queue.wait_for_room(IDLE_WAIT) {
                if self.queue.is_closed() {
                    break;
                }
                continue;
            }

            let read = match self.transport.read(&mut chunk) {
                Ok(0) => {
                    thread::sleep(self.poll_interval);
                    continue;
                }
                Ok(n) => n,
                Err(err) if is_transient(&err) => {
                    thread::sleep(self.poll_interval);
                    continue;
                }
                Err(err) => {
                    if !failing {
                        warn!(error = %err, "transport read failed; retrying");
                        failing = true;
                    }
                    thread::sleep(self.poll_interval);
                    continue;
                }
            };
            failing = false;
            trace!(bytes = read, "read chunk");

            if !self.feed(&chunk[..read]) {
                break;
            }
        }

        if self.parser.in_progress() {
            warn!(state = ?self.parser.state(), "discarding partially received entry");
        }
        if let Err(err) = self.transport.close() {
            warn!(error = %err, "failed to close read transport");
        }
        debug!(delivered = self.delivered, "reader loop stopped");
    }

    /// Run `data` through the parser, queueing every completed entry.
    /// Returns `false` once the loop should stop.
    fn feed(&mut self, mut data: &[u8]) -> bool {
        while !data.is_empty() {
            let used = self.parser.parse(data);
            data = &data[used..];

            for discarded in self.parser.drain_discarded() {
                warn!(error = %discarded.error, "dropping oversized entry");
                match discarded.tag {
                    Some(TypeTag::Message) => self.queue.note_dropped::<Message>(),
                    _ => self.queue.note_dropped::<Payload>(),
                }
            }

            let tag = self.parser.type_tag();
            match self.parser.take_entry() {
                None => {}
                Some(Ok(entry)) => {
                    if !self.deliver(entry) {
                        return false;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "dropping malformed entry");
                    match tag {
                        Some(TypeTag::Message) => self.queue.note_dropped::<Message>(),
                        _ => self.queue.note_dropped::<Payload>(),
                    }
                }
            }
        }
        true
    }

    fn deliver(&mut self, mut entry: Entry) -> bool {
        loop {
            match self.queue.offer(entry, IDLE_WAIT) {
                Ok(()) => {
                    self.delivered += 1;
                    return true;
                }
                Err(rejected) => {
                    if self.stopped() || self.queue.is_closed() {
                        warn!(channel = %rejected.channel, "dropping received entry on stop");
                        return false;
                    }
                    entry = rejected;
                }
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
