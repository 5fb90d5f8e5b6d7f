use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use mfpipe_frame::{encode_entry, Item, Message, Payload};
use mfpipe_transport::{is_transient, Transport};
use tracing::{debug, trace, warn};

use crate::config::PipeConfig;
use crate::queue::ChannelQueue;
use crate::reader::IDLE_WAIT;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Drains the write queue onto a transport, payloads before messages.
///
/// After the stop flag is raised the loop keeps writing until the queue is
/// empty or `drain_timeout` passes; whatever is left is dropped and counted.
pub(crate) struct WriterLoop {
    transport: Box<dyn Transport>,
    queue: Arc<ChannelQueue>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    drain_timeout: Duration,
    drain_deadline: Option<Instant>,
}

impl WriterLoop {
    pub fn new(
        transport: Box<dyn Transport>,
        queue: Arc<ChannelQueue>,
        stop: Arc<AtomicBool>,
        config: &PipeConfig,
    ) -> Self {
        Self {
            transport,
            queue,
            stop,
            poll_interval: config.poll_interval,
            drain_timeout: config.drain_timeout,
            drain_deadline: None,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("mfpipe-writer".into())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        debug!(transport = self.transport.kind(), "writer loop started");
        let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        let mut written = 0u64;

        loop {
            let stopping = self.observe_stop();
            if self.drain_expired() {
                break;
            }

            let Some(entry) = self.queue.pop_outgoing() else {
                if stopping {
                    break;
                }
                self.queue.wait_outgoing(IDLE_WAIT);
                continue;
            };

            buf.clear();
            encode_entry(&entry, &mut buf);
            if !self.write_all(&buf) {
                warn!(
                    channel = %entry.channel,
                    "drain timeout expired while writing; entry abandoned"
                );
                match entry.item {
                    Item::Payload(_) => self.queue.note_dropped::<Payload>(),
                    Item::Message(_) => self.queue.note_dropped::<Message>(),
                }
                break;
            }
            trace!(channel = %entry.channel, bytes = buf.len(), "entry written");
            written += 1;
        }

        let dropped = self.queue.discard_all();
        if dropped > 0 {
            warn!(dropped, "write queue not drained before timeout");
        }
        if let Err(err) = self.transport.close() {
            warn!(error = %err, "failed to close write transport");
        }
        debug!(written, "writer loop stopped");
    }

    /// Write every byte of `bytes`, retrying while the transport is not
    /// ready. Returns `false` if the drain deadline passes first.
    fn write_all(&mut self, bytes: &[u8]) -> bool {
        let mut offset = 0;
        let mut failing = false;
        while offset < bytes.len() {
            match self.transport.write(&bytes[offset..]) {
                Ok(n) if n > 0 => {
                    offset += n;
                    continue;
                }
                Ok(_) => {}
                Err(err) if is_transient(&err) => {}
                Err(err) => {
                    if !failing {
                        warn!(error = %err, "transport write failed; retrying");
                        failing = true;
                    }
                }
            }

            self.observe_stop();
            if self.drain_expired() {
                return false;
            }
            thread::sleep(self.poll_interval);
        }
        true
    }

    /// Start the drain clock the first time the stop flag is seen.
    fn observe_stop(&mut self) -> bool {
        let stopping = self.stop.load(Ordering::Acquire);
        if stopping && self.drain_deadline.is_none() {
            self.drain_deadline = Some(Instant::now() + self.drain_timeout);
        }
        stopping
    }

    fn drain_expired(&self) -> bool {
        self.drain_deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use mfpipe_frame::{decode_entry, Buffer, BufferFlags, CodecConfig, Entry, Parser};

    use super::*;
    use crate::testing::MemoryTransport;

    fn start(
        transport: MemoryTransport,
        depth: usize,
        config: PipeConfig,
    ) -> (Arc<ChannelQueue>, Arc<AtomicBool>, JoinHandle<()>) {
        let queue = Arc::new(ChannelQueue::new(depth));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = WriterLoop::new(
            Box::new(transport),
            Arc::clone(&queue),
            Arc::clone(&stop),
            &config,
        )
        .spawn()
        .unwrap();
        (queue, stop, handle)
    }

    fn decode_stream(mut bytes: &[u8]) -> Vec<Entry> {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        while !bytes.is_empty() {
            let used = parser.parse(bytes);
            bytes = &bytes[used..];
            if let Some(entry) = parser.take_entry() {
                out.push(entry.unwrap());
            }
        }
        out
    }

    #[test]
    fn partial_writes_are_completed() {
        let transport = MemoryTransport::new().choppy(5);
        let wire = transport.clone();
        let (queue, stop, handle) = start(transport, 8, PipeConfig::default());

        let entry = Entry::payload("ch", Buffer::new(BufferFlags::VIDEO_DATA, vec![9u8; 40]));
        queue.push(entry.clone(), Duration::from_secs(1)).unwrap();

        stop.store(true, Ordering::Release);
        queue.close();
        handle.join().unwrap();

        let bytes = wire.contents();
        let (decoded, consumed) = decode_entry(&bytes, &CodecConfig::default()).unwrap();
        assert_eq!(decoded.unwrap(), entry);
        assert_eq!(consumed, bytes.len());
        assert!(wire.write_calls() > bytes.len() / 5);
        assert!(wire.is_closed());
    }

    #[test]
    fn close_drains_queue_in_priority_order() {
        let wire = MemoryTransport::new();
        let queue = Arc::new(ChannelQueue::new(8));
        queue
            .push(Entry::message("a", Message::new("m1", "")), Duration::ZERO)
            .unwrap();
        queue
            .push(Entry::payload("a", Buffer::default()), Duration::ZERO)
            .unwrap();
        queue
            .push(Entry::message("b", Message::new("m2", "")), Duration::ZERO)
            .unwrap();

        let stop = Arc::new(AtomicBool::new(true));
        queue.close();
        WriterLoop::new(
            Box::new(wire.clone()),
            Arc::clone(&queue),
            stop,
            &PipeConfig::default(),
        )
        .run();

        let decoded = decode_stream(&wire.contents());
        assert_eq!(
            decoded,
            vec![
                Entry::payload("a", Buffer::default()),
                Entry::message("a", Message::new("m1", "")),
                Entry::message("b", Message::new("m2", "")),
            ]
        );
    }

    #[test]
    fn stalled_transport_gives_up_after_drain_timeout() {
        let transport = MemoryTransport::new().stalled();
        let observer = transport.clone();
        let config = PipeConfig {
            drain_timeout: Duration::from_millis(50),
            ..PipeConfig::default()
        };
        let (queue, stop, handle) = start(transport, 4, config);
        for i in 0u8..3 {
            queue
                .push(
                    Entry::payload("", Buffer::new(BufferFlags::BUFFER, vec![i])),
                    Duration::from_secs(1),
                )
                .unwrap();
        }

        let started = Instant::now();
        stop.store(true, Ordering::Release);
        queue.close();
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(observer.contents().is_empty());
        assert!(observer.is_closed());
        let (objects, _, _) = queue.stats("");
        assert_eq!(objects.have, 0);
        assert_eq!(objects.dropped, 3);
    }
}
