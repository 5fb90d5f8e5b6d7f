//! Bounded, channel-tagged queues shared by client threads and pipe loops.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use mfpipe_frame::{Entry, Item, Message, Payload};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{PipeError, Result};
use crate::info::{FlushFlags, QueueStats};

/// One FIFO of channel-tagged values plus its counters.
#[derive(Debug)]
pub(crate) struct Lane<T> {
    entries: VecDeque<(String, T)>,
    dropped: u64,
    flushed: u64,
}

impl<T> Default for Lane<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            dropped: 0,
            flushed: 0,
        }
    }
}

impl<T> Lane<T> {
    fn position(&self, channel: &str, index: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (ch, _))| ch == channel)
            .nth(index)
            .map(|(pos, _)| pos)
    }

    fn count(&self, channel: &str) -> usize {
        self.entries.iter().filter(|(ch, _)| ch == channel).count()
    }

    fn flush(&mut self, channel: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(ch, _)| ch != channel);
        let removed = before - self.entries.len();
        self.flushed += removed as u64;
        removed
    }

    fn stats(&self, channel: &str, max: usize) -> QueueStats {
        QueueStats {
            have: self.count(channel),
            max,
            dropped: self.dropped,
            flushed: self.flushed,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    payloads: Lane<Payload>,
    messages: Lane<Message>,
    closed: bool,
}

impl QueueState {
    fn lane_len(&self, item: &Item) -> usize {
        match item {
            Item::Payload(_) => self.payloads.entries.len(),
            Item::Message(_) => self.messages.entries.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.payloads.entries.is_empty() && self.messages.entries.is_empty()
    }
}

/// Values that live in their own lane of a [`ChannelQueue`].
pub(crate) trait Queued: Clone + Sized {
    fn lane(state: &QueueState) -> &Lane<Self>;
    fn lane_mut(state: &mut QueueState) -> &mut Lane<Self>;
}

impl Queued for Payload {
    fn lane(state: &QueueState) -> &Lane<Self> {
        &state.payloads
    }

    fn lane_mut(state: &mut QueueState) -> &mut Lane<Self> {
        &mut state.payloads
    }
}

impl Queued for Message {
    fn lane(state: &QueueState) -> &Lane<Self> {
        &state.messages
    }

    fn lane_mut(state: &mut QueueState) -> &mut Lane<Self> {
        &mut state.messages
    }
}

/// Two bounded FIFOs (payloads and messages) guarded by one mutex.
///
/// Each lane holds at most `capacity` entries across all channels. Producers
/// wait for room, consumers wait for an entry of their channel; both wait on
/// the same condition variable, notified on every change. Closing wakes all
/// waiters.
#[derive(Debug)]
pub(crate) struct ChannelQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    capacity: usize,
}

impl ChannelQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
            capacity,
        }
    }

    /// Append `entry` to its lane, waiting up to `timeout` for room.
    pub fn push(&self, entry: Entry, timeout: Duration) -> Result<()> {
        self.insert(entry, timeout).map_err(|(_, err)| err)
    }

    /// Like [`push`](Self::push) but hands the entry back when it was not
    /// accepted.
    pub fn offer(&self, entry: Entry, timeout: Duration) -> std::result::Result<(), Entry> {
        self.insert(entry, timeout).map_err(|(entry, _)| entry)
    }

    fn insert(
        &self,
        entry: Entry,
        timeout: Duration,
    ) -> std::result::Result<(), (Entry, PipeError)> {
        let capacity = self.capacity;
        let mut state = self.wait_until(deadline_after(timeout), |s| {
            s.closed || s.lane_len(&entry.item) < capacity
        });
        if state.closed {
            return Err((entry, PipeError::Closed));
        }
        if state.lane_len(&entry.item) >= capacity {
            return Err((entry, PipeError::Timeout(timeout)));
        }

        let Entry { channel, item } = entry;
        match item {
            Item::Payload(payload) => state.payloads.entries.push_back((channel, payload)),
            Item::Message(message) => state.messages.entries.push_back((channel, message)),
        }
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Remove the oldest value of `channel`, waiting up to `timeout`.
    pub fn pop<T: Queued>(&self, channel: &str, timeout: Duration) -> Result<T> {
        let mut state = self.wait_until(deadline_after(timeout), |s| {
            s.closed || T::lane(s).position(channel, 0).is_some()
        });
        if state.closed {
            return Err(PipeError::Closed);
        }
        let lane = T::lane_mut(&mut state);
        let value = lane
            .position(channel, 0)
            .and_then(|pos| lane.entries.remove(pos))
            .map(|(_, value)| value)
            .ok_or(PipeError::Timeout(timeout))?;
        drop(state);
        self.changed.notify_all();
        Ok(value)
    }

    /// Clone the `index`-th value of `channel` (0-based among that channel's
    /// entries) without removing it, waiting up to `timeout`.
    pub fn peek<T: Queued>(&self, channel: &str, index: usize, timeout: Duration) -> Result<T> {
        let state = self.wait_until(deadline_after(timeout), |s| {
            s.closed || T::lane(s).position(channel, index).is_some()
        });
        if state.closed {
            return Err(PipeError::Closed);
        }
        let lane = T::lane(&state);
        lane.position(channel, index)
            .and_then(|pos| lane.entries.get(pos))
            .map(|(_, value)| value.clone())
            .ok_or(PipeError::Timeout(timeout))
    }

    /// Wait until both lanes have room. Returns `false` on timeout or close.
    pub fn wait_for_room(&self, timeout: Duration) -> bool {
        let capacity = self.capacity;
        let state = self.wait_until(deadline_after(timeout), |s| {
            s.closed
                || (s.payloads.entries.len() < capacity && s.messages.entries.len() < capacity)
        });
        !state.closed
            && state.payloads.entries.len() < capacity
            && state.messages.entries.len() < capacity
    }

    /// Take the next entry to transmit, payloads first. Works after close.
    pub fn pop_outgoing(&self) -> Option<Entry> {
        let mut state = self.lock();
        let entry = if let Some((channel, payload)) = state.payloads.entries.pop_front() {
            Entry::payload(channel, payload)
        } else {
            let (channel, message) = state.messages.entries.pop_front()?;
            Entry::message(channel, message)
        };
        drop(state);
        self.changed.notify_all();
        Some(entry)
    }

    /// Wait until something is queued or the queue is closed.
    pub fn wait_outgoing(&self, timeout: Duration) {
        let _state = self.wait_until(deadline_after(timeout), |s| s.closed || !s.is_empty());
    }

    /// Count an entry that was discarded before reaching its lane.
    pub fn note_dropped<T: Queued>(&self) {
        T::lane_mut(&mut self.lock()).dropped += 1;
    }

    /// Discard everything still queued, counting it as dropped.
    pub fn discard_all(&self) -> usize {
        let mut state = self.lock();
        let payloads = state.payloads.entries.len();
        let messages = state.messages.entries.len();
        state.payloads.entries.clear();
        state.messages.entries.clear();
        state.payloads.dropped += payloads as u64;
        state.messages.dropped += messages as u64;
        drop(state);
        self.changed.notify_all();
        payloads + messages
    }

    /// Remove queued entries of `channel` selected by `flags`.
    pub fn flush(&self, channel: &str, flags: FlushFlags) -> usize {
        let mut state = self.lock();
        let mut removed = 0;
        if flags.objects() {
            removed += state.payloads.flush(channel);
        }
        if flags.messages() {
            removed += state.messages.flush(channel);
        }
        if flags.reset_counters() {
            let state = &mut *state;
            state.payloads.dropped = 0;
            state.payloads.flushed = 0;
            state.messages.dropped = 0;
            state.messages.flushed = 0;
        }
        drop(state);
        if removed > 0 {
            self.changed.notify_all();
        }
        removed
    }

    /// Per-lane statistics for `channel` and the number of distinct
    /// channels currently queued.
    pub fn stats(&self, channel: &str) -> (QueueStats, QueueStats, usize) {
        let state = self.lock();
        let channels: HashSet<&str> = state
            .payloads
            .entries
            .iter()
            .map(|(ch, _)| ch.as_str())
            .chain(state.messages.entries.iter().map(|(ch, _)| ch.as_str()))
            .collect();
        (
            state.payloads.stats(channel, self.capacity),
            state.messages.stats(channel, self.capacity),
            channels.len(),
        )
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.payloads.entries.len() + state.messages.entries.len()
    }

    /// Refuse further pushes and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// Block until `ready` holds or `deadline` passes, returning the guard
    /// either way. `None` waits without a deadline.
    fn wait_until<F>(&self, deadline: Option<Instant>, mut ready: F) -> MutexGuard<'_, QueueState>
    where
        F: FnMut(&QueueState) -> bool,
    {
        let mut state = self.lock();
        while !ready(&state) {
            match deadline {
                None => self.changed.wait(&mut state),
                Some(deadline) => {
                    let result = self.changed.wait_until(&mut state, deadline);
                    if result.timed_out() && !ready(&state) {
                        break;
                    }
                }
            }
        }
        state
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}
