//! Queued, multi-channel media pipe.
//!
//! A [`Pipe`] moves [`Payload`]s (buffers and frames) and [`Message`]s
//! between processes over a named pipe or UDP. Client calls only touch
//! bounded in-memory queues; a reader thread and a writer thread move bytes
//! between those queues and the transport.
//!
//! Within one channel entries arrive in the order they were put. A full
//! queue makes `put` wait (and eventually time out) and makes the reader
//! stop pulling from the transport.

pub mod config;
pub mod error;
pub mod info;
pub mod pipe;
mod queue;
mod reader;
mod writer;

#[cfg(test)]
mod testing;

pub use config::{
    OpenMode, PipeConfig, DEFAULT_DRAIN_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_READ_CHUNK_SIZE,
};
pub use error::{PipeError, Result};
pub use info::{FlushFlags, PipeInfo, QueueStats};
pub use mfpipe_frame::{Buffer, BufferFlags, Frame, Message, Payload};
pub use pipe::{Pipe, DEFAULT_OPEN_TIMEOUT};
