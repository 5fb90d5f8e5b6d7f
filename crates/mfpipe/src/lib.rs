//! Multi-channel media pipes between processes.
//!
//! mfpipe moves audio/video frames, raw buffers and control messages over a
//! named pipe or UDP socket. Each entry carries a channel tag, and order is
//! kept within a channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transports (FIFOs, UDP) and identifier dispatch
//! - [`frame`]: payload types, wire codec and streaming parser
//! - [`pipe`]: the queued [`Pipe`](pipe::Pipe) facade

/// Re-export transport types.
pub mod transport {
    pub use mfpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mfpipe_frame::*;
}

/// Re-export pipe types.
pub mod pipe {
    pub use mfpipe_pipe::*;
}

pub use mfpipe_pipe::{Pipe, PipeConfig, PipeError};
