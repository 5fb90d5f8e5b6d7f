//! Byte transports beneath the mfpipe protocol.
//!
//! Two backends satisfy the [`Transport`] capability:
//! - Named pipes (FIFOs, Unix)
//! - UDP datagrams (`udp://<ipv4>:<port>`)
//!
//! Both are non-blocking: reads and writes report "not ready" instead of
//! parking the caller, and the pipe loops above retry.

pub mod endpoint;
pub mod error;
pub mod fifo;
pub mod traits;
pub mod udp;

pub use endpoint::{open_transport, Endpoint, UDP_SCHEME};
pub use error::{Result, TransportError};
pub use fifo::NamedPipe;
pub use traits::{is_transient, Mode, Transport};
pub use udp::UdpTransport;
