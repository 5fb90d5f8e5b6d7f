use std::net::SocketAddrV4;
use std::path::PathBuf;

use crate::error::{Result, TransportError};
use crate::fifo::NamedPipe;
use crate::traits::Transport;
use crate::udp::UdpTransport;

/// Scheme prefix selecting the UDP backend.
pub const UDP_SCHEME: &str = "udp://";

/// A parsed pipe identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem path of a named pipe.
    NamedPipe(PathBuf),
    /// `udp://<ipv4>:<port>`.
    Udp(SocketAddrV4),
}

impl Endpoint {
    /// Parse a pipe identifier.
    ///
    /// `udp://<ipv4>:<port>` selects UDP; any other non-empty string is a
    /// named-pipe path.
    pub fn parse(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(invalid(id, "identifier must not be empty"));
        }

        if let Some(rest) = id.strip_prefix(UDP_SCHEME) {
            let addr = rest
                .parse::<SocketAddrV4>()
                .map_err(|err| invalid(id, &format!("expected <ipv4>:<port> ({err})")))?;
            return Ok(Endpoint::Udp(addr));
        }

        Ok(Endpoint::NamedPipe(PathBuf::from(id)))
    }

    /// Backend name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::NamedPipe(_) => NamedPipe::KIND,
            Endpoint::Udp(_) => UdpTransport::KIND,
        }
    }

    /// Build an unopened transport for this endpoint.
    pub fn transport(&self) -> Box<dyn Transport> {
        match self {
            Endpoint::NamedPipe(path) => Box::new(NamedPipe::new(path.clone())),
            Endpoint::Udp(addr) => Box::new(UdpTransport::new(*addr)),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::NamedPipe(path) => write!(f, "{}", path.display()),
            Endpoint::Udp(addr) => write!(f, "{UDP_SCHEME}{addr}"),
        }
    }
}

/// Parse `id` and build the matching unopened transport.
pub fn open_transport(id: &str) -> Result<Box<dyn Transport>> {
    Ok(Endpoint::parse(id)?.transport())
}

fn invalid(id: &str, reason: &str) -> TransportError {
    TransportError::InvalidEndpoint {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}
