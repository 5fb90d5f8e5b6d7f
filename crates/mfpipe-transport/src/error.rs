use std::time::Duration;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The identifier does not name a usable endpoint.
    #[error("invalid endpoint '{id}': {reason}")]
    InvalidEndpoint { id: String, reason: String },

    /// Failed to provision the underlying resource (FIFO file, socket).
    #[error("failed to create {id}: {source}")]
    Create {
        id: String,
        source: std::io::Error,
    },

    /// Failed to open or bind the endpoint.
    #[error("failed to open {id}: {source}")]
    Open {
        id: String,
        source: std::io::Error,
    },

    /// The endpoint did not become available before the deadline.
    #[error("timed out after {waited:?} opening {id}")]
    Timeout { id: String, waited: Duration },

    /// The backend is not available on this platform.
    #[error("{0} transport is not supported on this platform")]
    Unsupported(&'static str),

    /// An I/O error occurred on an open transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
