use std::time::Duration;

use mfpipe_transport::{Mode, TransportError};

/// Errors returned by [`Pipe`](crate::Pipe) operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// Empty identifier, malformed hints or a zero queue depth.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport could not be provisioned or connected.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(#[source] TransportError),

    /// The deadline elapsed before the request could be satisfied.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The operation is not supported by this pipe.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// The pipe has been closed.
    #[error("pipe is closed")]
    Closed,

    /// The pipe was not opened for this direction.
    #[error("pipe is not open for {0}")]
    NotOpen(Mode),
}

impl From<TransportError> for PipeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidEndpoint { .. } => PipeError::InvalidArgument(err.to_string()),
            TransportError::Timeout { waited, .. } => PipeError::Timeout(waited),
            other => PipeError::ResourceUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_taxonomy() {
        let invalid = TransportError::InvalidEndpoint {
            id: String::new(),
            reason: "empty identifier".into(),
        };
        assert!(matches!(PipeError::from(invalid), PipeError::InvalidArgument(_)));

        let timeout = TransportError::Timeout {
            id: "/tmp/p".into(),
            waited: Duration::from_millis(20),
        };
        assert!(matches!(
            PipeError::from(timeout),
            PipeError::Timeout(d) if d == Duration::from_millis(20)
        ));

        let create = TransportError::Create {
            id: "/tmp/p".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let err = PipeError::from(create);
        assert!(matches!(err, PipeError::ResourceUnavailable(_)));
        assert!(err.to_string().contains("/tmp/p"));
    }
}
