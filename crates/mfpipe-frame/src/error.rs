/// Errors that can occur while decoding an entry.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body ended before a field was complete.
    #[error("truncated entry body (missing {field})")]
    Truncated { field: &'static str },

    /// The body has bytes left after its last declared field.
    #[error("entry body has {0} trailing bytes")]
    TrailingBytes(usize),

    /// The type tag is not Frame (1), Buffer (2) or Message (3).
    #[error("unknown entry type tag {0}")]
    UnknownType(u8),

    /// A string field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A length prefix declares more bytes than allowed.
    #[error("declared field length {len} exceeds maximum {max}")]
    FieldTooLarge { len: u64, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
