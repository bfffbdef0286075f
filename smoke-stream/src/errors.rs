/// Result alias for this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Framing and text-codec failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Socket read or write failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Rejected at encode time; payloads are never truncated to fit.
    #[error("payload of {len} bytes exceeds the {max}-byte buffer")]
    PayloadTooLarge { len: usize, max: usize },
    /// Incoming frame declares a body over the receive bound.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },
    /// Payload bytes are not UTF-8.
    #[error("payload is not valid text: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
    /// Malformed frame.
    #[error("protocol: {0}")]
    Protocol(String),
}

impl Error {
    /// [`Error::Protocol`] from a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
