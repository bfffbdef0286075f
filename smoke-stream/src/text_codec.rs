use crate::errors::{Error, Result};
use bytes::Bytes;

/// UTF-8 text <-> payload bytes, bounded by the receive buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCodec {
    max_len: usize,
}

impl TextCodec {
    /// Codec bounded to `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Byte bound.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Text to payload; oversized text is rejected, not truncated.
    pub fn encode(&self, text: &str) -> Result<Bytes> {
        let raw = text.as_bytes();
        if raw.len() > self.max_len {
            return Err(Error::PayloadTooLarge { len: raw.len(), max: self.max_len });
        }
        Ok(Bytes::copy_from_slice(raw))
    }

    /// Payload to text.
    pub fn decode(&self, payload: &[u8]) -> Result<String> {
        if payload.len() > self.max_len {
            return Err(Error::PayloadTooLarge { len: payload.len(), max: self.max_len });
        }
        Ok(std::str::from_utf8(payload)?.to_owned())
    }
}
