use crate::frame_codec::Frame;
use bytes::Bytes;
use smoke_core::StreamId;
use std::net::SocketAddr;

/// A message about to be sent: the stream it travels on plus its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Target stream.
    pub stream_id: StreamId,
    /// Bytes to send.
    pub payload: Bytes,
}

impl OutgoingMessage {
    /// Message for `stream_id`.
    pub fn new(stream_id: StreamId, payload: impl Into<Bytes>) -> Self {
        Self { stream_id, payload: payload.into() }
    }
}

/// A delivered message, stamped with the association peer it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Stream it arrived on.
    pub stream_id: StreamId,
    /// Received bytes.
    pub payload: Bytes,
    /// Address of the sending side.
    pub peer: SocketAddr,
}

impl IncomingMessage {
    /// Attach the peer address to a decoded frame.
    pub fn from_frame(frame: Frame, peer: SocketAddr) -> Self {
        Self { stream_id: frame.stream_id, payload: frame.payload, peer }
    }
}
