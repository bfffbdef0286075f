#![forbid(unsafe_code)]

use crate::{
    errors::{Error, Result},
    message::OutgoingMessage,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use smoke_core::StreamId;
use tokio_util::codec::{Decoder, Encoder};

/// Bytes of the big-endian length prefix.
pub const LEN_PREFIX: usize = 4;
/// Bytes of the stream identifier that opens every frame body.
pub const STREAM_ID_LEN: usize = 2;

/// One message as it sits on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream the frame belongs to.
    pub stream_id: StreamId,
    /// Message bytes.
    pub payload: Bytes,
}

/// Length-prefixed (u32 big-endian) frame: u16 stream id followed by the payload.
///
/// Both directions enforce `max_payload`; an oversized declared length is
/// rejected before its body is buffered.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    /// Codec bounded to `max_payload` payload bytes per frame.
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Payload bound.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn max_body(&self) -> usize {
        STREAM_ID_LEN + self.max_payload
    }

    /// Append one frame to `dst`, or fail if the payload is over the bound.
    pub fn encode_frame(&self, stream_id: StreamId, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(Error::PayloadTooLarge { len: payload.len(), max: self.max_payload });
        }
        let body = STREAM_ID_LEN + payload.len();
        let body_len = u32::try_from(body).map_err(|_| Error::protocol("frame too large"))?;
        dst.reserve(LEN_PREFIX + body);
        dst.put_u32(body_len);
        dst.put_u16(stream_id.get());
        dst.extend_from_slice(payload);
        Ok(())
    }

    /// Take one complete frame off the front of `src`, if there is one.
    pub fn decode_frame(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }
        let mut len_bytes = &src[..LEN_PREFIX];
        let len = len_bytes.get_u32() as usize;
        if len > self.max_body() {
            return Err(Error::FrameTooLarge { len, max: self.max_body() });
        }
        if len < STREAM_ID_LEN {
            return Err(Error::protocol(format!("frame body of {len} bytes has no stream id")));
        }
        if src.len() < LEN_PREFIX + len {
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }
        src.advance(LEN_PREFIX);
        let mut body = src.split_to(len);
        let stream_id = StreamId::new(body.get_u16());
        tracing::trace!(stream = %stream_id, len = body.len(), "decoded frame");
        Ok(Some(Frame { stream_id, payload: body.freeze() }))
    }
}

impl Encoder<OutgoingMessage> for FrameCodec {
    type Error = Error;
    fn encode(&mut self, item: OutgoingMessage, dst: &mut BytesMut) -> core::result::Result<(), Self::Error> {
        self.encode_frame(item.stream_id, &item.payload, dst)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;
    fn decode(&mut self, src: &mut BytesMut) -> core::result::Result<Option<Self::Item>, Self::Error> {
        self.decode_frame(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> core::result::Result<Option<Self::Item>, Self::Error> {
        match self.decode_frame(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::protocol(format!("connection closed inside a frame ({} bytes pending)", src.len()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let codec = FrameCodec::new(60);
        let mut buf = BytesMut::new();
        codec.encode_frame(StreamId::new(7), b"hello", &mut buf).unwrap();
        assert_eq!(&buf[..6], &[0, 0, 0, 7, 0, 7]);
        let got = codec.decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(got.stream_id, StreamId::new(7));
        assert_eq!(got.payload, Bytes::from_static(b"hello"));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_read() {
        let codec = FrameCodec::new(60);
        let mut buf = BytesMut::new();
        codec.encode_frame(StreamId::PRIMARY, b"abc", &mut buf).unwrap();
        // Split header and body
        let header = buf.split_to(LEN_PREFIX);
        let mut acc = BytesMut::new();
        acc.extend_from_slice(&header);
        assert!(codec.decode_frame(&mut acc).unwrap().is_none());
        acc.extend_from_slice(&buf);
        let got = codec.decode_frame(&mut acc).unwrap().unwrap();
        assert_eq!(got.payload, Bytes::from_static(b"abc"));
    }

    #[test]
    fn too_large_rejected() {
        let codec = FrameCodec::new(60);
        let mut acc = BytesMut::new();
        acc.put_u32(u32::MAX);
        // Supply a small body; decode should reject early on length check
        acc.extend_from_slice(&[0u8; 4]);
        let err = codec.decode_frame(&mut acc).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { max: 62, .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn encode_over_bound_rejected() {
        let codec = FrameCodec::new(4);
        let mut buf = BytesMut::new();
        let err = codec.encode_frame(StreamId::PRIMARY, b"12345", &mut buf).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len: 5, max: 4 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn body_without_stream_id_rejected() {
        let codec = FrameCodec::new(60);
        let mut acc = BytesMut::new();
        acc.put_u32(1);
        acc.put_u8(0);
        assert!(matches!(codec.decode_frame(&mut acc), Err(Error::Protocol(_))));
    }

    #[test]
    fn eof_inside_frame_is_protocol_error() {
        let mut codec = FrameCodec::new(60);
        let mut acc = BytesMut::new();
        acc.put_u32(10);
        acc.put_u16(0);
        assert!(matches!(codec.decode_eof(&mut acc), Err(Error::Protocol(_))));
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn multi_concat_decode() {
        let codec = FrameCodec::new(60);
        let mut buf = BytesMut::new();
        codec.encode_frame(StreamId::new(1), b"A", &mut buf).unwrap();
        codec.encode_frame(StreamId::new(2), b"BB", &mut buf).unwrap();
        let got1 = codec.decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(got1.stream_id.get(), 1);
        let got2 = codec.decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(got2.stream_id.get(), 2);
        assert!(codec.decode_frame(&mut buf).unwrap().is_none());
    }

    use proptest::prelude::*;
    proptest! {
        #[test]
        fn prop_stream_id_and_payload_preserved(stream_id in any::<u16>(), data in proptest::collection::vec(any::<u8>(), 0..=60)) {
            let codec = FrameCodec::new(60);
            let mut buf = BytesMut::new();
            codec.encode_frame(StreamId::new(stream_id), &data, &mut buf).unwrap();
            let got = codec.decode_frame(&mut buf).unwrap().unwrap();
            prop_assert_eq!(got.stream_id.get(), stream_id);
            prop_assert_eq!(&got.payload[..], &data[..]);
        }
    }
}
