#![forbid(unsafe_code)]

use futures::{SinkExt, StreamExt};
use smoke_stream::{Error, FrameCodec, OutgoingMessage, StreamId, TextCodec};
use tokio_util::codec::Framed;

#[tokio::test]
async fn framed_pipe_preserves_stream_and_text() {
    let (a, b) = tokio::io::duplex(256);
    let mut tx = Framed::new(a, FrameCodec::new(60));
    let mut rx = Framed::new(b, FrameCodec::new(60));
    let text = TextCodec::new(60);

    tx.send(OutgoingMessage::new(StreamId::PRIMARY, text.encode("Test message").unwrap()))
        .await
        .unwrap();
    tx.send(OutgoingMessage::new(StreamId::new(5), text.encode("second").unwrap()))
        .await
        .unwrap();
    drop(tx);

    let first = rx.next().await.unwrap().unwrap();
    assert_eq!(first.stream_id, StreamId::PRIMARY);
    assert_eq!(text.decode(&first.payload).unwrap(), "Test message");

    let second = rx.next().await.unwrap().unwrap();
    assert_eq!(second.stream_id.get(), 5);
    assert_eq!(text.decode(&second.payload).unwrap(), "second");

    // Writer gone and nothing pending: clean end of stream
    assert!(rx.next().await.is_none());
}

#[tokio::test]
async fn sender_bound_stops_oversized_message() {
    let (a, _b) = tokio::io::duplex(256);
    let mut tx = Framed::new(a, FrameCodec::new(8));
    let err = tx
        .send(OutgoingMessage::new(StreamId::PRIMARY, vec![0u8; 9]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { len: 9, max: 8 }));
}

#[tokio::test]
async fn receiver_bound_is_independent_of_sender() {
    let (a, b) = tokio::io::duplex(256);
    let mut tx = Framed::new(a, FrameCodec::new(60));
    let mut rx = Framed::new(b, FrameCodec::new(4));
    tx.send(OutgoingMessage::new(StreamId::PRIMARY, vec![1u8; 10])).await.unwrap();
    let err = rx.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::FrameTooLarge { len: 12, max: 6 }));
}
