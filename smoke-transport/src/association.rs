use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use smoke_stream::{FrameCodec, IncomingMessage, OutgoingMessage};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

/// A live connection between one listener-side and one connector-side socket.
///
/// Owned by the task that created it. [`Association::close`] may succeed only
/// once; any later send, receive or close returns [`Error::AlreadyClosed`].
/// Dropping an unclosed association releases the socket as well.
#[derive(Debug)]
pub struct Association {
    framed: Option<Framed<TcpStream, FrameCodec>>,
    local: SocketAddr,
    peer: SocketAddr,
}

impl Association {
    pub(crate) fn new(stream: TcpStream, max_payload: usize) -> Result<Self> {
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true).ok();
        Ok(Self { framed: Some(Framed::new(stream, FrameCodec::new(max_payload))), local, peer })
    }

    /// Our end of the connection.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The other end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether [`Association::close`] already ran.
    pub fn is_closed(&self) -> bool {
        self.framed.is_none()
    }

    fn framed(&mut self) -> Result<&mut Framed<TcpStream, FrameCodec>> {
        self.framed.as_mut().ok_or(Error::AlreadyClosed)
    }

    /// Send one message and flush it to the socket.
    pub async fn send(&mut self, message: OutgoingMessage) -> Result<()> {
        let (stream, len) = (message.stream_id, message.payload.len());
        self.framed()?.send(message).await?;
        debug!(peer = %self.peer, %stream, len, "message sent");
        Ok(())
    }

    /// Wait for exactly one message on any stream.
    ///
    /// Returns [`Error::PeerClosed`] as soon as the peer closes without
    /// sending, rather than waiting further.
    pub async fn receive(&mut self) -> Result<IncomingMessage> {
        let peer = self.peer;
        match self.framed()?.next().await {
            Some(Ok(frame)) => {
                let message = IncomingMessage::from_frame(frame, peer);
                debug!(%peer, stream = %message.stream_id, len = message.payload.len(), "message received");
                Ok(message)
            }
            Some(Err(e)) => Err(Error::Receive(e)),
            None => Err(Error::PeerClosed { peer }),
        }
    }

    /// Shut down the write half; the peer sees end-of-stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        let stream = self.framed()?.get_mut();
        match stream.shutdown().await {
            Err(e) if !peer_gone(e.kind()) => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Shut the socket down and release it.
    pub async fn close(&mut self) -> Result<()> {
        let framed = self.framed.take().ok_or(Error::AlreadyClosed)?;
        let mut stream = framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            if !peer_gone(e.kind()) {
                return Err(e.into());
            }
        }
        debug!(peer = %self.peer, "association closed");
        Ok(())
    }
}

/// The peer already tore the connection down; nothing left to release.
fn peer_gone(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::NotConnected | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
}
