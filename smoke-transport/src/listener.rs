//! Listening side: bind a well-known address, accept exactly one association.
use crate::{association::Association, Error, Result};
use smoke_core::EndpointAddress;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

const BACKLOG: i32 = 16;

/// Server role: a bound listening socket that hands out one association.
pub struct Listener {
	inner: TcpListener,
	local: SocketAddr,
	max_payload: usize,
}

impl Listener {
	/// Reserve `addr` for incoming associations.
	///
	/// Must run inside a tokio runtime. `SO_REUSEADDR` is set (except on
	/// Windows, where it would permit a second concurrent bind) so a
	/// sequential run can rebind the same fixed port right away. A host name
	/// goes through the blocking system resolver; async callers resolve it
	/// with [`crate::lookup`] first.
	pub fn bind(addr: &EndpointAddress, max_payload: usize) -> Result<Self> {
		let target = addr.resolve()?;
		let std_listener = open_listening_socket(target).map_err(|e| bind_error(target, e))?;
		let inner = TcpListener::from_std(std_listener).map_err(|e| bind_error(target, e))?;
		let local = inner.local_addr()?;
		info!(%local, "listener bound");
		Ok(Self { inner, local, max_payload })
	}

	/// Address actually bound, with the real port when 0 was requested.
	pub fn local_addr(&self) -> SocketAddr {
		self.local
	}

	/// Suspend until one association arrives. The listening socket is
	/// released on return, so the port is free for the next run.
	pub async fn accept_one(self) -> Result<Association> {
		debug!(local = %self.local, "waiting for association");
		let (stream, peer) = self.inner.accept().await?;
		info!(%peer, "association accepted");
		Association::new(stream, self.max_payload)
	}
}

fn open_listening_socket(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
	let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
	#[cfg(not(windows))]
	socket.set_reuse_address(true)?;
	socket.bind(&addr.into())?;
	socket.listen(BACKLOG)?;
	socket.set_nonblocking(true)?;
	Ok(socket.into())
}

fn bind_error(addr: SocketAddr, source: std::io::Error) -> Error {
	match source.kind() {
		ErrorKind::AddrInUse => Error::AddressInUse { addr },
		ErrorKind::PermissionDenied => Error::PermissionDenied { addr },
		_ => Error::Bind { addr, source },
	}
}
