use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Well-known port of the latched (signal + message) scenario.
pub const LATCHED_PORT: u16 = 3456;

/// Well-known port of the polling (retry-only) scenario.
pub const POLLING_PORT: u16 = 9999;

/// Receive buffer size; also the largest payload the text codec accepts.
pub const DEFAULT_BUFFER_SIZE: usize = 60;

/// Connection attempts before the connector gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fixed pause between two connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Payload exchanged by the latched scenario.
pub const TEST_MESSAGE: &str = "Test message";

/// Host both roles use unless configured otherwise.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Logical sub-channel inside an association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u16);

impl StreamId {
	/// Stream 0, the only one the scenarios exercise.
	pub const PRIMARY: StreamId = StreamId(0);

	/// Wrap a raw stream number.
	pub const fn new(id: u16) -> Self { Self(id) }

	/// The raw stream number.
	pub const fn get(self) -> u16 { self.0 }
}

impl From<u16> for StreamId {
	fn from(id: u16) -> Self { Self(id) }
}

impl fmt::Display for StreamId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Host + port pair used by the listener to bind and by the connector to dial.
///
/// The value is immutable; [`EndpointAddress::with_port`] returns a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
	host: String,
	port: u16,
}

impl EndpointAddress {
	/// Address from a host name or IP literal and a port.
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self { host: host.into(), port }
	}

	/// `127.0.0.1:port`.
	pub fn loopback(port: u16) -> Self { Self::new(LOOPBACK_HOST, port) }

	/// Host as configured.
	pub fn host(&self) -> &str { &self.host }

	/// Port as configured; 0 asks the OS for one.
	pub fn port(&self) -> u16 { self.port }

	/// Same host, different port.
	pub fn with_port(&self, port: u16) -> Self { Self::new(self.host.clone(), port) }

	/// Resolve to a concrete socket address.
	///
	/// IP literals are parsed directly so no DNS query is made for them; other
	/// hosts go through the system resolver and the first result wins. The
	/// resolver blocks, so inside a runtime only IP literals should get here.
	pub fn resolve(&self) -> Result<SocketAddr> {
		if let Ok(ip) = self.host.parse::<IpAddr>() {
			return Ok(SocketAddr::from((ip, self.port)));
		}
		let mut iter = (self.host.as_str(), self.port)
			.to_socket_addrs()
			.map_err(|e| Error::address(format!("invalid address {self}: {e}")))?;
		iter.next()
			.ok_or_else(|| Error::address(format!("unable to resolve {self}")))
	}
}

impl From<SocketAddr> for EndpointAddress {
	fn from(addr: SocketAddr) -> Self { Self::new(addr.ip().to_string(), addr.port()) }
}

impl fmt::Display for EndpointAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.host.contains(':') {
			write!(f, "[{}]:{}", self.host, self.port)
		} else {
			write!(f, "{}:{}", self.host, self.port)
		}
	}
}
