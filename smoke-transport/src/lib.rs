//! Transport roles of the association smoke harness.
//!
//! This crate provides:
//! - [`Listener`]: binds a well-known address and accepts exactly one association
//! - [`Connector`]: dials with a fixed retry budget and fixed inter-attempt delay
//! - [`readiness_latch`]: the one-shot signal between the two roles
//! - [`harness`]: the driver that runs both roles concurrently and reports the outcome
//!
//! The byte transport underneath is the operating system's TCP stack; every
//! association carries stream-tagged messages framed by `smoke-stream`.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use thiserror::Error;

/// Open connection carrying framed messages.
pub mod association;
/// Dialing role and payload checks.
pub mod connector;
/// Scenario driver.
pub mod harness;
/// Listening role.
pub mod listener;
/// Bind-complete signal.
pub mod readiness;

/// Failures of the transport roles and their exchange.
#[derive(Error, Debug)]
pub enum Error {
    /// Another socket holds the address.
    #[error("address {addr} is already in use")]
    AddressInUse { addr: SocketAddr },
    /// Privileged port or policy refusal.
    #[error("permission denied binding {addr}")]
    PermissionDenied { addr: SocketAddr },
    /// Any other bind failure.
    #[error("bind {addr} failed: {source}")]
    Bind { addr: SocketAddr, #[source] source: std::io::Error },
    /// Nobody listening yet; the only retryable error.
    #[error("connection to {addr} refused")]
    ConnectionRefused { addr: SocketAddr },
    /// Non-retryable connect failure.
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: SocketAddr, #[source] source: std::io::Error },
    /// Every attempt was refused.
    #[error("gave up connecting to {addr} after {attempts} attempts")]
    RetryBudgetExhausted { addr: SocketAddr, attempts: u32 },
    /// The readiness signal was dropped unreleased.
    #[error("listener exited without signalling readiness")]
    ListenerAborted,
    /// End of stream before a message arrived.
    #[error("peer {peer} closed the association before a message arrived")]
    PeerClosed { peer: SocketAddr },
    /// Decoding an incoming frame failed.
    #[error("receive failed: {0}")]
    Receive(#[source] smoke_stream::Error),
    /// Received bytes differ from the expected ones.
    #[error(
        "content mismatch: expected {:?}, received {:?}",
        String::from_utf8_lossy(.expected),
        String::from_utf8_lossy(.actual)
    )]
    ContentMismatch { expected: Vec<u8>, actual: Vec<u8> },
    /// Message arrived on another stream than it was sent on.
    #[error("message expected on stream {expected}, arrived on stream {actual}")]
    StreamMismatch { expected: smoke_core::StreamId, actual: smoke_core::StreamId },
    /// Use of an association after [`Association::close`].
    #[error("association already closed")]
    AlreadyClosed,
    /// Framing or payload-bound error.
    #[error(transparent)]
    Stream(#[from] smoke_stream::Error),
    /// Config or address error.
    #[error(transparent)]
    Core(#[from] smoke_core::Error),
    /// A role task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Other socket error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Only a refused connection is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConnectionRefused { .. })
    }

    /// The transport worked but delivered the wrong thing.
    pub fn is_content_failure(&self) -> bool {
        matches!(self, Error::ContentMismatch { .. } | Error::StreamMismatch { .. })
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use association::Association;
pub use connector::{lookup, verify, verify_stream, Connector, Established, RetryPolicy};
pub use harness::{run_scenario, Delivery, Harness, HarnessError, HarnessState, Report, Role};
pub use listener::Listener;
pub use readiness::{readiness_latch, ReadySignal, ReadyWaiter};
