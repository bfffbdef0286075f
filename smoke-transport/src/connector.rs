//! Dialing side: bounded, fixed-delay connection retry and payload checks.
use crate::{association::Association, Error, Result};
use smoke_core::{EndpointAddress, ScenarioConfig, StreamId};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};

/// Attempt budget and the constant pause between attempts.
///
/// The delay never grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts, the first one included.
    pub max_attempts: u32,
    /// Pause after each refused attempt but the last.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Policy with an explicit budget and delay.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Budget and delay taken from a scenario config.
    pub fn from_config(cfg: &ScenarioConfig) -> Self {
        Self::new(cfg.max_attempts, cfg.retry_delay())
    }
}

/// A successful dial together with the number of attempts it took.
#[derive(Debug)]
pub struct Established {
    /// The open association.
    pub association: Association,
    /// Attempts spent, the successful one included.
    pub attempts: u32,
}

/// Client role: dials a listener under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Connector {
    policy: RetryPolicy,
    max_payload: usize,
}

impl Connector {
    /// Connector whose associations accept payloads up to `max_payload` bytes.
    pub fn new(policy: RetryPolicy, max_payload: usize) -> Self {
        Self { policy, max_payload }
    }

    /// The retry policy in use.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Dial `addr` until accepted.
    ///
    /// A refusal consumes one attempt and waits `delay` before the next one;
    /// any other failure is returned at once. Running out of attempts yields
    /// [`Error::RetryBudgetExhausted`].
    pub async fn connect_with_retry(&self, addr: &EndpointAddress) -> Result<Established> {
        let target = lookup(addr).await?;
        let max = self.policy.max_attempts;
        let mut attempts = 0;
        while attempts < max {
            attempts += 1;
            let attempt = attempts;
            debug!(attempt, max, %target, "connecting");
            match connect_once(target).await {
                Ok(stream) => {
                    let association = Association::new(stream, self.max_payload)?;
                    info!(attempt, local = %association.local_addr(), "association established");
                    return Ok(Established { association, attempts: attempt });
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, max, %target, "connection refused");
                    if attempt < max {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::RetryBudgetExhausted { addr: target, attempts })
    }
}

/// Resolve `addr` without blocking the runtime.
///
/// IP literals are parsed in place; host names go through tokio's resolver
/// and the first result wins.
pub async fn lookup(addr: &EndpointAddress) -> Result<SocketAddr> {
    if let Ok(ip) = addr.host().parse::<IpAddr>() {
        return Ok(SocketAddr::from((ip, addr.port())));
    }
    let mut found = lookup_host((addr.host(), addr.port()))
        .await
        .map_err(|e| smoke_core::Error::address(format!("invalid address {addr}: {e}")))?;
    found
        .next()
        .ok_or_else(|| smoke_core::Error::address(format!("unable to resolve {addr}")).into())
}

async fn connect_once(target: SocketAddr) -> Result<TcpStream> {
    TcpStream::connect(target).await.map_err(|source| match source.kind() {
        ErrorKind::ConnectionRefused => Error::ConnectionRefused { addr: target },
        _ => Error::Connect { addr: target, source },
    })
}

/// Byte-exact comparison of a received payload against the expected one.
pub fn verify(payload: &[u8], expected: &[u8]) -> Result<()> {
    if payload == expected {
        Ok(())
    } else {
        Err(Error::ContentMismatch { expected: expected.to_vec(), actual: payload.to_vec() })
    }
}

/// The message arrived on the stream it was sent on.
pub fn verify_stream(actual: StreamId, expected: StreamId) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::StreamMismatch { expected, actual })
    }
}
