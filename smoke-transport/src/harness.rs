//! Scenario driver.
//!
//! Runs the listener and connector roles as two tokio tasks, joins both and
//! folds their results into a single [`Report`] or [`HarnessError`]. The
//! driver walks a fixed state machine:
//!
//! ```text
//! NotStarted -> ListenerStarting -> ConnectorAttempting -> Exchanging -> Verifying -> Succeeded
//!      \________________\____________________\__________________\___________\-> Failed
//! ```
//!
//! A run that carries no message goes from `ConnectorAttempting` straight to
//! `Succeeded`; an unverified run skips `Verifying`.
//!
//! The only state shared between the tasks is the readiness latch (when the
//! scenario uses one); each task owns its association.

use crate::{
    association::Association,
    connector::{lookup, verify, verify_stream, Connector, Established, RetryPolicy},
    listener::Listener,
    readiness::{readiness_latch, ReadySignal},
    Error,
};
use bytes::Bytes;
use smoke_core::{EndpointAddress, MessageFlow, Readiness, ScenarioConfig, StreamId, Variant};
use smoke_stream::{OutgoingMessage, TextCodec};
use std::fmt;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, warn, Instrument};

/// Phase of a scenario run, as tracked by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    /// Nothing launched yet; config and payload are checked here.
    NotStarted,
    /// Listener task spawned, waiting for it to bind.
    ListenerStarting,
    /// Connector task dialing.
    ConnectorAttempting,
    /// Association up, the message is in flight.
    Exchanging,
    /// Received message compared against the expected one.
    Verifying,
    /// Terminal: exit code 0.
    Succeeded,
    /// Terminal: the run stopped on an error.
    Failed,
}

impl HarnessState {
    /// `Succeeded` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, HarnessState::Succeeded | HarnessState::Failed)
    }

    /// Whether the driver may move from `self` to `next`.
    pub fn can_advance_to(self, next: HarnessState) -> bool {
        use HarnessState::*;
        match (self, next) {
            (Succeeded | Failed, _) => false,
            (_, Failed) => true,
            (NotStarted, ListenerStarting)
            | (ListenerStarting, ConnectorAttempting)
            | (ConnectorAttempting, Exchanging)
            | (Exchanging, Verifying)
            | (Verifying, Succeeded) => true,
            // no message, or a message that is only reported
            (ConnectorAttempting | Exchanging, Succeeded) => true,
            _ => false,
        }
    }
}

/// Which party a failure or delivery belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The scenario driver itself.
    Driver,
    /// The task that binds and accepts.
    Listener,
    /// The task that dials.
    Connector,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Driver => "driver",
            Role::Listener => "listener",
            Role::Connector => "connector",
        })
    }
}

/// Terminal failure of a scenario: which role failed, in which state, and why.
#[derive(Debug, thiserror::Error)]
#[error("{role} failed while {state:?}: {source}")]
pub struct HarnessError {
    /// Last state reached before the failure.
    pub state: HarnessState,
    /// Party that failed.
    pub role: Role,
    /// Underlying error.
    #[source]
    pub source: Error,
}

/// The message one side received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Side that received the message.
    pub receiver: Role,
    /// Stream the message arrived on.
    pub stream_id: StreamId,
    /// Decoded payload.
    pub text: String,
    /// False when the scenario only reports the text without comparing it.
    pub verified: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Preset the config was built from.
    pub variant: Variant,
    /// Connect attempts the connector spent, including the successful one.
    pub attempts: u32,
    /// The message exchanged, if the scenario carries one.
    pub delivery: Option<Delivery>,
    /// Every state the driver passed through, starting after `NotStarted`.
    pub trace: Vec<HarnessState>,
}

impl Report {
    /// One-line confirmation printed on success.
    pub fn confirmation(&self) -> String {
        match &self.delivery {
            Some(d) => format!("STREAM: {}: {}", d.stream_id, d.text),
            None => "Test success".to_string(),
        }
    }
}

/// Error tagged with the state it interrupted, produced inside a role task.
#[derive(Debug)]
struct Failure {
    state: HarnessState,
    error: Error,
}

impl Failure {
    fn at(state: HarnessState) -> impl FnOnce(Error) -> Failure {
        move |error| Failure { state, error }
    }
}

struct ConnectorOutcome {
    attempts: u32,
    delivery: Option<Delivery>,
}

/// Drives one scenario from `NotStarted` to a terminal state.
pub struct Harness {
    config: ScenarioConfig,
    state: HarnessState,
    trace: Vec<HarnessState>,
}

impl Harness {
    /// Driver for `config`; nothing runs until [`Harness::run`].
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config, state: HarnessState::NotStarted, trace: Vec::new() }
    }

    /// Current state.
    pub fn state(&self) -> HarnessState {
        self.state
    }

    fn advance(&mut self, next: HarnessState) {
        debug_assert!(self.state.can_advance_to(next), "{:?} -> {:?}", self.state, next);
        tracing::debug!(from = ?self.state, to = ?next, "harness state");
        self.state = next;
        self.trace.push(next);
    }

    fn fail(&mut self, role: Role, state: HarnessState, source: Error) -> HarnessError {
        warn!(%role, ?state, error = %source, "scenario failed");
        self.advance(HarnessState::Failed);
        HarnessError { state, role, source }
    }

    fn fail_with(&mut self, role: Role, failure: Failure) -> HarnessError {
        self.fail(role, failure.state, failure.error)
    }

    /// Run the scenario to a terminal state.
    pub async fn run(mut self) -> Result<Report, HarnessError> {
        let cfg = self.config.clone();
        let address = cfg.address();
        cfg.validate().map_err(|e| self.fail(Role::Driver, HarnessState::NotStarted, e.into()))?;

        // Oversized payloads are refused here, before anything is bound.
        let payload = if cfg.flow.carries_message() {
            TextCodec::new(cfg.buffer_size)
                .encode(&cfg.payload)
                .map_err(|e| self.fail(Role::Driver, HarnessState::NotStarted, e.into()))?
        } else {
            Bytes::new()
        };

        self.advance(HarnessState::ListenerStarting);
        let (signal, waiter) = match cfg.readiness {
            Readiness::Latch => {
                let (signal, waiter) = readiness_latch();
                (Some(signal), Some(waiter))
            }
            Readiness::Poll => (None, None),
        };
        let mut listener = tokio::spawn(
            listener_role(cfg.clone(), signal, payload.clone())
                .instrument(info_span!("listener", addr = %address)),
        );

        let dial = match waiter {
            Some(waiter) => match waiter.wait().await {
                Ok(bound) => address.with_port(bound.port()),
                Err(aborted) => {
                    // The listener's own error explains why the latch was never released.
                    let reached = self.state;
                    return Err(match join_role(&mut listener, reached).await {
                        Err(failure) => self.fail_with(Role::Listener, failure),
                        Ok(_) => self.fail(Role::Listener, reached, aborted),
                    });
                }
            },
            None => address.clone(),
        };

        self.advance(HarnessState::ConnectorAttempting);
        let mut connector = tokio::spawn(
            connector_role(cfg.clone(), dial.clone(), payload)
                .instrument(info_span!("connector", addr = %dial)),
        );

        let reached = self.state;
        let (listener_delivery, connector_result) = tokio::select! {
            joined = &mut listener => match joined_role(joined, reached) {
                Err(failure) => {
                    // Without our listener the connector may be talking to
                    // whoever holds the port, and could wait there forever.
                    connector.abort();
                    return Err(self.fail_with(Role::Listener, failure));
                }
                Ok(delivery) => (delivery, join_role(&mut connector, reached).await),
            },
            joined = &mut connector => {
                let connector_result = joined_role(joined, reached);
                if connector_result.is_err() && !listener.is_finished() {
                    // Nothing will ever reach the pending accept.
                    listener.abort();
                }
                let delivery = match (&mut listener).await {
                    Err(e) if e.is_cancelled() => None,
                    joined => joined_role(joined, reached)
                        .map_err(|failure| self.fail_with(Role::Listener, failure))?,
                };
                (delivery, connector_result)
            }
        };
        let outcome = connector_result.map_err(|failure| self.fail_with(Role::Connector, failure))?;

        if cfg.flow.carries_message() {
            self.advance(HarnessState::Exchanging);
            if cfg.verify {
                self.advance(HarnessState::Verifying);
            }
        }
        self.advance(HarnessState::Succeeded);
        let report = Report {
            variant: cfg.variant,
            attempts: outcome.attempts,
            delivery: outcome.delivery.or(listener_delivery),
            trace: self.trace,
        };
        info!(attempts = report.attempts, "{}", report.confirmation());
        Ok(report)
    }
}

/// Run one scenario with the given configuration.
pub async fn run_scenario(config: &ScenarioConfig) -> Result<Report, HarnessError> {
    Harness::new(config.clone()).run().await
}

/// A task that panicked is charged to the state the driver had reached.
fn joined_role<T>(joined: Result<Result<T, Failure>, JoinError>, reached: HarnessState) -> Result<T, Failure> {
    joined.unwrap_or_else(|e| Err(Failure::at(reached)(e.into())))
}

async fn join_role<T>(handle: &mut JoinHandle<Result<T, Failure>>, reached: HarnessState) -> Result<T, Failure> {
    joined_role(handle.await, reached)
}

async fn listener_role(
    cfg: ScenarioConfig,
    signal: Option<ReadySignal>,
    payload: Bytes,
) -> Result<Option<Delivery>, Failure> {
    let local = lookup(&cfg.address()).await.map_err(Failure::at(HarnessState::ListenerStarting))?;
    let listener = Listener::bind(&EndpointAddress::from(local), cfg.buffer_size)
        .map_err(Failure::at(HarnessState::ListenerStarting))?;
    if let Some(signal) = signal {
        signal.release(listener.local_addr());
    }
    let mut association = listener
        .accept_one()
        .await
        .map_err(Failure::at(HarnessState::ConnectorAttempting))?;

    let delivery = match cfg.flow {
        MessageFlow::ListenerToConnector => {
            association
                .send(OutgoingMessage::new(cfg.stream_id, payload))
                .await
                .map_err(Failure::at(HarnessState::Exchanging))?;
            None
        }
        MessageFlow::ConnectorToListener => Some(receive_expected(&mut association, &cfg, Role::Listener).await?),
        MessageFlow::None => {
            association.shutdown().await.map_err(Failure::at(HarnessState::Exchanging))?;
            None
        }
    };
    association.close().await.map_err(Failure::at(HarnessState::Exchanging))?;
    Ok(delivery)
}

async fn connector_role(
    cfg: ScenarioConfig,
    dial: EndpointAddress,
    payload: Bytes,
) -> Result<ConnectorOutcome, Failure> {
    let connector = Connector::new(RetryPolicy::from_config(&cfg), cfg.buffer_size);
    let Established { mut association, attempts } = connector
        .connect_with_retry(&dial)
        .await
        .map_err(Failure::at(HarnessState::ConnectorAttempting))?;

    let delivery = match cfg.flow {
        MessageFlow::ListenerToConnector => Some(receive_expected(&mut association, &cfg, Role::Connector).await?),
        MessageFlow::ConnectorToListener => {
            association
                .send(OutgoingMessage::new(cfg.stream_id, payload))
                .await
                .map_err(Failure::at(HarnessState::Exchanging))?;
            None
        }
        MessageFlow::None => None,
    };
    association.close().await.map_err(Failure::at(HarnessState::Exchanging))?;
    Ok(ConnectorOutcome { attempts, delivery })
}

async fn receive_expected(
    association: &mut Association,
    cfg: &ScenarioConfig,
    receiver: Role,
) -> Result<Delivery, Failure> {
    let message = association.receive().await.map_err(Failure::at(HarnessState::Exchanging))?;
    if cfg.verify {
        verify_stream(message.stream_id, cfg.stream_id).map_err(Failure::at(HarnessState::Verifying))?;
        verify(&message.payload, cfg.payload.as_bytes()).map_err(Failure::at(HarnessState::Verifying))?;
    }
    let text = TextCodec::new(cfg.buffer_size)
        .decode(&message.payload)
        .map_err(|e| Failure::at(HarnessState::Exchanging)(Error::Receive(e)))?;
    Ok(Delivery { receiver, stream_id: message.stream_id, text, verified: cfg.verify })
}
