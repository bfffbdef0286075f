// End-to-end scenarios for the association smoke harness.
//
// Each test drives a complete listener/connector pair on loopback and checks
// the outcome the packaging test runner would see.

use smoke_core::{EndpointAddress, MessageFlow, ScenarioConfig, StreamId};
use smoke_integration_tests::{fast, init_tracing, unused_port};
use smoke_stream::{OutgoingMessage, TextCodec};
use smoke_transport::{
    run_scenario, verify, Connector, Error, HarnessState, Listener, RetryPolicy, Role,
};
use std::time::Duration;

/// Scenario 1: nobody is listening, so every attempt is refused.
#[tokio::test]
async fn unanswered_connector_exhausts_budget() {
    init_tracing();
    let addr = EndpointAddress::loopback(unused_port());
    let connector = Connector::new(RetryPolicy::new(5, Duration::from_millis(20)), 60);

    let err = connector.connect_with_retry(&addr).await.unwrap_err();
    assert!(
        matches!(err, Error::RetryBudgetExhausted { attempts: 5, .. }),
        "expected budget exhaustion, got {err:?}"
    );
}

/// Scenario 2: latched run, connector gets in on its first attempt.
#[tokio::test]
async fn latched_round_trip_on_stream_zero() {
    init_tracing();
    let mut cfg = ScenarioConfig::latched();
    cfg.port = 0;

    let report = run_scenario(&cfg).await.unwrap();
    assert_eq!(report.attempts, 1);
    let delivery = report.delivery.as_ref().unwrap();
    assert_eq!(delivery.receiver, Role::Connector);
    assert_eq!(delivery.stream_id, StreamId::PRIMARY);
    assert_eq!(delivery.text, "Test message");
    assert!(delivery.verified);
    assert_eq!(
        report.trace,
        vec![
            HarnessState::ListenerStarting,
            HarnessState::ConnectorAttempting,
            HarnessState::Exchanging,
            HarnessState::Verifying,
            HarnessState::Succeeded,
        ]
    );
    assert_eq!(report.confirmation(), "STREAM: 0: Test message");
}

/// Scenario 3: the same fixed port twice in a row.
#[tokio::test]
async fn sequential_runs_rebind_the_same_port() {
    init_tracing();
    let mut cfg = ScenarioConfig::latched();
    cfg.port = unused_port();

    let first = run_scenario(&cfg).await.unwrap();
    let second = run_scenario(&cfg).await.unwrap();
    assert_eq!(first.delivery, second.delivery);
}

/// Scenario 4: payload larger than the buffer is refused up front.
#[tokio::test]
async fn oversized_payload_is_a_bounds_error() {
    let mut cfg = ScenarioConfig::latched();
    cfg.port = 0;
    cfg.payload = "z".repeat(cfg.buffer_size + 1);

    let err = run_scenario(&cfg).await.unwrap_err();
    assert_eq!(err.state, HarnessState::NotStarted);
    assert!(matches!(
        err.source,
        Error::Stream(smoke_stream::Error::PayloadTooLarge { len: 61, max: 60 })
    ));
}

#[tokio::test]
async fn polling_run_absorbs_early_refusals() {
    init_tracing();
    let mut cfg = fast(ScenarioConfig::polling());
    cfg.port = unused_port();

    let report = run_scenario(&cfg).await.unwrap();
    assert!(report.attempts >= 1);
    assert!(report.delivery.is_none());
    assert_eq!(report.confirmation(), "Test success");
    // Nothing was exchanged, so nothing was verified either
    assert_eq!(
        report.trace,
        vec![HarnessState::ListenerStarting, HarnessState::ConnectorAttempting, HarnessState::Succeeded]
    );
}

#[tokio::test]
async fn connector_to_listener_keeps_stream_identity() {
    let mut cfg = ScenarioConfig::latched();
    cfg.port = 0;
    cfg.flow = MessageFlow::ConnectorToListener;
    cfg.stream_id = StreamId::new(9);
    cfg.payload = "upstream".into();

    let report = run_scenario(&cfg).await.unwrap();
    let delivery = report.delivery.unwrap();
    assert_eq!(delivery.receiver, Role::Listener);
    assert_eq!(delivery.stream_id, StreamId::new(9));
    assert_eq!(delivery.text, "upstream");
}

#[tokio::test]
async fn unverified_run_only_reports_text() {
    let mut cfg = ScenarioConfig::latched();
    cfg.port = 0;
    cfg.verify = false;

    let report = run_scenario(&cfg).await.unwrap();
    let delivery = report.delivery.clone().unwrap();
    assert!(!delivery.verified);
    assert_eq!(delivery.text, "Test message");
    assert!(!report.trace.contains(&HarnessState::Verifying));
    assert_eq!(report.trace.last(), Some(&HarnessState::Succeeded));
}

#[tokio::test]
async fn occupied_port_fails_the_listener() {
    let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut cfg = ScenarioConfig::latched();
    cfg.port = squatter.local_addr().unwrap().port();

    let err = run_scenario(&cfg).await.unwrap_err();
    assert_eq!(err.role, Role::Listener);
    assert_eq!(err.state, HarnessState::ListenerStarting);
    assert!(matches!(err.source, Error::AddressInUse { .. }), "got {:?}", err.source);
}

/// Without a latch the connector can reach whoever squats on the port and
/// wait there for a message that never comes; the bind failure must still end the run.
#[tokio::test]
async fn occupied_port_fails_a_polling_run_that_expects_a_message() {
    init_tracing();
    let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut cfg = fast(ScenarioConfig::polling());
    cfg.port = squatter.local_addr().unwrap().port();
    cfg.flow = MessageFlow::ListenerToConnector;

    let err = tokio::time::timeout(Duration::from_secs(5), run_scenario(&cfg))
        .await
        .expect("driver kept running after the listener failed to bind")
        .unwrap_err();
    assert_eq!(err.role, Role::Listener);
    assert_eq!(err.state, HarnessState::ListenerStarting);
    assert!(matches!(err.source, Error::AddressInUse { .. }), "got {:?}", err.source);
}

#[tokio::test]
async fn occupied_port_fails_a_silent_polling_run() {
    let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut cfg = fast(ScenarioConfig::polling());
    cfg.port = squatter.local_addr().unwrap().port();

    let err = tokio::time::timeout(Duration::from_secs(5), run_scenario(&cfg))
        .await
        .expect("driver kept running after the listener failed to bind")
        .unwrap_err();
    assert_eq!(err.role, Role::Listener);
    assert!(matches!(err.source, Error::AddressInUse { .. }), "got {:?}", err.source);
}

#[tokio::test]
async fn wrong_content_is_a_correctness_failure() {
    let listener = Listener::bind(&EndpointAddress::loopback(0), 60).unwrap();
    let bound = listener.local_addr();
    let server = tokio::spawn(async move {
        let mut association = listener.accept_one().await?;
        let payload = TextCodec::new(60).encode("Test massage")?;
        association.send(OutgoingMessage::new(StreamId::PRIMARY, payload)).await?;
        association.close().await
    });

    let connector = Connector::new(RetryPolicy::new(3, Duration::from_millis(10)), 60);
    let mut association = connector
        .connect_with_retry(&EndpointAddress::from(bound))
        .await
        .unwrap()
        .association;
    let message = association.receive().await.unwrap();
    let err = verify(&message.payload, b"Test message").unwrap_err();
    assert!(err.is_content_failure());
    assert!(!err.is_retryable());
    association.close().await.unwrap();
    server.await.unwrap().unwrap();
}
