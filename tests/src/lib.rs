// Shared helpers for the end-to-end scenario suite.
//
// Scenarios run in-process: the harness driver spawns the listener and the
// connector as tokio tasks on the test runtime.

use smoke_core::ScenarioConfig;

/// A loopback port with no listener at the time of the call.
///
/// The probe socket is closed before returning, so another process may grab
/// the port in between; tests tolerate that as a rare flake.
pub fn unused_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe socket");
    probe.local_addr().expect("probe address").port()
}

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Shrink the retry pause so polling scenarios finish quickly.
pub fn fast(mut cfg: ScenarioConfig) -> ScenarioConfig {
    cfg.max_attempts = 40;
    cfg.retry_delay_ms = 25;
    cfg
}
