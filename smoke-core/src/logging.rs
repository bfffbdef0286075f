//! Tracing bootstrap shared by the binary and the integration suite.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this more than
/// once is harmless; only the first subscriber sticks.
pub fn init(default_level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.try_init();
}
