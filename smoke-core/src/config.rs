use crate::error::{Error, Result};
use crate::types::{
	EndpointAddress, StreamId, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
	LATCHED_PORT, LOOPBACK_HOST, POLLING_PORT, TEST_MESSAGE,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Named preset a scenario starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
	/// Readiness latch, listener sends one message, connector verifies it.
	#[default]
	Latched,
	/// No latch, connector retries blindly, no message.
	Polling,
}

/// How the connector learns that the listener is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
	/// Listener signals once bound; connector waits for it.
	Latch,
	/// No signal; connector starts dialing at once and relies on retries.
	Poll,
}

/// Which side, if any, sends the single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageFlow {
	/// Connect and close, nothing sent.
	None,
	/// Listener sends, connector receives.
	ListenerToConnector,
	/// Connector sends, listener receives.
	ConnectorToListener,
}

impl MessageFlow {
	/// True unless the flow is [`MessageFlow::None`].
	pub fn carries_message(self) -> bool { !matches!(self, MessageFlow::None) }
}

/// Fully resolved settings of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
	/// Preset the other fields started from.
	pub variant: Variant,
	/// Default log filter when `RUST_LOG` is unset.
	pub log_level: String,
	/// Host the listener binds and the connector dials.
	pub host: String,
	/// Well-known port; 0 only with [`Readiness::Latch`].
	pub port: u16,
	/// Connect attempts before giving up.
	pub max_attempts: u32,
	/// Fixed pause between attempts, in milliseconds.
	pub retry_delay_ms: u64,
	/// Largest payload either side sends or accepts.
	pub buffer_size: usize,
	/// Stream the message travels on.
	pub stream_id: StreamId,
	/// Text of the message.
	pub payload: String,
	/// How the connector learns the listener is bound.
	pub readiness: Readiness,
	/// Which side sends.
	pub flow: MessageFlow,
	/// Compare the received message against `payload` and `stream_id`.
	pub verify: bool,
}

impl Default for ScenarioConfig {
	fn default() -> Self { Self::latched() }
}

impl ScenarioConfig {
	/// Latch, listener sends "Test message" on stream 0, port 3456.
	pub fn latched() -> Self {
		Self {
			variant: Variant::Latched,
			log_level: "info".into(),
			host: LOOPBACK_HOST.into(),
			port: LATCHED_PORT,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
			buffer_size: DEFAULT_BUFFER_SIZE,
			stream_id: StreamId::PRIMARY,
			payload: TEST_MESSAGE.into(),
			readiness: Readiness::Latch,
			flow: MessageFlow::ListenerToConnector,
			verify: true,
		}
	}

	/// No latch, no message, port 9999.
	pub fn polling() -> Self {
		Self {
			variant: Variant::Polling,
			port: POLLING_PORT,
			readiness: Readiness::Poll,
			flow: MessageFlow::None,
			..Self::latched()
		}
	}

	/// Preset named by `variant`.
	pub fn preset(variant: Variant) -> Self {
		match variant {
			Variant::Latched => Self::latched(),
			Variant::Polling => Self::polling(),
		}
	}

	/// Configured host and port.
	pub fn address(&self) -> EndpointAddress { EndpointAddress::new(self.host.clone(), self.port) }

	/// `retry_delay_ms` as a [`Duration`].
	pub fn retry_delay(&self) -> Duration { Duration::from_millis(self.retry_delay_ms) }

	/// Parse a TOML document. Keys that are absent keep the value of the
	/// preset named by `variant` (latched when omitted).
	pub fn from_toml_str(data: &str) -> Result<Self> {
		Self::from_layers([ScenarioOverrides::from_toml_str(data)?])
	}

	/// Build a config from override layers, later layers winning. The preset
	/// is the last `variant` any layer names.
	pub fn from_layers(layers: impl IntoIterator<Item = ScenarioOverrides>) -> Result<Self> {
		let layers: Vec<ScenarioOverrides> = layers.into_iter().collect();
		let variant = layers.iter().rev().find_map(|l| l.variant).unwrap_or_default();
		let mut cfg = Self::preset(variant);
		for layer in layers {
			layer.apply(&mut cfg);
		}
		cfg.validate()?;
		Ok(cfg)
	}

	/// Read and parse a TOML config file.
	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		Self::from_toml_str(&data)
	}

	/// Reject settings no run could succeed with.
	pub fn validate(&self) -> Result<()> {
		let allowed = ["trace", "debug", "info", "warn", "error"];
		if !allowed.contains(&self.log_level.as_str()) {
			return Err(Error::config(format!("invalid log_level: {}", self.log_level)));
		}
		if self.max_attempts == 0 {
			return Err(Error::config("max_attempts must be at least 1"));
		}
		if self.buffer_size == 0 {
			return Err(Error::config("buffer_size must be at least 1"));
		}
		if self.host.trim().is_empty() {
			return Err(Error::config("host must not be empty"));
		}
		if self.readiness == Readiness::Poll && self.port == 0 {
			return Err(Error::config("port 0 needs the readiness latch to learn the bound port"));
		}
		Ok(())
	}
}

/// Partial scenario settings, as read from a config file or the command line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioOverrides {
	/// Preset to start from.
	pub variant: Option<Variant>,
	/// See [`ScenarioConfig::log_level`].
	pub log_level: Option<String>,
	/// See [`ScenarioConfig::host`].
	pub host: Option<String>,
	/// See [`ScenarioConfig::port`].
	pub port: Option<u16>,
	/// See [`ScenarioConfig::max_attempts`].
	pub max_attempts: Option<u32>,
	/// See [`ScenarioConfig::retry_delay_ms`].
	pub retry_delay_ms: Option<u64>,
	/// See [`ScenarioConfig::buffer_size`].
	pub buffer_size: Option<usize>,
	/// See [`ScenarioConfig::stream_id`].
	pub stream_id: Option<StreamId>,
	/// See [`ScenarioConfig::payload`].
	pub payload: Option<String>,
	/// See [`ScenarioConfig::readiness`].
	pub readiness: Option<Readiness>,
	/// See [`ScenarioConfig::flow`].
	pub flow: Option<MessageFlow>,
	/// See [`ScenarioConfig::verify`].
	pub verify: Option<bool>,
}

impl ScenarioOverrides {
	/// Parse a partial TOML document.
	pub fn from_toml_str(data: &str) -> Result<Self> {
		Ok(toml::from_str(data)?)
	}

	/// Read a partial TOML config file.
	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		Self::from_toml_str(&data)
	}

	/// Copy every present field onto `cfg`. `variant` only labels the
	/// config here; choosing the preset is up to the caller.
	pub fn apply(self, cfg: &mut ScenarioConfig) {
		if let Some(v) = self.variant { cfg.variant = v; }
		if let Some(v) = self.log_level { cfg.log_level = v; }
		if let Some(v) = self.host { cfg.host = v; }
		if let Some(v) = self.port { cfg.port = v; }
		if let Some(v) = self.max_attempts { cfg.max_attempts = v; }
		if let Some(v) = self.retry_delay_ms { cfg.retry_delay_ms = v; }
		if let Some(v) = self.buffer_size { cfg.buffer_size = v; }
		if let Some(v) = self.stream_id { cfg.stream_id = v; }
		if let Some(v) = self.payload { cfg.payload = v; }
		if let Some(v) = self.readiness { cfg.readiness = v; }
		if let Some(v) = self.flow { cfg.flow = v; }
		if let Some(v) = self.verify { cfg.verify = v; }
	}
}
