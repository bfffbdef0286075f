#![forbid(unsafe_code)]

use anyhow::Context;
use clap::{Parser, ValueEnum};
use smoke_core::{logging, MessageFlow, Readiness, ScenarioConfig, ScenarioOverrides, StreamId, Variant};
use smoke_transport::run_scenario;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "smoke-cli", version, about = "Association round-trip smoke test")]
struct Cli {
	/// TOML file with scenario settings; flags override it
	#[arg(long)]
	config: Option<PathBuf>,
	/// Preset to start from
	#[arg(long, value_enum)]
	variant: Option<VariantArg>,
	/// Host the listener binds and the connector dials
	#[arg(long)]
	host: Option<String>,
	#[arg(long)]
	port: Option<u16>,
	/// Connection attempts before giving up
	#[arg(long)]
	attempts: Option<u32>,
	/// Fixed pause between attempts, in milliseconds
	#[arg(long)]
	delay_ms: Option<u64>,
	/// Receive buffer size; larger payloads are rejected
	#[arg(long)]
	buffer_size: Option<usize>,
	#[arg(long)]
	stream_id: Option<u16>,
	/// Text the sending side transmits
	#[arg(long)]
	message: Option<String>,
	#[arg(long, value_enum)]
	readiness: Option<ReadinessArg>,
	#[arg(long, value_enum)]
	flow: Option<FlowArg>,
	/// Report the received text without comparing it
	#[arg(long)]
	no_verify: bool,
	#[arg(long)]
	log_level: Option<String>,
	/// Print the resolved configuration as TOML and exit
	#[arg(long)]
	print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg { Latched, Polling }

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReadinessArg { Latch, Poll }

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlowArg {
	#[value(name = "none")]
	NoMessage,
	ListenerToConnector,
	ConnectorToListener,
}

impl Cli {
	fn overrides(&self) -> ScenarioOverrides {
		ScenarioOverrides {
			variant: self.variant.map(|v| match v {
				VariantArg::Latched => Variant::Latched,
				VariantArg::Polling => Variant::Polling,
			}),
			log_level: self.log_level.clone(),
			host: self.host.clone(),
			port: self.port,
			max_attempts: self.attempts,
			retry_delay_ms: self.delay_ms,
			buffer_size: self.buffer_size,
			stream_id: self.stream_id.map(StreamId::new),
			payload: self.message.clone(),
			readiness: self.readiness.map(|r| match r {
				ReadinessArg::Latch => Readiness::Latch,
				ReadinessArg::Poll => Readiness::Poll,
			}),
			flow: self.flow.map(|f| match f {
				FlowArg::NoMessage => MessageFlow::None,
				FlowArg::ListenerToConnector => MessageFlow::ListenerToConnector,
				FlowArg::ConnectorToListener => MessageFlow::ConnectorToListener,
			}),
			verify: self.no_verify.then_some(false),
		}
	}

	fn resolve_config(&self) -> anyhow::Result<ScenarioConfig> {
		let file = match &self.config {
			Some(path) => ScenarioOverrides::load_from_file(path)
				.with_context(|| format!("failed to load {}", path.display()))?,
			None => ScenarioOverrides::default(),
		};
		let cfg = ScenarioConfig::from_layers([file, self.overrides()]).context("invalid scenario")?;
		Ok(cfg)
	}
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	let cfg = match cli.resolve_config() {
		Ok(cfg) => cfg,
		Err(e) => {
			eprintln!("error: {e:#}");
			return ExitCode::from(2);
		}
	};

	if cli.print_config {
		return match toml::to_string(&cfg) {
			Ok(s) => { print!("{s}"); ExitCode::SUCCESS }
			Err(e) => { eprintln!("error: {e}"); ExitCode::from(2) }
		};
	}

	logging::init(&cfg.log_level);
	tracing::info!(variant = ?cfg.variant, address = %cfg.address(), "starting scenario");

	match run_scenario(&cfg).await {
		Ok(report) => {
			println!("{}", report.confirmation());
			ExitCode::SUCCESS
		}
		Err(e) => {
			eprintln!("error: {e}");
			ExitCode::FAILURE
		}
	}
}
