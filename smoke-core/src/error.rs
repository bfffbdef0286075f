use thiserror::Error;

/// Result alias for this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Configuration and addressing failures.
#[derive(Debug, Error)]
pub enum Error {
	/// Reading a config file failed.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Config file is not valid TOML or has unknown keys.
	#[error("toml: {0}")]
	Toml(#[from] toml::de::Error),
	/// A value failed validation.
	#[error("config: {0}")]
	Config(String),
	/// Host could not be resolved.
	#[error("address: {0}")]
	Address(String),
}

impl Error {
	/// [`Error::Config`] from a message.
	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
	/// [`Error::Address`] from a message.
	pub fn address(msg: impl Into<String>) -> Self { Self::Address(msg.into()) }
}
