//! Shared building blocks for the association smoke harness: endpoint
//! addresses, stream identifiers, scenario configuration and logging setup.

#![forbid(unsafe_code)]

/// Scenario presets, override layers and validation.
pub mod config;
/// Crate error type.
pub mod error;
/// Subscriber setup.
pub mod logging;
/// Addresses, stream ids and well-known constants.
pub mod types;

pub use config::{MessageFlow, Readiness, ScenarioConfig, ScenarioOverrides, Variant};
pub use error::{Error, Result};
pub use types::{EndpointAddress, StreamId};
