//! Message layer of the smoke harness.
//!
//! An association carries discrete messages, each tagged with the stream it
//! belongs to. [`FrameCodec`] puts them on the wire and [`TextCodec`] turns
//! the payload into text and back within a fixed buffer bound.

#![forbid(unsafe_code)]

/// Crate error type.
pub mod errors;
/// Wire framing.
pub mod frame_codec;
/// Outgoing and incoming message types.
pub mod message;
/// Bounded UTF-8 payload codec.
pub mod text_codec;

pub use errors::{Error, Result};
pub use frame_codec::{Frame, FrameCodec};
pub use message::{IncomingMessage, OutgoingMessage};
pub use smoke_core::StreamId;
pub use text_codec::TextCodec;
