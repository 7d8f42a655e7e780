//! Theo Stream Adapters
//!
//! TCP client for the upstream theoretical-value feed:
//!
//! - `wire`: the binary record carried inside each frame
//! - `framing`: varint length-prefixed frame reader
//! - `client`: connection lifecycle and the receive loop

/// Binary wire record decoded from each frame payload.
pub mod wire;

/// Length-prefixed frame reading over a byte stream.
pub mod framing;

/// TCP stream client and receive loop.
pub mod client;

pub use client::{ClientError, StreamClientConfig, TheoStreamClient};
pub use framing::{FrameReader, ProtocolError, encode_frame};
pub use wire::TheoUpdate;
