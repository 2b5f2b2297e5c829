//! Wire protocol for Nearcast.
//!
//! This crate defines the messages clients and the server exchange:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Signal`], etc.):
//!   self-describing JSON records, each carrying a `type` field.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ClientMessage) → World (registry, relay)
//! ```
//!
//! The protocol layer knows nothing about connections or world state. It
//! only knows the shapes that travel on the wire.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, IceServer, PlayerId, PlayerView, ServerMessage,
    SessionState, Signal, SignalKind, WorldInfo,
};
