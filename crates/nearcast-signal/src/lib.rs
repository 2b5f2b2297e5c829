//! Peer-to-peer negotiation relay for Nearcast.
//!
//! When two players come within range, their clients set up a direct media
//! connection. The server never touches media; it only routes the opaque
//! negotiation messages (offer, answer, ICE candidates) between the pair
//! and decides who goes first.
//!
//! # How it fits in the stack
//!
//! ```text
//! World actor (above)   ← feeds edge events and inbound signals in,
//!     ↕                   pushes the returned deliveries to connections
//! Signal relay (this crate)  ← one Session per in-range pair
//!     ↕
//! Proximity (below)     ← Edge / epoch identity of each pair
//! ```
//!
//! Every operation is a pure state transition that returns a list of
//! [`Delivery`]s. Nothing here does I/O, so the whole negotiation protocol
//! is testable without sockets.

mod error;
mod relay;
mod session;

pub use error::SignalError;
pub use relay::SignalRelay;
pub use session::{Delivery, Session, MAX_BUFFERED_CANDIDATES};
