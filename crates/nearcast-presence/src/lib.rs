//! Presence registry for Nearcast.
//!
//! This crate owns the authoritative answer to "who is in the world and
//! where are they":
//!
//! 1. **World configuration**: fixed constants ([`WorldConfig`]) and the
//!    bounds invariant every position must satisfy
//! 2. **Players**: one [`Player`] record per live connection
//! 3. **Registry**: the only place player records are created, moved,
//!    and removed ([`PresenceRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! World actor (above)  ← owns the registry, serializes every mutation
//!     ↕
//! Presence (this crate)  ← player state and world bounds
//!     ↕
//! Protocol (below)  ← PlayerId, PlayerView, WorldInfo
//! ```

mod config;
mod error;
mod player;
mod registry;

pub use config::WorldConfig;
pub use error::PresenceError;
pub use player::Player;
pub use registry::PresenceRegistry;
