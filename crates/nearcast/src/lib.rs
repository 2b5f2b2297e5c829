//! # Nearcast
//!
//! Real-time presence server for a shared 2D world.
//!
//! Clients connect over WebSocket, get a randomly placed avatar, and move
//! it around. The server keeps the authoritative position of every player,
//! broadcasts snapshots at 20 Hz, tells pairs of players when they come
//! within range of each other, and relays the negotiation messages those
//! pairs need to open a direct audio/video connection. Media never passes
//! through the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nearcast::prelude::*;
//!
//! # async fn run() -> Result<(), NearcastError> {
//! let server = NearcastServer::builder()
//!     .bind("0.0.0.0:8000")
//!     .pair_index(UniformGrid::new())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod world;

pub use error::NearcastError;
pub use handler::ConnectionConfig;
pub use server::{NearcastServer, NearcastServerBuilder, WORLD_CHANNEL_SIZE};
pub use world::{WorldHandle, WorldStats};

pub mod prelude {
    pub use crate::{
        ConnectionConfig, NearcastError, NearcastServer, NearcastServerBuilder, WorldHandle,
        WorldStats,
    };
    pub use nearcast_presence::WorldConfig;
    pub use nearcast_protocol::{
        ClientMessage, IceServer, PlayerId, PlayerView, ServerMessage, SessionState, Signal,
        WorldInfo,
    };
    pub use nearcast_proximity::{BruteForce, PairIndex, UniformGrid};
    pub use nearcast_tick::TickPolicy;
}
