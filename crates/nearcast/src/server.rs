//! `NearcastServer` builder and accept loop.
//!
//! This is the entry point for running a Nearcast server. It ties the
//! layers together: transport → handler → world actor → presence,
//! proximity, and signaling.

use std::net::SocketAddr;

use nearcast_presence::WorldConfig;
use nearcast_proximity::{BruteForce, PairIndex};
use nearcast_tick::{TickConfig, TickPolicy};
use nearcast_transport::{Transport, WebSocketTransport};

use crate::handler::{handle_incoming, ConnectionConfig};
use crate::world::{spawn_world, WorldHandle, WorldOptions};
use crate::NearcastError;

/// Capacity of the world actor's command channel. A flood of `move`s
/// waits here instead of piling up in memory.
pub const WORLD_CHANNEL_SIZE: usize = 1024;

/// Builder for configuring and starting a Nearcast server.
///
/// # Example
///
/// ```rust,no_run
/// use nearcast::prelude::*;
///
/// # async fn run() -> Result<(), NearcastError> {
/// let server = NearcastServer::builder()
///     .bind("0.0.0.0:8000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NearcastServerBuilder {
    bind_addr: String,
    world: WorldConfig,
    connection: ConnectionConfig,
    tick_policy: TickPolicy,
    index: Box<dyn PairIndex>,
    seed: Option<u64>,
}

impl NearcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            world: WorldConfig::default(),
            connection: ConnectionConfig::default(),
            tick_policy: TickPolicy::default(),
            index: Box::new(BruteForce),
            seed: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the world constants.
    pub fn world_config(mut self, config: WorldConfig) -> Self {
        self.world = config;
        self
    }

    /// Sets per-connection limits.
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    /// Sets what the broadcast tick does when it falls behind.
    pub fn tick_policy(mut self, policy: TickPolicy) -> Self {
        self.tick_policy = policy;
        self
    }

    /// Sets the candidate-pair index used for proximity checks.
    pub fn pair_index(mut self, index: impl PairIndex) -> Self {
        self.index = Box::new(index);
        self
    }

    /// Fixes the RNG seed for spawn positions and colors.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration, binds the listener, and starts the
    /// world actor.
    pub async fn build(self) -> Result<NearcastServer, NearcastError> {
        let world = self.world.validated()?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let tick = TickConfig {
            policy: self.tick_policy,
            ..TickConfig::every(world.broadcast_interval)
        };
        let (world, _task) = spawn_world(WorldOptions {
            config: world,
            tick,
            index: self.index,
            seed: self.seed,
            channel_size: WORLD_CHANNEL_SIZE,
        });

        Ok(NearcastServer {
            transport,
            world,
            connection: self.connection,
        })
    }
}

impl Default for NearcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Nearcast server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NearcastServer {
    transport: WebSocketTransport,
    world: WorldHandle,
    connection: ConnectionConfig,
}

impl NearcastServer {
    /// Creates a new builder.
    pub fn builder() -> NearcastServerBuilder {
        NearcastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NearcastError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle to the world actor, for stats and shutdown.
    pub fn world(&self) -> WorldHandle {
        self.world.clone()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted socket; the WebSocket
    /// handshake runs inside that task. Accept errors are logged and the
    /// loop keeps going; it only returns once the world actor has stopped.
    pub async fn run(mut self) -> Result<(), NearcastError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "nearcast server listening");

        loop {
            let conn = tokio::select! {
                accepted = self.transport.accept() => accepted,
                _ = self.world.closed() => {
                    tracing::info!("world stopped, server exiting");
                    return Ok(());
                }
            };
            match conn {
                Ok(incoming) => {
                    let world = self.world.clone();
                    let config = self.connection.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_incoming(incoming, world, config).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
