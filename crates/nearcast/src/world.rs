//! World actor: the single owner of all shared state.
//!
//! One Tokio task owns the presence registry, the proximity detector, the
//! signaling relay, every connection's outbound queue, and the broadcast
//! tick. Connection handlers talk to it through a [`WorldHandle`]. Every
//! mutation is applied in the order its command arrives, so no two updates
//! can interleave and no reader ever sees a half-applied change.
//!
//! Outbound frames are pushed with `try_send`. The actor never waits on a
//! client: a connection whose queue is full or closed is disconnected.

use std::collections::BTreeMap;
use std::sync::Arc;

use nearcast_presence::{PresenceRegistry, WorldConfig};
use nearcast_protocol::{
    Codec, JsonCodec, PlayerId, ServerMessage, Signal, SignalKind, WorldInfo,
};
use nearcast_proximity::{EdgeEvent, PairIndex, ProximityDetector};
use nearcast_signal::{Delivery, SignalRelay};
use nearcast_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::NearcastError;

/// One encoded frame. Shared so a snapshot is encoded once for everybody.
pub type Frame = Arc<[u8]>;

/// The sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<Frame>;

/// Commands sent to the world actor.
pub(crate) enum WorldCommand {
    /// A connection opened. The actor spawns its player.
    Connect { id: PlayerId, outbound: Outbound },

    /// Requested move from the player's own connection.
    Move { id: PlayerId, x: f64, y: f64 },

    /// Negotiation message; `id` is the connection it arrived on.
    Signal {
        id: PlayerId,
        kind: SignalKind,
        signal: Signal,
    },

    /// The connection is gone. Idempotent.
    Leave { id: PlayerId },

    Stats { reply: oneshot::Sender<WorldStats> },

    Shutdown,
}

/// Counters describing the world right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldStats {
    pub players: usize,
    pub connections: usize,
    pub edges: usize,
    pub sessions: usize,
    pub ticks: u64,
}

/// Handle to the running world actor.
///
/// Cheap to clone; every connection handler holds one.
#[derive(Clone)]
pub struct WorldHandle {
    sender: mpsc::Sender<WorldCommand>,
}

impl WorldHandle {
    async fn send(&self, cmd: WorldCommand) -> Result<(), NearcastError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| NearcastError::WorldClosed)
    }

    /// Registers a connection and spawns its player.
    pub async fn connect(&self, id: PlayerId, outbound: Outbound) -> Result<(), NearcastError> {
        self.send(WorldCommand::Connect { id, outbound }).await
    }

    pub async fn move_to(&self, id: PlayerId, x: f64, y: f64) -> Result<(), NearcastError> {
        self.send(WorldCommand::Move { id, x, y }).await
    }

    pub async fn signal(
        &self,
        id: PlayerId,
        kind: SignalKind,
        signal: Signal,
    ) -> Result<(), NearcastError> {
        self.send(WorldCommand::Signal { id, kind, signal }).await
    }

    /// Runs the disconnect path for `id`.
    pub async fn leave(&self, id: PlayerId) -> Result<(), NearcastError> {
        self.send(WorldCommand::Leave { id }).await
    }

    pub async fn stats(&self) -> Result<WorldStats, NearcastError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorldCommand::Stats { reply }).await?;
        rx.await.map_err(|_| NearcastError::WorldClosed)
    }

    /// Stops the actor after the commands already queued.
    pub async fn shutdown(&self) -> Result<(), NearcastError> {
        self.send(WorldCommand::Shutdown).await
    }

    /// Resolves once the actor has stopped.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}

/// The actor state. Runs inside its own task.
struct World {
    registry: PresenceRegistry,
    detector: ProximityDetector<Box<dyn PairIndex>>,
    relay: SignalRelay,
    outbound: BTreeMap<PlayerId, Outbound>,
    /// Connections whose queue rejected a frame; disconnected after the
    /// current command.
    dead: Vec<PlayerId>,
    ticks: TickScheduler,
    info: WorldInfo,
    codec: JsonCodec,
    receiver: mpsc::Receiver<WorldCommand>,
}

impl World {
    async fn run(mut self) {
        tracing::info!(
            width = self.info.world_width,
            height = self.info.world_height,
            threshold = self.info.proximity_threshold,
            "world actor started"
        );
        // Nobody to broadcast to yet.
        self.ticks.pause();

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(WorldCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = self.ticks.wait_for_tick() => {
                    self.broadcast_snapshot();
                    self.ticks.record_tick_end();
                }
            }
            self.reap_dead();
        }

        tracing::info!(players = self.registry.len(), "world actor stopped");
    }

    fn handle(&mut self, cmd: WorldCommand) {
        match cmd {
            WorldCommand::Connect { id, outbound } => self.on_connect(id, outbound),
            WorldCommand::Move { id, x, y } => self.on_move(id, x, y),
            WorldCommand::Signal { id, kind, signal } => self.on_signal(id, kind, signal),
            WorldCommand::Leave { id } => self.on_leave(id),
            WorldCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            WorldCommand::Shutdown => {}
        }
    }

    fn on_connect(&mut self, id: PlayerId, outbound: Outbound) {
        if self.outbound.contains_key(&id) {
            tracing::debug!(player_id = %id, "duplicate connect ignored");
            return;
        }
        self.registry.join(id);
        self.outbound.insert(id, outbound);

        let init = ServerMessage::Init {
            id,
            players: self.registry.snapshot().iter().map(|p| p.view()).collect(),
            config: self.info.clone(),
        };
        self.deliver(id, &init);

        if self.registry.len() == 1 {
            self.ticks.resume();
        }
        self.broadcast_snapshot();
        self.recompute();
    }

    fn on_move(&mut self, id: PlayerId, x: f64, y: f64) {
        if self.registry.move_to(id, x, y).is_none() {
            tracing::debug!(player_id = %id, x, y, "move dropped");
            return;
        }
        self.recompute();
    }

    fn on_signal(&mut self, id: PlayerId, kind: SignalKind, signal: Signal) {
        if !self.registry.contains(&id) {
            tracing::debug!(player_id = %id, %kind, "signal from unknown player dropped");
            return;
        }
        match self.relay.on_signal(id, kind, signal) {
            Ok(deliveries) => self.deliver_all(deliveries),
            Err(e) => tracing::debug!(player_id = %id, %kind, error = %e, "signal dropped"),
        }
    }

    /// The disconnect path. Safe to run more than once for the same id.
    fn on_leave(&mut self, id: PlayerId) {
        let had_queue = self.outbound.remove(&id).is_some();
        let had_player = self.registry.leave(id).is_some();
        if !had_queue && !had_player {
            return;
        }

        let closed = self.relay.close_all_for(id);
        self.deliver_all(closed);
        let events = self.detector.remove_player(id);
        self.apply_edge_events(events);
        self.broadcast_snapshot();

        if self.registry.is_empty() {
            self.ticks.pause();
        }
    }

    fn recompute(&mut self) {
        let events = self.detector.recompute(self.registry.positions());
        self.apply_edge_events(events);
    }

    /// Tells both endpoints about each transition, then lets the relay
    /// open or close the pair's session.
    fn apply_edge_events(&mut self, events: Vec<EdgeEvent>) {
        for event in events {
            let edge = event.edge();
            let in_range = event.in_range();
            for (to, peer_id) in [(edge.a(), edge.b()), (edge.b(), edge.a())] {
                self.deliver(to, &ServerMessage::Proximity { peer_id, in_range });
            }
            let deliveries = self.relay.on_edge_event(event);
            self.deliver_all(deliveries);
        }
    }

    /// Encodes one `positionUpdate` and queues it to every connection.
    fn broadcast_snapshot(&mut self) {
        if self.outbound.is_empty() {
            return;
        }
        let players = self.registry.snapshot().iter().map(|p| p.view()).collect();
        let Some(frame) = self.encode(&ServerMessage::PositionUpdate { players }) else {
            return;
        };

        let mut failed = Vec::new();
        for (id, tx) in &self.outbound {
            if tx.try_send(Arc::clone(&frame)).is_err() {
                failed.push(*id);
            }
        }
        tracing::trace!(
            players = self.registry.len(),
            bytes = frame.len(),
            "snapshot broadcast"
        );
        self.mark_dead(failed);
    }

    fn deliver_all(&mut self, deliveries: Vec<Delivery>) {
        for d in deliveries {
            self.deliver(d.to, &d.message);
        }
    }

    fn deliver(&mut self, to: PlayerId, message: &ServerMessage) {
        let Some(tx) = self.outbound.get(&to) else {
            return;
        };
        let Some(frame) = self.encode(message) else {
            return;
        };
        if tx.try_send(frame).is_err() {
            self.mark_dead([to]);
        }
    }

    fn encode(&self, message: &ServerMessage) -> Option<Frame> {
        match self.codec.encode(message) {
            Ok(bytes) => Some(Frame::from(bytes)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outbound message");
                None
            }
        }
    }

    fn mark_dead(&mut self, ids: impl IntoIterator<Item = PlayerId>) {
        for id in ids {
            if !self.dead.contains(&id) {
                tracing::info!(player_id = %id, "outbound queue full or closed, disconnecting");
                self.dead.push(id);
            }
        }
    }

    /// Disconnects every connection marked dead. A disconnect can mark
    /// more connections dead, so this runs until the list stays empty.
    fn reap_dead(&mut self) {
        while let Some(id) = self.dead.pop() {
            self.on_leave(id);
        }
    }

    fn stats(&self) -> WorldStats {
        WorldStats {
            players: self.registry.len(),
            connections: self.outbound.len(),
            edges: self.detector.len(),
            sessions: self.relay.len(),
            ticks: self.ticks.tick_count(),
        }
    }
}

/// Everything needed to start the world actor.
pub struct WorldOptions {
    pub config: WorldConfig,
    pub tick: TickConfig,
    pub index: Box<dyn PairIndex>,
    /// Fixed RNG seed for spawn positions and colors.
    pub seed: Option<u64>,
    /// Capacity of the command channel.
    pub channel_size: usize,
}

/// Spawns the world actor and returns a handle plus its task.
pub fn spawn_world(options: WorldOptions) -> (WorldHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(options.channel_size.max(1));

    let info = options.config.info();
    let threshold = options.config.proximity_threshold;
    let registry = match options.seed {
        Some(seed) => PresenceRegistry::with_seed(options.config, seed),
        None => PresenceRegistry::new(options.config),
    };

    let world = World {
        registry,
        detector: ProximityDetector::with_index(threshold, options.index),
        relay: SignalRelay::new(),
        outbound: BTreeMap::new(),
        dead: Vec::new(),
        ticks: TickScheduler::new(options.tick),
        info,
        codec: JsonCodec,
        receiver: rx,
    };

    let task = tokio::spawn(world.run());
    (WorldHandle { sender: tx }, task)
}

// =========================================================================
// Tests
// =========================================================================
