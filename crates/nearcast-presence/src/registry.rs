//! The presence registry: every live player and where they are.
//!
//! # Concurrency note
//!
//! `PresenceRegistry` is a plain struct with `&mut self` mutators. It is
//! owned by exactly one task (the world actor), which serializes every
//! mutation; readers get clones via [`snapshot`](PresenceRegistry::snapshot),
//! so a torn record can never be observed.

use std::collections::BTreeMap;
use std::time::Instant;

use nearcast_protocol::PlayerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Player, WorldConfig};

/// Authoritative mapping of connection identity → player state.
///
/// ## Lifecycle
///
/// ```text
/// join() ──→ move_to()* ──→ leave()
///   │            │             │
///   ▼            ▼             ▼
/// [random     [clamped      [removed,
///  spawn]      in place]     idempotent]
/// ```
pub struct PresenceRegistry {
    /// Keyed by id; `BTreeMap` so snapshots come out in id order.
    players: BTreeMap<PlayerId, Player>,
    config: WorldConfig,
    rng: StdRng,
}

impl PresenceRegistry {
    /// Creates an empty registry seeded from the OS.
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates an empty registry with a fixed seed, for reproducible
    /// spawn positions and colors.
    pub fn with_seed(config: WorldConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
        Self {
            players: BTreeMap::new(),
            config,
            rng,
        }
    }

    /// Adds a player for `id` at a random in-bounds position with a random
    /// color, and returns it.
    ///
    /// If `id` is already present the existing record is returned
    /// unchanged: there is never more than one player per identity.
    pub fn join(&mut self, id: PlayerId) -> Player {
        if let Some(existing) = self.players.get(&id) {
            tracing::debug!(%id, "join for existing player, keeping record");
            return existing.clone();
        }

        let (min_x, max_x, min_y, max_y) = self.config.bounds();
        let player = Player {
            id,
            x: self.rng.random_range(min_x..=max_x),
            y: self.rng.random_range(min_y..=max_y),
            color: format!("#{:06x}", self.rng.random_range(0..=0xff_ffffu32)),
            joined_at: Instant::now(),
        };

        tracing::info!(
            %id,
            x = player.x,
            y = player.y,
            players = self.players.len() + 1,
            "player joined"
        );
        self.players.insert(id, player.clone());
        player
    }

    /// Moves a player, clamping the request to world bounds.
    ///
    /// Returns `None` without touching anything when `id` is unknown (a
    /// stale message racing a disconnect) or a coordinate is NaN or
    /// infinite.
    pub fn move_to(&mut self, id: PlayerId, x: f64, y: f64) -> Option<Player> {
        if !x.is_finite() || !y.is_finite() {
            tracing::debug!(%id, x, y, "rejecting non-finite move");
            return None;
        }

        let player = self.players.get_mut(&id)?;
        let (x, y) = self.config.clamp(x, y);
        player.x = x;
        player.y = y;
        tracing::trace!(%id, x, y, "player moved");
        Some(player.clone())
    }

    /// Removes a player. Idempotent: returns `None` if absent.
    pub fn leave(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            tracing::info!(%id, players = self.players.len(), "player left");
        }
        removed
    }

    /// All players, ordered by id.
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    /// Iterates `(id, x, y)` without cloning colors.
    pub fn positions(&self) -> impl Iterator<Item = (PlayerId, f64, f64)> + '_ {
        self.players.values().map(|p| (p.id, p.x, p.y))
    }

    /// Looks up one player.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Returns `true` if `id` has a player.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Number of live players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if nobody is in the world.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The world this registry enforces.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }
}

// =========================================================================
// Tests
// =========================================================================
