//! World configuration and the bounds invariant.

use std::time::Duration;

use nearcast_protocol::{IceServer, WorldInfo};
use tracing::warn;

/// Constants that define the shared world.
///
/// Fixed at process start and sent to every client in `init`; nothing
/// here can be renegotiated at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Width of the world in world units.
    pub world_width: f64,

    /// Height of the world in world units.
    pub world_height: f64,

    /// Radius of every avatar. Centers stay at least this far from each
    /// edge.
    pub player_radius: f64,

    /// Two players are "in range" when their centers are at most this far
    /// apart.
    pub proximity_threshold: f64,

    /// Period of the full-snapshot broadcast.
    pub broadcast_interval: Duration,

    /// STUN/TURN servers handed to clients for candidate gathering.
    pub ice_servers: Vec<IceServer>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            player_radius: 15.0,
            proximity_threshold: 60.0,
            broadcast_interval: Duration::from_millis(50),
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
        }
    }
}

impl WorldConfig {
    /// Default proximity threshold as a multiple of the player radius.
    pub const THRESHOLD_RADII: f64 = 4.0;

    /// Checks hard errors and fixes soft ones.
    ///
    /// - Dimensions and radius must be finite and positive, and the world
    ///   must fit one player (`2 × radius` in each direction). Violations
    ///   are errors.
    /// - A non-finite or non-positive threshold is replaced by
    ///   [`Self::THRESHOLD_RADII`] × radius.
    /// - A zero broadcast interval is replaced by the default 50 ms.
    pub fn validated(mut self) -> Result<Self, crate::PresenceError> {
        use crate::PresenceError;

        for (name, value) in [
            ("world_width", self.world_width),
            ("world_height", self.world_height),
            ("player_radius", self.player_radius),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PresenceError::InvalidDimension { name, value });
            }
        }

        if self.world_width < 2.0 * self.player_radius
            || self.world_height < 2.0 * self.player_radius
        {
            return Err(PresenceError::WorldTooSmall {
                width: self.world_width,
                height: self.world_height,
                radius: self.player_radius,
            });
        }

        if !self.proximity_threshold.is_finite() || self.proximity_threshold <= 0.0 {
            let fixed = self.player_radius * Self::THRESHOLD_RADII;
            warn!(
                threshold = self.proximity_threshold,
                fixed, "proximity_threshold out of range, using default multiple of radius"
            );
            self.proximity_threshold = fixed;
        }

        if self.broadcast_interval.is_zero() {
            warn!("broadcast_interval is zero, using 50ms");
            self.broadcast_interval = Duration::from_millis(50);
        }

        Ok(self)
    }

    /// Smallest and largest legal center coordinates:
    /// `(min_x, max_x, min_y, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let r = self.player_radius;
        (r, self.world_width - r, r, self.world_height - r)
    }

    /// Clamps a requested center position into the legal rectangle.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        let (min_x, max_x, min_y, max_y) = self.bounds();
        (x.clamp(min_x, max_x), y.clamp(min_y, max_y))
    }

    /// Returns `true` if `(x, y)` already satisfies the bounds invariant.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, max_x, min_y, max_y) = self.bounds();
        (min_x..=max_x).contains(&x) && (min_y..=max_y).contains(&y)
    }

    /// The client-facing view sent in `init`.
    pub fn info(&self) -> WorldInfo {
        WorldInfo {
            world_width: self.world_width,
            world_height: self.world_height,
            player_radius: self.player_radius,
            proximity_threshold: self.proximity_threshold,
            broadcast_interval_ms: u64::try_from(self.broadcast_interval.as_millis())
                .unwrap_or(u64::MAX),
            ice_servers: self.ice_servers.clone(),
        }
    }
}
