//! The server's record of one avatar.

use std::time::Instant;

use nearcast_protocol::{PlayerId, PlayerView};

/// A single player in the world.
///
/// Owned by the [`PresenceRegistry`](crate::PresenceRegistry); everything
/// outside it only ever sees clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Same value as the connection identity.
    pub id: PlayerId,

    /// Center position. Always inside the world bounds.
    pub x: f64,
    pub y: f64,

    /// Display token, `#rrggbb`.
    pub color: String,

    /// When the player entered the world. Server-side only.
    pub joined_at: Instant,
}

impl Player {
    /// The client-facing view used in `init` and `positionUpdate`.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            x: self.x,
            y: self.y,
            color: self.color.clone(),
        }
    }

    /// Euclidean distance between two player centers.
    pub fn distance_to(&self, other: &Player) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}
