//! Error types for the presence layer.

/// Errors raised while setting up the world.
///
/// Registry operations never fail: unknown identities and bad coordinates
/// are silently rejected, so the only hard errors are configuration errors
/// caught before the server starts.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// A world dimension or the player radius is not a finite, positive
    /// number.
    #[error("invalid world dimension {name}: {value}")]
    InvalidDimension { name: &'static str, value: f64 },

    /// The world cannot fit a single player.
    #[error(
        "world {width}x{height} is too small for player radius {radius}"
    )]
    WorldTooSmall { width: f64, height: f64, radius: f64 },
}
