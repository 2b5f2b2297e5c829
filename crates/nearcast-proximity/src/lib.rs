//! Proximity detection for Nearcast.
//!
//! Turns player positions into adjacency events. Every time the world
//! changes, the caller hands the detector the full set of positions; the
//! detector works out which unordered pairs are within the threshold,
//! diffs that against the previous set, and reports the difference as
//! [`EdgeEvent`]s.
//!
//! # Key types
//!
//! - [`ProximityDetector`]: owns the current edge set and the diff
//! - [`Edge`]: an unordered pair, normalized so `a < b`
//! - [`EdgeEvent`]: `Entered` / `Left` transitions with the edge's epoch
//! - [`PairIndex`]: candidate-pair generation ([`BruteForce`],
//!   [`UniformGrid`]); swapping it never changes the events produced

mod detector;
mod edge;
mod index;

pub use detector::ProximityDetector;
pub use edge::{Edge, EdgeEvent};
pub use index::{BruteForce, PairIndex, UniformGrid};
