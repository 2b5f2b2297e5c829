//! The edge-set diff.

use std::collections::{BTreeMap, BTreeSet};

use nearcast_protocol::PlayerId;

use crate::{BruteForce, Edge, EdgeEvent, PairIndex};

/// Tracks which pairs of players are within `threshold` of each other.
///
/// ## Event contract
///
/// For any sequence of [`recompute`](Self::recompute) calls, each edge
/// alternates strictly `Entered`, `Left`, `Entered`, ... starting with
/// `Entered`. Within one call, all `Left` events come before all
/// `Entered` events, and each group is ordered by edge.
///
/// In range means `distance <= threshold`.
pub struct ProximityDetector<I: PairIndex = BruteForce> {
    threshold: f64,
    index: I,
    /// Current edges and the epoch they entered with.
    edges: BTreeMap<Edge, u64>,
    next_epoch: u64,
}

impl ProximityDetector<BruteForce> {
    /// A detector that checks every pair.
    pub fn new(threshold: f64) -> Self {
        Self::with_index(threshold, BruteForce)
    }
}

impl<I: PairIndex> ProximityDetector<I> {
    /// A detector using a custom candidate-pair index.
    pub fn with_index(threshold: f64, index: I) -> Self {
        Self {
            threshold,
            index,
            edges: BTreeMap::new(),
            next_epoch: 1,
        }
    }

    /// The in-range distance.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Recomputes the edge set from a full position snapshot and returns
    /// what changed.
    ///
    /// Players missing from `positions` lose all their edges. Duplicate ids
    /// are not expected; the last one wins.
    pub fn recompute(
        &mut self,
        positions: impl IntoIterator<Item = (PlayerId, f64, f64)>,
    ) -> Vec<EdgeEvent> {
        let points: Vec<_> = positions
            .into_iter()
            .map(|(id, x, y)| (id, (x, y)))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .map(|(id, (x, y))| (id, x, y))
            .collect();

        let threshold_sq = self.threshold * self.threshold;
        let current: BTreeSet<Edge> = self
            .index
            .candidate_pairs(&points, self.threshold)
            .into_iter()
            .filter_map(|(i, j)| {
                let (a, ax, ay) = points[i];
                let (b, bx, by) = points[j];
                let (dx, dy) = (ax - bx, ay - by);
                if dx * dx + dy * dy <= threshold_sq {
                    Edge::new(a, b)
                } else {
                    None
                }
            })
            .collect();

        self.apply(current)
    }

    /// Drops every edge touching `id` and returns the matching `Left`
    /// events, without needing positions.
    pub fn remove_player(&mut self, id: PlayerId) -> Vec<EdgeEvent> {
        let current = self
            .edges
            .keys()
            .filter(|e| !e.touches(id))
            .copied()
            .collect();
        self.apply(current)
    }

    fn apply(&mut self, current: BTreeSet<Edge>) -> Vec<EdgeEvent> {
        let mut events = Vec::new();

        // BTreeMap iteration is in edge order, so both groups come out
        // sorted without an extra pass.
        let gone: Vec<Edge> = self
            .edges
            .keys()
            .filter(|e| !current.contains(e))
            .copied()
            .collect();
        for edge in gone {
            if let Some(epoch) = self.edges.remove(&edge) {
                tracing::debug!(%edge, epoch, "edge left");
                events.push(EdgeEvent::Left { edge, epoch });
            }
        }

        for edge in current {
            if self.edges.contains_key(&edge) {
                continue;
            }
            let epoch = self.next_epoch;
            self.next_epoch += 1;
            self.edges.insert(edge, epoch);
            tracing::debug!(%edge, epoch, "edge entered");
            events.push(EdgeEvent::Entered { edge, epoch });
        }

        events
    }

    /// Returns `true` if `x` and `y` are currently in range.
    pub fn contains(&self, x: PlayerId, y: PlayerId) -> bool {
        Edge::new(x, y).is_some_and(|e| self.edges.contains_key(&e))
    }

    /// The epoch of a live edge.
    pub fn epoch_of(&self, edge: &Edge) -> Option<u64> {
        self.edges.get(edge).copied()
    }

    /// All live edges with their epochs, in edge order.
    pub fn edges(&self) -> impl Iterator<Item = (Edge, u64)> + '_ {
        self.edges.iter().map(|(e, epoch)| (*e, *epoch))
    }

    /// Players currently in range of `id`.
    pub fn neighbors(&self, id: PlayerId) -> Vec<PlayerId> {
        self.edges.keys().filter_map(|e| e.other(id)).collect()
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
