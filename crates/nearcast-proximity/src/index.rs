//! Candidate-pair generation.
//!
//! A [`PairIndex`] proposes pairs that *might* be in range; the detector
//! then checks the exact distance. An index may over-report but must
//! never miss a pair whose distance is within the threshold.

use std::collections::HashMap;

use nearcast_protocol::PlayerId;

/// Proposes candidate pairs for the distance check.
pub trait PairIndex: Send + 'static {
    /// Returns index pairs `(i, j)` with `i < j` into `points`.
    ///
    /// Each pair appears at most once. `threshold` is the in-range
    /// distance, finite and positive.
    fn candidate_pairs(
        &mut self,
        points: &[(PlayerId, f64, f64)],
        threshold: f64,
    ) -> Vec<(usize, usize)>;
}

impl<T: PairIndex + ?Sized> PairIndex for Box<T> {
    fn candidate_pairs(
        &mut self,
        points: &[(PlayerId, f64, f64)],
        threshold: f64,
    ) -> Vec<(usize, usize)> {
        (**self).candidate_pairs(points, threshold)
    }
}

/// Every pair. O(n²), no setup cost; right for tens of players.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl PairIndex for BruteForce {
    fn candidate_pairs(
        &mut self,
        points: &[(PlayerId, f64, f64)],
        _threshold: f64,
    ) -> Vec<(usize, usize)> {
        let n = points.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push((i, j));
            }
        }
        pairs
    }
}

/// A uniform grid with cells one threshold wide.
///
/// Two points within the threshold are always in the same or adjacent
/// cells, so only the 3×3 neighborhood of each cell is checked. The cell
/// map is reused between calls.
#[derive(Debug, Default)]
pub struct UniformGrid {
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl UniformGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_of(x: f64, y: f64, size: f64) -> (i64, i64) {
        ((x / size).floor() as i64, (y / size).floor() as i64)
    }
}

impl PairIndex for UniformGrid {
    fn candidate_pairs(
        &mut self,
        points: &[(PlayerId, f64, f64)],
        threshold: f64,
    ) -> Vec<(usize, usize)> {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for (i, &(_, x, y)) in points.iter().enumerate() {
            self.cells
                .entry(Self::cell_of(x, y, threshold))
                .or_default()
                .push(i);
        }

        let mut pairs = Vec::new();
        for (i, &(_, x, y)) in points.iter().enumerate() {
            let (cx, cy) = Self::cell_of(x, y, threshold);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                        continue;
                    };
                    // Only look "forward" so each pair is emitted once.
                    pairs.extend(bucket.iter().filter(|&&j| j > i).map(|&j| (i, j)));
                }
            }
        }

        // Drop empty buckets so a roaming population doesn't grow the map
        // without bound.
        self.cells.retain(|_, bucket| !bucket.is_empty());
        pairs
    }
}
