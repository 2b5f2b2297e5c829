//! Edges and edge events.

use std::fmt;

use nearcast_protocol::PlayerId;

/// An unordered pair of players that are currently in range.
///
/// Always stored with `a < b`, so `(1, 2)` and `(2, 1)` are the same edge
/// and `a` is the player that initiates negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    a: PlayerId,
    b: PlayerId,
}

impl Edge {
    /// Builds the normalized edge between two players.
    ///
    /// Returns `None` for a self-loop.
    pub fn new(x: PlayerId, y: PlayerId) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The lower identity.
    pub fn a(&self) -> PlayerId {
        self.a
    }

    /// The higher identity.
    pub fn b(&self) -> PlayerId {
        self.b
    }

    /// Returns `true` if `id` is one of the endpoints.
    pub fn touches(&self, id: PlayerId) -> bool {
        self.a == id || self.b == id
    }

    /// The endpoint that isn't `id`, or `None` if `id` isn't on this edge.
    pub fn other(&self, id: PlayerId) -> Option<PlayerId> {
        if id == self.a {
            Some(self.b)
        } else if id == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.a, self.b)
    }
}

/// A transition of one edge.
///
/// `epoch` identifies one continuous in-range interval: it is assigned
/// when the edge enters and repeated on the matching `Left`. A later
/// re-entry of the same pair gets a larger epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    Entered { edge: Edge, epoch: u64 },
    Left { edge: Edge, epoch: u64 },
}

impl EdgeEvent {
    /// The edge this event is about.
    pub fn edge(&self) -> Edge {
        match self {
            Self::Entered { edge, .. } | Self::Left { edge, .. } => *edge,
        }
    }

    /// The epoch of the interval this event opens or closes.
    pub fn epoch(&self) -> u64 {
        match self {
            Self::Entered { epoch, .. } | Self::Left { epoch, .. } => *epoch,
        }
    }

    /// `true` for `Entered`.
    pub fn in_range(&self) -> bool {
        matches!(self, Self::Entered { .. })
    }
}
