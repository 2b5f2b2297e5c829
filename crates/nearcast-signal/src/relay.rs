//! The relay: the table of live sessions, keyed by edge.
//!
//! # Concurrency note
//!
//! Like the presence registry, `SignalRelay` is a plain struct owned by the
//! world actor. Edge events and inbound signals reach it in one serialized
//! stream, so a close can never interleave with a half-applied offer.

use std::collections::BTreeMap;

use nearcast_protocol::{PlayerId, Signal, SignalKind};
use nearcast_proximity::{Edge, EdgeEvent};

use crate::{Delivery, Session, SignalError};

/// All live negotiation sessions.
#[derive(Debug, Default)]
pub struct SignalRelay {
    sessions: BTreeMap<Edge, Session>,
}

impl SignalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches a proximity event to the matching handler.
    pub fn on_edge_event(&mut self, event: EdgeEvent) -> Vec<Delivery> {
        match event {
            EdgeEvent::Entered { edge, epoch } => self.on_edge_entered(edge, epoch),
            EdgeEvent::Left { edge, epoch } => self.on_edge_left(edge, epoch),
        }
    }

    /// Opens a session for a newly in-range pair and tells the initiator
    /// to start.
    ///
    /// A leftover session for the same pair (an older epoch) is closed
    /// first so both sides see `closed` before the new `initiate`.
    pub fn on_edge_entered(&mut self, edge: Edge, epoch: u64) -> Vec<Delivery> {
        let mut out = Vec::new();
        if let Some(mut old) = self.sessions.remove(&edge) {
            tracing::debug!(%edge, old = old.epoch(), new = epoch, "replacing stale session");
            out.extend(old.close(None));
        }

        let mut session = Session::new(edge, epoch);
        out.extend(session.start());
        tracing::info!(
            %edge,
            epoch,
            initiator = %session.initiator(),
            "signaling session opened"
        );
        self.sessions.insert(edge, session);
        out
    }

    /// Closes the session for a pair that moved out of range.
    ///
    /// Ignored when the session belongs to a different epoch than `epoch`,
    /// so a late event can never tear down a newer session.
    pub fn on_edge_left(&mut self, edge: Edge, epoch: u64) -> Vec<Delivery> {
        match self.sessions.get(&edge) {
            Some(session) if session.epoch() == epoch => {}
            Some(session) => {
                tracing::debug!(%edge, epoch, current = session.epoch(), "stale edge-left ignored");
                return Vec::new();
            }
            None => return Vec::new(),
        }
        self.close(edge, None)
    }

    /// Routes one inbound negotiation message.
    ///
    /// `sender` is the identity of the connection the frame arrived on and
    /// overwrites whatever the client put in `signal.sender`.
    pub fn on_signal(
        &mut self,
        sender: PlayerId,
        kind: SignalKind,
        mut signal: Signal,
    ) -> Result<Vec<Delivery>, SignalError> {
        let target = signal.target;
        let edge = Edge::new(sender, target).ok_or(SignalError::SelfTarget(sender))?;
        let session = self.sessions.get_mut(&edge).ok_or(SignalError::NoSession {
            from: sender,
            to: target,
        })?;

        signal.sender = Some(sender);
        let before = session.state();
        let out = session.on_signal(sender, kind, signal)?;
        if session.state() != before {
            tracing::info!(%edge, from = %before, to = %session.state(), "session state changed");
        }
        Ok(out)
    }

    /// Closes every session touching `id`, after `id` disconnected.
    ///
    /// Only the surviving endpoints are notified.
    pub fn close_all_for(&mut self, id: PlayerId) -> Vec<Delivery> {
        let edges: Vec<Edge> = self
            .sessions
            .keys()
            .filter(|e| e.touches(id))
            .copied()
            .collect();
        edges
            .into_iter()
            .flat_map(|edge| self.close(edge, Some(id)))
            .collect()
    }

    fn close(&mut self, edge: Edge, gone: Option<PlayerId>) -> Vec<Delivery> {
        let Some(mut session) = self.sessions.remove(&edge) else {
            return Vec::new();
        };
        tracing::info!(%edge, epoch = session.epoch(), "signaling session closed");
        session.close(gone)
    }

    /// The session for a pair, if one is live.
    pub fn get(&self, a: PlayerId, b: PlayerId) -> Option<&Session> {
        Edge::new(a, b).and_then(|e| self.sessions.get(&e))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
