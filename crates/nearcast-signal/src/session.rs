//! One negotiation between two in-range players.

use nearcast_protocol::{PlayerId, ServerMessage, SessionState, Signal, SignalKind};
use nearcast_proximity::Edge;

use crate::SignalError;

/// Candidates held per direction while the addressee waits for its
/// remote description.
pub const MAX_BUFFERED_CANDIDATES: usize = 128;

/// A message the caller must send to one player.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: PlayerId,
    pub message: ServerMessage,
}

impl Delivery {
    fn new(to: PlayerId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// Negotiation state for one edge.
///
/// The lower id is the *initiator* and is the only side allowed to offer.
///
/// ```text
///            start()            offer(I)              answer(R)
///   Idle ───────────→ OfferSent ────────→ AnswerPending ────────→ Connected
///                                             ↑                      │
///                                             └──────offer(I)────────┘
///   any ──close()──→ Closed
/// ```
///
/// ICE candidates are forwarded as soon as the addressee has the remote
/// description for that direction (the responder once the offer went out,
/// the initiator once the answer went out) and buffered in order until
/// then.
#[derive(Debug)]
pub struct Session {
    edge: Edge,
    epoch: u64,
    state: SessionState,
    /// Initiator → responder candidates waiting for the offer.
    to_responder: Vec<Signal>,
    /// Responder → initiator candidates waiting for the answer.
    to_initiator: Vec<Signal>,
    responder_has_offer: bool,
    initiator_has_answer: bool,
}

impl Session {
    /// A fresh session in `Idle`.
    pub fn new(edge: Edge, epoch: u64) -> Self {
        Self {
            edge,
            epoch,
            state: SessionState::Idle,
            to_responder: Vec::new(),
            to_initiator: Vec::new(),
            responder_has_offer: false,
            initiator_has_answer: false,
        }
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// The edge epoch this session was opened for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn initiator(&self) -> PlayerId {
        self.edge.a()
    }

    pub fn responder(&self) -> PlayerId {
        self.edge.b()
    }

    /// Candidates currently held, `(to_responder, to_initiator)`.
    pub fn buffered(&self) -> (usize, usize) {
        (self.to_responder.len(), self.to_initiator.len())
    }

    /// Tells the initiator to create an offer.
    ///
    /// Only valid from `Idle`; anywhere else it returns nothing.
    pub fn start(&mut self) -> Vec<Delivery> {
        if self.state != SessionState::Idle {
            return Vec::new();
        }
        self.state = SessionState::OfferSent;
        vec![Delivery::new(
            self.initiator(),
            ServerMessage::Initiate {
                peer_id: self.responder(),
            },
        )]
    }

    /// Applies one inbound signal from `from`.
    ///
    /// `signal.sender` must already be set to `from` by the caller.
    pub fn on_signal(
        &mut self,
        from: PlayerId,
        kind: SignalKind,
        signal: Signal,
    ) -> Result<Vec<Delivery>, SignalError> {
        if self.state == SessionState::Closed {
            return Err(self.unexpected(kind, from));
        }
        match kind {
            SignalKind::Offer => self.on_offer(from, signal),
            SignalKind::Answer => self.on_answer(from, signal),
            SignalKind::IceCandidate => self.on_candidate(from, signal),
        }
    }

    fn on_offer(&mut self, from: PlayerId, signal: Signal) -> Result<Vec<Delivery>, SignalError> {
        if from == self.responder() {
            return Err(SignalError::Glare { from });
        }
        match self.state {
            SessionState::OfferSent | SessionState::AnswerPending | SessionState::Connected => {}
            _ => return Err(self.unexpected(SignalKind::Offer, from)),
        }

        let to = self.responder();
        let mut out = vec![Delivery::new(to, ServerMessage::Offer(signal))];
        self.responder_has_offer = true;
        out.extend(
            self.to_responder
                .drain(..)
                .map(|c| Delivery::new(to, ServerMessage::IceCandidate(c))),
        );
        self.state = SessionState::AnswerPending;
        Ok(out)
    }

    fn on_answer(&mut self, from: PlayerId, signal: Signal) -> Result<Vec<Delivery>, SignalError> {
        if from != self.responder() || self.state != SessionState::AnswerPending {
            return Err(self.unexpected(SignalKind::Answer, from));
        }

        let (initiator, responder) = (self.initiator(), self.responder());
        let mut out = vec![Delivery::new(initiator, ServerMessage::Answer(signal))];
        self.initiator_has_answer = true;
        out.extend(
            self.to_initiator
                .drain(..)
                .map(|c| Delivery::new(initiator, ServerMessage::IceCandidate(c))),
        );
        self.state = SessionState::Connected;
        out.push(Delivery::new(
            initiator,
            ServerMessage::SessionState {
                peer_id: responder,
                state: SessionState::Connected,
            },
        ));
        out.push(Delivery::new(
            responder,
            ServerMessage::SessionState {
                peer_id: initiator,
                state: SessionState::Connected,
            },
        ));
        Ok(out)
    }

    fn on_candidate(
        &mut self,
        from: PlayerId,
        signal: Signal,
    ) -> Result<Vec<Delivery>, SignalError> {
        let (to, ready, buffer) = if from == self.initiator() {
            (self.responder(), self.responder_has_offer, &mut self.to_responder)
        } else {
            (self.initiator(), self.initiator_has_answer, &mut self.to_initiator)
        };

        if ready {
            return Ok(vec![Delivery::new(to, ServerMessage::IceCandidate(signal))]);
        }
        if buffer.len() >= MAX_BUFFERED_CANDIDATES {
            return Err(SignalError::BufferFull { to });
        }
        buffer.push(signal);
        tracing::trace!(edge = %self.edge, %to, queued = buffer.len(), "candidate buffered");
        Ok(Vec::new())
    }

    /// Moves to `Closed`, discards buffered candidates, and notifies every
    /// endpoint except `gone` (an endpoint that already disconnected).
    pub fn close(&mut self, gone: Option<PlayerId>) -> Vec<Delivery> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        self.state = SessionState::Closed;
        self.to_responder.clear();
        self.to_initiator.clear();

        let (a, b) = (self.initiator(), self.responder());
        [(a, b), (b, a)]
            .into_iter()
            .filter(|(to, _)| Some(*to) != gone)
            .map(|(to, peer_id)| {
                Delivery::new(
                    to,
                    ServerMessage::SessionState {
                        peer_id,
                        state: SessionState::Closed,
                    },
                )
            })
            .collect()
    }

    fn unexpected(&self, kind: SignalKind, from: PlayerId) -> SignalError {
        SignalError::Unexpected {
            kind,
            from,
            state: self.state,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
