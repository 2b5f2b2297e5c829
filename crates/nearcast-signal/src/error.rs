//! Error types for the signaling layer.

use nearcast_protocol::{PlayerId, SessionState, SignalKind};

/// Why a signaling message was not relayed.
///
/// None of these are fatal to the connection: the caller logs them at
/// debug and drops the message.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// A player addressed a signal to itself.
    #[error("player {0} addressed a signal to itself")]
    SelfTarget(PlayerId),

    /// There is no session between the two players, either because they
    /// were never in range or because the session already closed.
    #[error("no signaling session between {from} and {to}")]
    NoSession { from: PlayerId, to: PlayerId },

    /// The responder sent an offer. The initiator's offer wins.
    #[error("glare: offer from responder {from} ignored")]
    Glare { from: PlayerId },

    /// The message is not valid in the session's current state, or came
    /// from the wrong side.
    #[error("unexpected {kind} from {from} in state {state}")]
    Unexpected {
        kind: SignalKind,
        from: PlayerId,
        state: SessionState,
    },

    /// Too many candidates queued before the remote description arrived.
    #[error("candidate buffer for {to} is full")]
    BufferFull { to: PlayerId },
}
