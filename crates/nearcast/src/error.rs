//! Unified error type for the Nearcast server.

use nearcast_presence::PresenceError;
use nearcast_protocol::ProtocolError;
use nearcast_signal::SignalError;
use nearcast_transport::{ConnectionId, TransportError};

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NearcastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The world configuration was rejected.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A signaling message could not be relayed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// The client did not finish the protocol handshake in time.
    #[error("handshake on {0} timed out")]
    HandshakeTimeout(ConnectionId),

    /// The world actor has stopped; no further commands are accepted.
    #[error("world actor is not running")]
    WorldClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearcast_protocol::PlayerId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Close("gone".into());
        let nearcast_err: NearcastError = err.into();
        assert!(matches!(nearcast_err, NearcastError::Transport(_)));
        assert!(nearcast_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let nearcast_err: NearcastError = err.into();
        assert!(matches!(nearcast_err, NearcastError::Protocol(_)));
    }

    #[test]
    fn test_from_presence_error() {
        let err = PresenceError::InvalidDimension {
            name: "world_width",
            value: -1.0,
        };
        let nearcast_err: NearcastError = err.into();
        assert!(matches!(nearcast_err, NearcastError::Presence(_)));
    }

    #[test]
    fn test_from_signal_error() {
        let err = SignalError::SelfTarget(PlayerId(3));
        let nearcast_err: NearcastError = err.into();
        assert!(matches!(nearcast_err, NearcastError::Signal(_)));
        assert!(nearcast_err.to_string().contains("P-3"));
    }

    #[test]
    fn test_handshake_timeout_names_connection() {
        let err = NearcastError::HandshakeTimeout(ConnectionId::new(12));
        assert_eq!(err.to_string(), "handshake on conn-12 timed out");
    }
}
