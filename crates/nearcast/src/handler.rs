//! Per-connection handler: decoding, dispatch, and outbound writing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the transport handshake, bounded by `handshake_timeout`
//!   2. Register with the world (the world spawns the player and sends
//!      `init`)
//!   3. Run the reader and the writer side by side; whichever ends first
//!      ends the connection
//!   4. Run the world's disconnect path, then close the transport

use std::fmt;
use std::time::Duration;

use nearcast_protocol::{ClientMessage, Codec, JsonCodec, PlayerId};
use nearcast_transport::{Connection, Handshake, TransportError};
use tokio::sync::mpsc;

use crate::world::{Frame, WorldHandle};
use crate::NearcastError;

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Frames queued for one connection before it counts as too slow and
    /// is disconnected.
    pub outbound_queue: usize,

    /// Longest a single transport send may take before the connection is
    /// treated as dead.
    pub send_timeout: Duration,

    /// Disconnect a client that sends nothing for this long. `None`
    /// (the default) keeps silent clients; standing still is normal.
    pub idle_timeout: Option<Duration>,

    /// Longest the WebSocket upgrade may take after the TCP accept.
    pub handshake_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            send_timeout: Duration::from_millis(250),
            idle_timeout: None,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a connection ended. Logged, never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disconnect {
    Closed,
    IdleTimeout,
    SendTimeout,
    Transport(String),
    /// The world dropped the outbound queue (evicted or shut down).
    Evicted,
    WorldClosed,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed by peer"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::SendTimeout => f.write_str("send timeout"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Evicted => f.write_str("evicted by world"),
            Self::WorldClosed => f.write_str("world closed"),
        }
    }
}

/// Drop guard that runs the disconnect path when the handler exits.
///
/// Fires even if the handler task is cancelled or panics. `Drop` is
/// synchronous, so the leave command is sent from a spawned task.
struct LeaveGuard {
    id: PlayerId,
    world: WorldHandle,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let id = self.id;
        let world = self.world.clone();
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                let _ = world.leave(id).await;
            });
        }
    }
}

/// Completes the handshake for an accepted socket, then serves it.
pub(crate) async fn handle_incoming<H>(
    incoming: H,
    world: WorldHandle,
    config: ConnectionConfig,
) -> Result<(), NearcastError>
where
    H: Handshake<Error = TransportError>,
{
    let id = incoming.id();
    let conn = match tokio::time::timeout(config.handshake_timeout, incoming.complete()).await {
        Ok(conn) => conn?,
        Err(_) => return Err(NearcastError::HandshakeTimeout(id)),
    };
    handle_connection(conn, world, config).await
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    world: WorldHandle,
    config: ConnectionConfig,
) -> Result<(), NearcastError> {
    let id = PlayerId::from(conn.id());
    tracing::debug!(conn_id = %conn.id(), player_id = %id, "handling new connection");

    let (tx, mut rx) = mpsc::channel::<Frame>(config.outbound_queue.max(1));
    world.connect(id, tx).await?;
    let guard = LeaveGuard {
        id,
        world: world.clone(),
    };

    let reason = tokio::select! {
        reason = read_loop(&conn, &world, id, config.idle_timeout) => reason,
        reason = write_loop(&conn, &mut rx, config.send_timeout) => reason,
    };

    match &reason {
        Disconnect::Closed => tracing::info!(player_id = %id, "connection closed"),
        other => tracing::info!(player_id = %id, reason = %other, "connection dropped"),
    }

    // Leave first: closing a peer that stopped reading can take as long
    // as the stalled send did.
    drop(guard);
    match tokio::time::timeout(config.send_timeout, conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::trace!(player_id = %id, error = %e, "close after disconnect failed")
        }
        Err(_) => tracing::trace!(player_id = %id, "close after disconnect timed out"),
    }
    Ok(())
}

/// Reads frames and forwards them to the world until the connection ends.
///
/// Malformed frames are dropped; the connection stays open.
async fn read_loop<C: Connection>(
    conn: &C,
    world: &WorldHandle,
    id: PlayerId,
    idle_timeout: Option<Duration>,
) -> Disconnect {
    let codec = JsonCodec;
    loop {
        let received = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(r) => r,
                Err(_) => return Disconnect::IdleTimeout,
            },
            None => conn.recv().await,
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => return Disconnect::Closed,
            Err(e) => return Disconnect::Transport(e.to_string()),
        };

        let msg: ClientMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(player_id = %id, error = %e, "dropping malformed frame");
                continue;
            }
        };

        let forwarded = match msg {
            ClientMessage::Move { x, y } => world.move_to(id, x, y).await,
            other => match other.into_signal() {
                Some((kind, signal)) => world.signal(id, kind, signal).await,
                None => Ok(()),
            },
        };
        if forwarded.is_err() {
            return Disconnect::WorldClosed;
        }
    }
}

/// Drains the outbound queue onto the transport.
async fn write_loop<C: Connection>(
    conn: &C,
    rx: &mut mpsc::Receiver<Frame>,
    send_timeout: Duration,
) -> Disconnect {
    while let Some(frame) = rx.recv().await {
        match tokio::time::timeout(send_timeout, conn.send(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Disconnect::Transport(e.to_string()),
            Err(_) => return Disconnect::SendTimeout,
        }
    }
    Disconnect::Evicted
}
