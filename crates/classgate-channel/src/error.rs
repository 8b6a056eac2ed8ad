//! Error types for the control channel.

use std::time::Duration;

use classgate_protocol::ProtocolError;
use classgate_transport::TransportError;

/// Errors from the control channel.
///
/// Inside the channel task every one of these means "drop the connection
/// and reconnect later". They are logged and never reach an HTTP client.
/// Only [`NotConnected`](Self::NotConnected),
/// [`Unavailable`](Self::Unavailable) and
/// [`InvalidUrl`](Self::InvalidUrl) are returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The WebSocket layer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The authority broke the Engine.IO / Socket.IO handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The authority refused the namespace connect (`connect_error`).
    #[error("authority refused connection: {0}")]
    Refused(String),

    /// No frame arrived within `pingInterval + pingTimeout`.
    #[error("no heartbeat from authority for {0:?}")]
    HeartbeatTimeout(Duration),

    /// The authority closed the connection or disconnected the namespace.
    #[error("authority closed the connection: {0}")]
    Closed(String),

    /// `emit` was called while the channel is between connections.
    #[error("control channel is not connected")]
    NotConnected,

    /// The channel task has stopped.
    #[error("control channel has shut down")]
    Unavailable,

    /// The authority URL is not `http(s)://` or `ws(s)://`.
    #[error("invalid authority url: {0}")]
    InvalidUrl(String),
}
