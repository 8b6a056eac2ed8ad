use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target URL or one of the request headers was rejected before
    /// any network I/O happened.
    #[error("invalid connect request: {0}")]
    InvalidRequest(String),

    /// Opening the connection failed (DNS, TCP, TLS, or the upgrade).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The connect attempt did not finish within the configured limit.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
