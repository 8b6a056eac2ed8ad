//! Error types for the protocol layer.
//!
//! Each crate in classgate defines its own error enum. When you see a
//! `ProtocolError`, you know a frame arrived but could not be understood;
//! the socket itself was fine.

/// Errors that can occur while encoding or decoding control-channel
/// packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an event payload to JSON failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The JSON part of a packet could not be parsed.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is structurally invalid: empty, unknown packet type, or
    /// a data section of the wrong shape.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// A well-formed packet type that classgate does not handle, such as
    /// Socket.IO binary events.
    #[error("unsupported packet: {0}")]
    Unsupported(String),
}
