//! Unified error type for the classgate gateway.

use classgate_channel::ChannelError;
use classgate_identity::IdentityError;
use classgate_protocol::ProtocolError;
use classgate_session::SessionError;
use classgate_token::DecodeError;
use classgate_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Startup code (`GatewayBuilder::build`, `main`) deals with this single
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors
/// automatically.
///
/// Request handlers never return it: every failure on the login path ends
/// in a redirect, not an error page.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// An environment variable was set to something unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Binding the listener, creating `DB_DIR`, reading a key file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A transport-level error on the authority connection.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error on the authority connection.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session store or cookie signer failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Identity store failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Token decoding or verification key failure.
    #[error(transparent)]
    Token(#[from] DecodeError),

    /// Control channel setup failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
