//! The authority control channel for classgate.
//!
//! Besides redirect-based login, the authority pushes live state to the
//! gateway, most importantly which class is currently active. This crate
//! keeps one long-lived Socket.IO connection to the authority open for the
//! gateway's whole lifetime and turns what arrives on it into a value that
//! HTTP handlers can read.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← reads ClassView, may emit / subscribe via ChannelHandle
//!     ↕
//! Channel Layer (this crate)  ← handshake, heartbeat, reconnect, events
//!     ↕
//! Protocol Layer  ← Engine.IO / Socket.IO packet codec
//!     ↕
//! Transport Layer  ← WebSocket client
//! ```
//!
//! The channel never fails an HTTP request. If the authority is down the
//! last known class simply stays in place until the channel reconnects.

mod authority;
mod backoff;
mod channel;
mod class;
mod error;

pub use authority::{authority_connector, authority_namespace, engine_io_url};
pub use backoff::{Backoff, BackoffConfig};
pub use channel::{ChannelConfig, ChannelHandle, ChannelStatus, ControlChannel};
pub use class::{ClassCell, ClassView};
pub use error::ChannelError;
