//! Control-channel wire protocol for classgate.
//!
//! This crate defines the "language" the gateway speaks with the
//! authority's control endpoint:
//!
//! - **Types** ([`Packet`], [`ControlEvent`], [`OpenHandshake`]): the
//!   Engine.IO / Socket.IO structures that travel on the wire.
//! - **Codec** ([`encode`], [`decode`]): how packets become text frames
//!   and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong in between.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text frames) and the
//! channel actor (events and cached state). It knows nothing about
//! sockets or reconnection.
//!
//! ```text
//! Transport (frames) → Protocol (Packet) → Channel (current class)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use types::{
    ControlEvent, OpenHandshake, Packet, DEFAULT_NAMESPACE, GET_ACTIVE_CLASS,
    SET_CLASS,
};
