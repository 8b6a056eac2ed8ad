//! # classgate
//!
//! A login gateway in front of a central authority.
//!
//! The authority owns accounts and decides which class is running. The
//! gateway does three things with that:
//!
//! 1. **Handshake**: sends unauthenticated browsers to the authority,
//!    takes back the signed assertion at `/login?token=...`, and turns
//!    it into a cookie-backed session.
//! 2. **Guard**: every protected route sees either a logged-in
//!    [`Viewer`] or a redirect to `/login`.
//! 3. **Control channel**: keeps a Socket.IO connection open to the
//!    authority so the current class (`setClass`) is always at hand.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classgate::prelude::*;
//!
//! # async fn start() -> Result<(), GatewayError> {
//! let config = GatewayConfig::from_env()?;
//! let gateway = GatewayBuilder::new(config).build().await?;
//! gateway.run().await
//! # }
//! ```
//!
//! Protected pages are plain axum routes taking a [`Viewer`]:
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use classgate::prelude::*;
//!
//! async fn hello(viewer: Viewer) -> String {
//!     format!("hello {}", viewer.user)
//! }
//!
//! # async fn start() -> Result<(), GatewayError> {
//! let gateway = GatewayBuilder::new(GatewayConfig::from_env()?)
//!     .pages(Router::new().route("/", get(hello)))
//!     .build()
//!     .await?;
//! # gateway.run().await
//! # }
//! ```

mod config;
mod error;
mod guard;
mod handshake;
mod pages;
mod server;

pub use config::{load_env_file, GatewayConfig, VerifyKey, VerifySettings};
pub use error::GatewayError;
pub use guard::{require_login, Viewer};
pub use handshake::{login, logout, LoginQuery};
pub use pages::index;
pub use server::{
    default_pages, router, Gateway, GatewayBuilder, GatewayState, IDENTITY_DB, SESSION_DB,
};

/// Re-exports for the common case of building and running a gateway.
pub mod prelude {
    pub use crate::{
        router, Gateway, GatewayBuilder, GatewayConfig, GatewayError, GatewayState, Viewer,
    };
    pub use classgate_channel::{ChannelHandle, ChannelStatus, ClassCell, ClassView};
    pub use classgate_identity::{IdentityStore, MemoryIdentityStore, SqliteIdentityStore};
    pub use classgate_protocol::ControlEvent;
    pub use classgate_session::{MemorySessionStore, SessionStore, SqliteSessionStore};
    pub use classgate_token::{TokenClaims, TokenVerifier};
}
