//! Browser sessions for classgate.
//!
//! This crate handles the lifecycle of a browser's login state:
//!
//! 1. **Identification**: a random [`SessionId`] that the browser holds in
//!    a signed cookie ([`CookieSigner`]). The browser never sees the claims.
//! 2. **Storage**: what the server remembers about that id ([`SessionData`])
//!    and until when, behind the [`SessionStore`] trait.
//! 3. **Expiry**: sessions live for a fixed time after they are written;
//!    [`spawn_reaper`] deletes the ones that have run out.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← reads the cookie, asks the store, guards routes
//!     ↕
//! Session Layer (this crate)  ← signs ids, stores session data, expires it
//!     ↕
//! SQLite / memory (below)
//! ```
//!
//! The cookie format matches Express's `express-session`
//! (`s:<id>.<signature>`), so a gateway and an Express app configured with
//! the same secret can read each other's cookies.

mod cookie;
mod error;
mod memory;
mod reaper;
mod session;
mod sqlite;
mod store;

pub use cookie::{clear_cookie_header, find_cookie, set_cookie_header, CookieSigner};
pub use error::SessionError;
pub use memory::MemorySessionStore;
pub use reaper::spawn_reaper;
pub use session::{now_millis, Session, SessionConfig, SessionData, SessionId};
pub use sqlite::SqliteSessionStore;
pub use store::SessionStore;
