//! The user store behind classgate's login handshake.
//!
//! Every successful login records the user's display name here. The
//! write is an *upsert*: the first login creates the row, every later
//! login finds it and does nothing. Nothing in the gateway reads these
//! records back yet; they exist so other tools sharing the database know
//! who has ever signed in.
//!
//! Two implementations of [`IdentityStore`] ship with the crate:
//!
//! - [`SqliteIdentityStore`]: the production store, one `users` table in
//!   `app.db`.
//! - [`MemoryIdentityStore`]: a process-local set for tests.

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::IdentityError;
pub use memory::MemoryIdentityStore;
pub use sqlite::SqliteIdentityStore;
pub use store::{IdentityStore, Upsert, UserRecord};
