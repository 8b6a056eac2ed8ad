use std::future::Future;

use serde::Serialize;

use crate::IdentityError;

/// A user known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserRecord {
    /// The display name from the user's first login. Unique.
    pub username: String,
}

/// What an [`IdentityStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new record was created.
    Inserted,
    /// A record with this username already existed; nothing changed.
    Existing,
}

/// Persistent, idempotent storage of user records.
///
/// Methods return `impl Future + Send` rather than using `async fn` so
/// that the gateway can call them from inside axum handlers, which must
/// be `Send`.
pub trait IdentityStore: Send + Sync + 'static {
    /// Ensures a record for `username` exists.
    ///
    /// Calling this any number of times with the same name leaves exactly
    /// one record.
    ///
    /// # Errors
    /// [`IdentityError::EmptyUsername`] for `""`, or a storage error.
    fn upsert(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Upsert, IdentityError>> + Send;

    /// Looks up a single user.
    fn find(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, IdentityError>> + Send;

    /// Returns every known user, ordered by username.
    fn list(
        &self,
    ) -> impl Future<Output = Result<Vec<UserRecord>, IdentityError>> + Send;
}

pub(crate) fn check_username(username: &str) -> Result<(), IdentityError> {
    if username.is_empty() {
        return Err(IdentityError::EmptyUsername);
    }
    Ok(())
}
