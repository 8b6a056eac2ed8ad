//! Error types for the identity store.

/// Errors that can occur while reading or writing user records.
///
/// The handshake logs these and carries on; a failed upsert never blocks
/// a login.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The username was empty. Empty display names never identify anyone.
    #[error("username must not be empty")]
    EmptyUsername,

    /// SQLite rejected the statement or could not open the database.
    #[error("identity database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection lock.
    #[error("identity database lock poisoned")]
    Poisoned,

    /// The blocking task running the query was cancelled or panicked.
    #[error("identity task failed: {0}")]
    Task(String),
}
