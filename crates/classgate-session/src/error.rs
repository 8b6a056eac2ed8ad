//! Error types for the session layer.

/// Errors that can occur while signing cookies or storing sessions.
///
/// Cookie errors mean "this browser has no usable session"; the gateway
/// treats them exactly like a missing cookie. Store errors are logged and
/// never reach the browser.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The cookie signing secret was empty.
    #[error("session secret must not be empty")]
    EmptySecret,

    /// The cookie value is not of the form `s:<id>.<signature>`.
    #[error("malformed session cookie")]
    MalformedCookie,

    /// The cookie's signature does not match its id.
    /// Either the secret changed or someone edited the cookie.
    #[error("session cookie signature mismatch")]
    BadSignature,

    /// SQLite rejected the statement or could not open the database.
    #[error("session database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The stored session data could not be (de)serialized.
    #[error("session data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another thread panicked while holding the connection lock.
    #[error("session database lock poisoned")]
    Poisoned,

    /// The blocking task running the query was cancelled or panicked.
    #[error("session task failed: {0}")]
    Task(String),
}
