use std::future::Future;

use crate::{Session, SessionError, SessionId};

/// Where sessions live between requests.
///
/// # Contract
///
/// - [`set`](Self::set) replaces the whole session in one write, so a
///   reader never sees a user without its claims or the reverse.
/// - [`get`](Self::get) never returns an expired session, reaped or not.
/// - [`expire_stale`](Self::expire_stale) deletes expired sessions and
///   returns how many it removed.
///
/// Methods return `impl Future + Send` so that axum handlers (which must
/// be `Send`) can await them.
pub trait SessionStore: Send + Sync + 'static {
    /// Loads an unexpired session.
    fn get(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;

    /// Creates or replaces a session.
    fn set(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Deletes a session. Deleting an unknown id is not an error.
    fn destroy(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Deletes every expired session.
    fn expire_stale(
        &self,
    ) -> impl Future<Output = Result<usize, SessionError>> + Send;
}
