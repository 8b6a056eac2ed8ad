//! SQLite-backed session store.
//!
//! The table has the same shape Express's `connect-sqlite3` uses:
//!
//! ```sql
//! sessions(sid TEXT PRIMARY KEY, expired INTEGER, sess TEXT)
//! ```
//!
//! where `expired` is the expiry time in epoch milliseconds and `sess` is
//! the JSON-encoded [`SessionData`](crate::SessionData). Queries run on
//! tokio's blocking pool; the connection mutex is never held across an
//! `.await`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::{now_millis, Session, SessionData, SessionError, SessionId, SessionStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions (
    sid TEXT PRIMARY KEY NOT NULL,
    expired INTEGER NOT NULL,
    sess TEXT NOT NULL
)";

/// A [`SessionStore`] persisted in a SQLite `sessions` table.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Opens (or creates) the database at `path` and makes sure the
    /// `sessions` table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened session database");
        Self::from_connection(conn)
    }

    /// An in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, SessionError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, SessionError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| SessionError::Poisoned)?;
            f(&*guard)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
    }
}

/// SQLite integers are signed; clamp rather than wrap.
fn to_sql_millis(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

impl SessionStore for SqliteSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let sid = id.clone();
        let now = to_sql_millis(now_millis());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT sess, expired FROM sessions WHERE sid = ?1 AND ?2 <= expired",
                    params![sid.as_str(), now],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            let Some((sess, expired)) = row else {
                return Ok(None);
            };
            let data: SessionData = serde_json::from_str(&sess)?;
            Ok(Some(Session {
                id: sid,
                data,
                expires_at: u64::try_from(expired).unwrap_or(0),
            }))
        })
        .await
    }

    async fn set(&self, session: &Session) -> Result<(), SessionError> {
        let sess = serde_json::to_string(&session.data)?;
        let sid = session.id.clone();
        let expired = to_sql_millis(session.expires_at);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sessions (sid, expired, sess) VALUES (?1, ?2, ?3)",
                params![sid.as_str(), expired, sess],
            )?;
            Ok(())
        })
        .await
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        let sid = id.clone();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE sid = ?1", params![sid.as_str()])?;
            Ok(())
        })
        .await
    }

    async fn expire_stale(&self) -> Result<usize, SessionError> {
        let now = to_sql_millis(now_millis());
        self.with_conn(move |conn| {
            let removed =
                conn.execute("DELETE FROM sessions WHERE ?1 > expired", params![now])?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn live(user: &str) -> Session {
        Session::new(
            SessionId::generate(),
            SessionData::authenticated(user, json!({"displayName": user, "id": 9})),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips_data() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = live("alice");

        store.set(&session).await.unwrap();

        assert_eq!(store.get(&session.id).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_get_expired_session_returns_none() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = Session {
            expires_at: now_millis() - 1_000,
            ..live("alice")
        };
        store.set(&session).await.unwrap();

        assert_eq!(store.get(&session.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_destroy_then_get_returns_none() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = live("alice");
        store.set(&session).await.unwrap();

        store.destroy(&session.id).await.unwrap();

        assert_eq!(store.get(&session.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_stale_counts_removed_rows() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let keep = live("alice");
        store.set(&keep).await.unwrap();
        store
            .set(&Session {
                expires_at: 1,
                ..live("bob")
            })
            .await
            .unwrap();

        assert_eq!(store.expire_stale().await.unwrap(), 1);
        assert!(store.get(&keep.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_corrupt_row_is_serialization_error() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let sid = SessionId::from_raw("corrupt");
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO sessions (sid, expired, sess) VALUES ('corrupt', ?1, 'not json')",
                    params![i64::MAX],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(
            store.get(&sid).await,
            Err(SessionError::Serialization(_))
        ));
    }
}
