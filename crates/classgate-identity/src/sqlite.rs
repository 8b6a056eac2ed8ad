//! SQLite-backed identity store.
//!
//! `rusqlite::Connection` is synchronous, so every query runs on tokio's
//! blocking pool via `spawn_blocking`, holding a `std::sync::Mutex` for the
//! duration of the statement. The mutex is never held across an `.await`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::store::check_username;
use crate::{IdentityError, IdentityStore, Upsert, UserRecord};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY NOT NULL
)";

/// An [`IdentityStore`] persisted in a SQLite `users` table.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIdentityStore {
    /// Opens (or creates) the database at `path` and makes sure the
    /// `users` table exists.
    ///
    /// # Errors
    /// Returns [`IdentityError::Database`] if the file cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened identity database");
        Self::from_connection(conn)
    }

    /// An in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, IdentityError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, IdentityError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, IdentityError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, IdentityError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| IdentityError::Poisoned)?;
            f(&*guard)
        })
        .await
        .map_err(|e| IdentityError::Task(e.to_string()))?
    }
}

impl IdentityStore for SqliteIdentityStore {
    async fn upsert(&self, username: &str) -> Result<Upsert, IdentityError> {
        check_username(username)?;
        let username = username.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO users (username) VALUES (?1)",
                params![username],
            )?;
            if changed == 0 {
                Ok(Upsert::Existing)
            } else {
                debug!(%username, "recorded new user");
                Ok(Upsert::Inserted)
            }
        })
        .await
    }

    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, IdentityError> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT username FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(found.map(|username| UserRecord { username }))
        })
        .await
    }

    async fn list(&self) -> Result<Vec<UserRecord>, IdentityError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT username FROM users ORDER BY username")?;
            let rows = stmt.query_map([], |row| {
                Ok(UserRecord {
                    username: row.get(0)?,
                })
            })?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
    }
}
