//! Sessions written to a file survive a reopen, and rows written by
//! another `connect-sqlite3` compatible writer are readable.

use std::time::Duration;

use classgate_session::{
    now_millis, CookieSigner, Session, SessionData, SessionId, SessionStore,
    SqliteSessionStore,
};
use serde_json::json;

#[tokio::test]
async fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    let session = Session::new(
        SessionId::generate(),
        SessionData::authenticated("alice", json!({"displayName": "alice"})),
        Duration::from_secs(60),
    );

    {
        let store = SqliteSessionStore::open(&path).unwrap();
        store.set(&session).await.unwrap();
    }

    let store = SqliteSessionStore::open(&path).unwrap();
    let loaded = store.get(&session.id).await.unwrap().expect("persisted");
    assert_eq!(loaded.data.user(), Some("alice"));
}

#[tokio::test]
async fn test_foreign_row_with_extra_fields_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    // Express stores its cookie settings alongside the session fields.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE sessions (sid PRIMARY KEY, expired, sess);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO sessions VALUES ('legacy-sid', ?1, ?2)",
        rusqlite::params![
            i64::try_from(now_millis() + 60_000).unwrap(),
            r#"{"cookie":{"path":"/","httpOnly":true},"user":"bob"}"#,
        ],
    )
    .unwrap();
    drop(conn);

    let store = SqliteSessionStore::open(&path).unwrap();
    let loaded = store
        .get(&SessionId::from_raw("legacy-sid"))
        .await
        .unwrap()
        .expect("row should load");
    assert_eq!(loaded.data.user(), Some("bob"));
    assert_eq!(loaded.data.token_claims, None);
}

#[tokio::test]
async fn test_signed_cookie_leads_back_to_stored_session() {
    let store = SqliteSessionStore::open_in_memory().unwrap();
    let signer = CookieSigner::new("secret").unwrap();
    let session = Session::new(
        SessionId::generate(),
        SessionData::authenticated("carol", json!({})),
        Duration::from_secs(60),
    );
    store.set(&session).await.unwrap();

    let cookie = signer.sign(&session.id);
    let id = signer.unsign(&cookie).unwrap();

    assert_eq!(store.get(&id).await.unwrap(), Some(session));
}
