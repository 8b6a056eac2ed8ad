//! Session types: the data structures behind a browser's login.
//!
//! A "session" is the server's record of one browser. It tracks:
//! - WHICH browser it is (a random [`SessionId`], carried in a cookie)
//! - WHO logged in there (`user`) and with WHAT assertion (`token_claims`)
//! - WHEN the record stops counting (`expires_at`)

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for cookies and session lifetime.
///
/// Sensible defaults are provided; the gateway overrides individual
/// fields from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name of the cookie holding the signed session id.
    ///
    /// Default: `connect.sid`, the name Express uses.
    pub cookie_name: String,

    /// How long (in seconds) a session stays valid after it is written.
    ///
    /// Default: one day.
    pub max_age_secs: u64,

    /// Whether the cookie carries the `Secure` attribute. Turn this on when
    /// the gateway is served over HTTPS.
    pub secure: bool,

    /// How often (in seconds) expired sessions are deleted from the store.
    ///
    /// Default: 15 minutes. Expired sessions are invisible to
    /// [`SessionStore::get`](crate::SessionStore::get) even before they
    /// are reaped; reaping only reclaims space.
    pub reap_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "connect.sid".to_string(),
            max_age_secs: 86_400,
            secure: false,
            reap_interval_secs: 900,
        }
    }
}

impl SessionConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// - `max_age_secs` and `reap_interval_secs` are at least 1; a zero
    ///   interval would make `tokio::time::interval` panic.
    /// - An empty `cookie_name` falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.max_age_secs == 0 {
            warn!("max_age_secs is 0, using 1");
            self.max_age_secs = 1;
        }
        if self.reap_interval_secs == 0 {
            warn!("reap_interval_secs is 0, using 1");
            self.reap_interval_secs = 1;
        }
        if self.cookie_name.is_empty() {
            self.cookie_name = Self::default().cookie_name;
        }
        self
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// An opaque, unguessable session identifier.
///
/// New ids are 24 random bytes (192 bits) encoded as 32 characters of
/// URL-safe base64. Ids read back from a cookie are accepted as-is, so a
/// session written by another implementation keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        let bytes: [u8; 24] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps an id that was read from a verified cookie or the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionData
// ---------------------------------------------------------------------------

/// What the server remembers about a browser.
///
/// Serialized as JSON (`{"user": ..., "tokenClaims": ...}`) in the
/// session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// The logged-in user's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// The full decoded assertion the user logged in with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_claims: Option<Value>,
}

impl SessionData {
    /// Data for a completed login.
    pub fn authenticated(user: impl Into<String>, token_claims: Value) -> Self {
        Self {
            user: Some(user.into()),
            token_claims: Some(token_claims),
        }
    }

    /// The user, if there is a non-empty one.
    ///
    /// A session without a user (or with `""`) does not count as logged
    /// in, no matter what else it holds.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().filter(|user| !user.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A stored session: id, data and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub data: SessionData,
    /// Milliseconds since the Unix epoch after which the session is gone.
    pub expires_at: u64,
}

impl Session {
    /// A session that expires `max_age` from now.
    pub fn new(id: SessionId, data: SessionData, max_age: Duration) -> Self {
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        Self {
            id,
            data,
            expires_at: now_millis().saturating_add(max_age_ms),
        }
    }

    /// Returns `true` if the session has expired at `now` (epoch millis).
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.is_authenticated()
    }
}

/// The current wall-clock time in milliseconds since the Unix epoch.
///
/// Session expiry is stored as wall-clock time (not `Instant`) because it
/// has to survive restarts in the SQLite store.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_produces_32_char_url_safe_ids() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_produces_distinct_ids() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_data_with_user_is_authenticated() {
        let data = SessionData::authenticated("alice", json!({}));
        assert!(data.is_authenticated());
        assert_eq!(data.user(), Some("alice"));
    }

    #[test]
    fn test_data_without_user_is_not_authenticated() {
        assert!(!SessionData::default().is_authenticated());
    }

    #[test]
    fn test_data_with_empty_user_is_not_authenticated() {
        let data = SessionData {
            user: Some(String::new()),
            token_claims: Some(json!({"displayName": ""})),
        };
        assert!(!data.is_authenticated());
        assert_eq!(data.user(), None);
    }

    #[test]
    fn test_data_serializes_camel_case() {
        let data = SessionData::authenticated("alice", json!({"id": 1}));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"user": "alice", "tokenClaims": {"id": 1}})
        );
    }

    #[test]
    fn test_data_deserializes_without_fields() {
        let data: SessionData = serde_json::from_str("{}").unwrap();
        assert_eq!(data, SessionData::default());
    }

    #[test]
    fn test_session_new_expires_after_max_age() {
        let before = now_millis();
        let session = Session::new(
            SessionId::generate(),
            SessionData::default(),
            Duration::from_secs(60),
        );
        assert!(session.expires_at >= before + 60_000);
        assert!(!session.is_expired_at(before));
        assert!(session.is_expired_at(session.expires_at + 1));
    }

    #[test]
    fn test_validated_clamps_zero_values() {
        let config = SessionConfig {
            cookie_name: String::new(),
            max_age_secs: 0,
            secure: false,
            reap_interval_secs: 0,
        }
        .validated();

        assert_eq!(config.cookie_name, "connect.sid");
        assert_eq!(config.max_age_secs, 1);
        assert_eq!(config.reap_interval_secs, 1);
    }
}
