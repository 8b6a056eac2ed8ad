//! Signed session cookies.
//!
//! The browser holds only the session id, and it must not be able to pick
//! someone else's. So the cookie value is the id plus an HMAC-SHA256 of it
//! under the server's secret:
//!
//! ```text
//! connect.sid=s%3A<id>.<base64 signature without padding>
//! ```
//!
//! which is byte-for-byte what Express's `express-session` writes.

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{SessionConfig, SessionError, SessionId};

type HmacSha256 = Hmac<Sha256>;

/// Signs session ids into cookie values and verifies them on the way back.
///
/// Cloning is cheap enough to do per request: it copies the keyed HMAC
/// state, not the secret.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    /// Creates a signer keyed with `secret`.
    ///
    /// # Errors
    /// Returns [`SessionError::EmptySecret`] if `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SessionError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        // HMAC accepts keys of any length; the error branch is unreachable
        // for non-empty secrets.
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|_| SessionError::EmptySecret)?;
        Ok(Self { mac })
    }

    /// Produces the (percent-encoded) cookie value for `id`.
    pub fn sign(&self, id: &SessionId) -> String {
        let signature = STANDARD_NO_PAD.encode(self.signature(id.as_str()));
        let value = format!("s:{id}.{signature}");
        urlencoding::encode(&value).into_owned()
    }

    /// Recovers the session id from a cookie value.
    ///
    /// # Errors
    /// - [`SessionError::MalformedCookie`]: not `s:<id>.<signature>`
    /// - [`SessionError::BadSignature`]: signature does not match the id
    pub fn unsign(&self, cookie_value: &str) -> Result<SessionId, SessionError> {
        let decoded = urlencoding::decode(cookie_value)
            .map_err(|_| SessionError::MalformedCookie)?;
        let signed = decoded
            .strip_prefix("s:")
            .ok_or(SessionError::MalformedCookie)?;
        // Ids may contain dots; the signature never does.
        let (id, signature) = signed
            .rsplit_once('.')
            .ok_or(SessionError::MalformedCookie)?;
        if id.is_empty() {
            return Err(SessionError::MalformedCookie);
        }

        let signature = STANDARD_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::BadSignature)?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        // `verify_slice` compares in constant time.
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        Ok(SessionId::from_raw(id))
    }

    fn signature(&self, id: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// Finds cookie `name` in a `Cookie` request header value.
///
/// Returns the raw (still percent-encoded) value.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Builds the `Set-Cookie` header value that stores `value`.
///
/// The browser keeps the cookie for the same `max_age` as the store keeps
/// the session. `SameSite=Lax` still sends it on the top-level redirect
/// back from the authority.
pub fn set_cookie_header(config: &SessionConfig, value: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax{}",
        config.cookie_name,
        value,
        config.max_age_secs,
        secure_suffix(config),
    )
}

/// Builds the `Set-Cookie` header value that deletes the session cookie.
pub fn clear_cookie_header(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax{}",
        config.cookie_name,
        secure_suffix(config),
    )
}

fn secure_suffix(config: &SessionConfig) -> &'static str {
    if config.secure { "; Secure" } else { "" }
}
