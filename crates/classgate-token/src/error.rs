//! Error types for token decoding.

/// Why an assertion string could not be turned into claims.
///
/// Every variant is local and recoverable: the handshake controller
/// answers any of them by sending the browser back to `/login`.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The string does not have exactly three `.`-separated segments.
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    /// A segment is not valid base64url.
    #[error("{segment} segment is not base64url: {source}")]
    Base64 {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A segment decoded to bytes that are not a JSON object.
    #[error("{segment} segment is not a JSON object: {source}")]
    Json {
        segment: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The payload has no string `displayName` claim.
    #[error("token payload has no displayName claim")]
    MissingDisplayName,

    /// Signature verification was enabled and rejected the token.
    #[error("token verification failed: {0}")]
    Verification(#[from] jsonwebtoken::errors::Error),
}
