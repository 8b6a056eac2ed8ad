//! Structural decoding of compact `header.payload.signature` assertions.
//!
//! This does **not** check the signature. The gateway accepts whatever
//! arrives on `/login?token=` because the browser was sent there by the
//! authority's own redirect; see [`TokenVerifier`](crate::TokenVerifier)
//! for the opt-in alternative.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Value};

use crate::{DecodeError, TokenClaims};

/// base64url that accepts both padded and unpadded segments.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The two readable parts of an assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// The JOSE header (`alg`, `typ`, ...).
    pub header: Map<String, Value>,
    /// The claims carried in the payload.
    pub claims: TokenClaims,
}

/// Decodes an assertion into its claims without verifying it.
///
/// # Errors
/// - [`DecodeError::SegmentCount`]: not exactly three segments
/// - [`DecodeError::Base64`]: a segment is not base64url
/// - [`DecodeError::Json`]: header or payload is not a JSON object
/// - [`DecodeError::MissingDisplayName`]: payload lacks `displayName`
pub fn decode(token: &str) -> Result<TokenClaims, DecodeError> {
    decode_parts(token).map(|decoded| decoded.claims)
}

/// Like [`decode`], but also returns the header.
pub fn decode_parts(token: &str) -> Result<DecodedToken, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(DecodeError::SegmentCount(segments.len()));
    };

    let header = decode_object("header", header)?;
    let payload = decode_object("payload", payload)?;

    // Unsigned tokens have an empty signature; anything else must at
    // least be well-formed base64url.
    if !signature.is_empty() {
        URL_SAFE_LENIENT.decode(signature).map_err(|source| {
            DecodeError::Base64 {
                segment: "signature",
                source,
            }
        })?;
    }

    if !matches!(payload.get("displayName"), Some(Value::String(_))) {
        return Err(DecodeError::MissingDisplayName);
    }
    let claims: TokenClaims = serde_json::from_value(Value::Object(payload))
        .map_err(|source| DecodeError::Json {
            segment: "payload",
            source,
        })?;

    Ok(DecodedToken { header, claims })
}

fn decode_object(
    segment: &'static str,
    encoded: &str,
) -> Result<Map<String, Value>, DecodeError> {
    let bytes = URL_SAFE_LENIENT
        .decode(encoded)
        .map_err(|source| DecodeError::Base64 { segment, source })?;
    serde_json::from_slice(&bytes)
        .map_err(|source| DecodeError::Json { segment, source })
}
