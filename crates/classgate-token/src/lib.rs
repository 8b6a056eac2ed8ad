//! Authority assertion codec for classgate.
//!
//! The authority hands the browser a compact `header.payload.signature`
//! assertion and redirects it to `/login?token=...`. This crate turns that
//! string into [`TokenClaims`].
//!
//! Two modes:
//!
//! 1. [`decode`]: structural only. Splits, base64url-decodes and parses
//!    the JSON, but never looks at the signature. This is how the gateway
//!    behaves out of the box: it trusts the authority's redirect, not
//!    cryptography.
//! 2. [`TokenVerifier`]: the same decode, preceded by a signature check
//!    against a configured authority key.

mod claims;
mod decode;
mod error;
mod verify;

pub use claims::TokenClaims;
pub use decode::{decode, decode_parts, DecodedToken};
pub use error::DecodeError;
pub use jsonwebtoken::Algorithm;
pub use verify::TokenVerifier;
