//! Opt-in signature verification.
//!
//! By default the gateway trusts the redirect that delivered the token
//! and only decodes it. A [`TokenVerifier`] built with a key additionally
//! checks the signature (and `exp`/`nbf` when present) before any claim
//! is accepted. Decoding behaviour is otherwise identical, so enabling
//! verification never changes what a *valid* login looks like.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{decode, DecodeError, TokenClaims};

/// Decides whether assertion signatures are checked.
#[derive(Clone, Default)]
pub enum TokenVerifier {
    /// Structural decode only. This is the default.
    #[default]
    Disabled,

    /// Verify with `key` under `validation` before decoding.
    Enabled {
        key: DecodingKey,
        validation: Validation,
    },
}

impl TokenVerifier {
    /// Builds a verifier for `algorithm`.
    ///
    /// `key` is the shared secret for `HS*` algorithms and a PEM-encoded
    /// public key for everything else.
    ///
    /// # Errors
    /// Returns [`DecodeError::Verification`] if the PEM cannot be parsed.
    pub fn new(algorithm: Algorithm, key: &[u8]) -> Result<Self, DecodeError> {
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(key)
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(key)?,
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key)?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key)?,
        };

        let mut validation = Validation::new(algorithm);
        // The authority decides which registered claims it issues; only
        // check the ones that are present.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Ok(Self::Enabled { key, validation })
    }

    /// Returns `true` if signatures are checked.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    /// Verifies (when enabled) and decodes `token`.
    ///
    /// # Errors
    /// Any [`DecodeError`]; malformed tokens are reported as structural
    /// errors even when verification is enabled.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, DecodeError> {
        let claims = decode(token)?;
        if let Self::Enabled { key, validation } = self {
            jsonwebtoken::decode::<serde_json::Value>(token, key, validation)?;
        }
        Ok(claims)
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "TokenVerifier::Disabled"),
            Self::Enabled { validation, .. } => f
                .debug_struct("TokenVerifier::Enabled")
                .field("algorithms", &validation.algorithms)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"authority-shared-secret";

    fn signed(claims: serde_json::Value, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn test_default_verifier_is_disabled() {
        assert!(!TokenVerifier::default().is_enabled());
    }

    #[test]
    fn test_disabled_accepts_any_signature() {
        let token = signed(json!({"displayName": "alice"}), b"someone-else");

        let claims = TokenVerifier::Disabled.decode(&token).unwrap();

        assert_eq!(claims.display_name, "alice");
    }

    #[test]
    fn test_enabled_accepts_correct_signature() {
        let verifier = TokenVerifier::new(Algorithm::HS256, SECRET).unwrap();
        let token = signed(json!({"displayName": "alice", "id": 3}), SECRET);

        let claims = verifier.decode(&token).expect("should verify");

        assert_eq!(claims.display_name, "alice");
        assert_eq!(claims.get("id"), Some(&json!(3)));
    }

    #[test]
    fn test_enabled_rejects_wrong_signature() {
        let verifier = TokenVerifier::new(Algorithm::HS256, SECRET).unwrap();
        let token = signed(json!({"displayName": "mallory"}), b"forged");

        let result = verifier.decode(&token);

        assert!(matches!(result, Err(DecodeError::Verification(_))));
    }

    #[test]
    fn test_enabled_rejects_expired_token() {
        let verifier = TokenVerifier::new(Algorithm::HS256, SECRET).unwrap();
        let token = signed(json!({"displayName": "alice", "exp": 1}), SECRET);

        assert!(matches!(
            verifier.decode(&token),
            Err(DecodeError::Verification(_))
        ));
    }

    #[test]
    fn test_enabled_reports_malformed_token_structurally() {
        let verifier = TokenVerifier::new(Algorithm::HS256, SECRET).unwrap();
        assert!(matches!(
            verifier.decode("nope"),
            Err(DecodeError::SegmentCount(1))
        ));
    }

    #[test]
    fn test_new_with_bad_pem_fails() {
        let result = TokenVerifier::new(Algorithm::RS256, b"not a pem");
        assert!(matches!(result, Err(DecodeError::Verification(_))));
    }

    #[test]
    fn test_debug_does_not_print_key() {
        let verifier = TokenVerifier::new(Algorithm::HS256, SECRET).unwrap();
        let printed = format!("{verifier:?}");
        assert!(printed.contains("HS256"));
        assert!(!printed.contains("authority-shared-secret"));
    }
}
