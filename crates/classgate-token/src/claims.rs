use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The payload of an authority assertion.
///
/// Only `displayName` is required; every other field the authority puts
/// in the token is kept verbatim in `extra` so it can be stored with the
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The user's display name. Becomes the session's `user` and the
    /// identity record's key.
    #[serde(rename = "displayName")]
    pub display_name: String,

    /// Authority-defined claims (`id`, `permissions`, `iat`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Returns the claims as a single JSON object, `displayName` included.
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(
            "displayName".to_string(),
            Value::String(self.display_name.clone()),
        );
        Value::Object(map)
    }

    /// Looks up an authority-defined claim.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_deserialize_splits_display_name_from_extra() {
        let claims: TokenClaims = serde_json::from_value(json!({
            "displayName": "alice",
            "id": 4,
            "permissions": 2
        }))
        .unwrap();
        assert_eq!(claims.display_name, "alice");
        assert_eq!(claims.get("id"), Some(&json!(4)));
        assert!(claims.get("displayName").is_none());
    }

    #[test]
    fn test_claims_to_value_includes_display_name() {
        let claims: TokenClaims =
            serde_json::from_value(json!({"displayName": "bob", "id": 1}))
                .unwrap();
        assert_eq!(claims.to_value(), json!({"displayName": "bob", "id": 1}));
    }
}
