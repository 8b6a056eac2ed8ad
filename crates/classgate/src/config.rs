//! Gateway configuration, read from the process environment.
//!
//! Variables can also come from a `.env` file in the working directory
//! (see [`load_env_file`]); anything already set in the environment wins.
//!
//! Every setting has a default, so `classgate` starts with no environment
//! at all (pointing at an authority on `localhost:420`). Values that are
//! present but unparseable are an error rather than silently ignored.
//!
//! | Variable               | Default                   |
//! |------------------------|---------------------------|
//! | `PORT`                 | `3000`                    |
//! | `SESSION_SECRET`       | `your_secret_key`         |
//! | `AUTH_URL`             | `http://localhost:420`    |
//! | `THIS_URL`             | `http://localhost:<PORT>` |
//! | `API_KEY`              | `your_api_key`            |
//! | `DB_DIR`               | `./db`                    |
//! | `SESSION_MAX_AGE_SECS` | `86400`                   |
//! | `SESSION_REAP_SECS`    | `900`                     |
//! | `COOKIE_SECURE`        | `false`                   |
//! | `CONTROL_NAMESPACE`    | path of `AUTH_URL`, or `/`|
//! | `AUTH_VERIFY_ALG`      | unset (no verification)   |
//! | `AUTH_VERIFY_KEY`      | unset                     |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use classgate_channel::{authority_namespace, BackoffConfig};
use classgate_session::SessionConfig;
use classgate_token::{Algorithm, TokenVerifier};
use tracing::{debug, warn};

use crate::GatewayError;

/// How to check authority signatures, when enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifySettings {
    pub algorithm: Algorithm,
    pub key: VerifyKey,
}

/// Where the verification key comes from.
#[derive(Clone, PartialEq)]
pub enum VerifyKey {
    /// Shared secret for `HS*` algorithms.
    Secret(String),
    /// Path to a PEM public key for everything else.
    PemFile(PathBuf),
}

impl std::fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret(_) => write!(f, "Secret(..)"),
            Self::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

/// Everything the gateway needs to start.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP port to listen on. `0` picks a free port.
    pub port: u16,
    /// Key for signing session cookies.
    pub session_secret: String,
    /// Base URL of the authority, for redirects and the control channel.
    /// Its path, if any, is the control channel's Socket.IO namespace.
    pub auth_url: String,
    /// This gateway's external base URL, sent to the authority as the
    /// place to come back to.
    pub this_url: String,
    /// Shared secret presented to the authority's control endpoint.
    pub api_key: String,
    /// Directory for `app.db` and `sessions.db`.
    pub db_dir: PathBuf,
    /// Cookie and session lifetime settings.
    pub session: SessionConfig,
    /// Socket.IO namespace of the control channel, overriding the one
    /// named by the path of `auth_url`.
    pub control_namespace: Option<String>,
    /// Reconnect delays of the control channel.
    pub backoff: BackoffConfig,
    /// Signature verification; `None` trusts the redirect.
    pub verify: Option<VerifySettings>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let port = 3000;
        Self {
            port,
            session_secret: "your_secret_key".to_string(),
            auth_url: "http://localhost:420".to_string(),
            this_url: format!("http://localhost:{port}"),
            api_key: "your_api_key".to_string(),
            db_dir: PathBuf::from("./db"),
            session: SessionConfig::default(),
            control_namespace: None,
            backoff: BackoffConfig::default(),
            verify: None,
        }
    }
}

impl GatewayConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// [`GatewayError::Config`] if a variable is set to something that
    /// doesn't parse.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value
    /// of an environment variable by name. Tests pass a closure over a
    /// map instead of touching the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        // Empty values count as unset.
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = parse_or(&get, "PORT", defaults.port)?;
        let this_url = get("THIS_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        let session = SessionConfig {
            max_age_secs: parse_or(&get, "SESSION_MAX_AGE_SECS", defaults.session.max_age_secs)?,
            reap_interval_secs: parse_or(
                &get,
                "SESSION_REAP_SECS",
                defaults.session.reap_interval_secs,
            )?,
            secure: match get("COOKIE_SECURE") {
                Some(value) => parse_bool("COOKIE_SECURE", &value)?,
                None => defaults.session.secure,
            },
            ..defaults.session
        }
        .validated();

        let verify = match (get("AUTH_VERIFY_ALG"), get("AUTH_VERIFY_KEY")) {
            (None, None) => None,
            (Some(alg), Some(key)) => Some(verify_settings(&alg, key)?),
            (Some(_), None) => {
                return Err(GatewayError::Config(
                    "AUTH_VERIFY_ALG is set but AUTH_VERIFY_KEY is not".into(),
                ));
            }
            (None, Some(_)) => {
                return Err(GatewayError::Config(
                    "AUTH_VERIFY_KEY is set but AUTH_VERIFY_ALG is not".into(),
                ));
            }
        };

        let config = Self {
            port,
            session_secret: get("SESSION_SECRET").unwrap_or(defaults.session_secret),
            auth_url: get("AUTH_URL").unwrap_or(defaults.auth_url),
            this_url,
            api_key: get("API_KEY").unwrap_or(defaults.api_key),
            db_dir: get("DB_DIR").map(PathBuf::from).unwrap_or(defaults.db_dir),
            session,
            control_namespace: get("CONTROL_NAMESPACE"),
            backoff: defaults.backoff,
            verify,
        };
        config.warn_on_defaults();
        Ok(config)
    }

    /// The address to listen on: every interface, on `port`.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Where `/login` sends browsers that arrive without a token.
    ///
    /// `THIS_URL` is passed through as-is, the way the authority expects
    /// it.
    pub fn authority_login_url(&self) -> String {
        format!(
            "{}/oauth?redirectURL={}",
            self.auth_url.trim_end_matches('/'),
            self.this_url
        )
    }

    /// The namespace the control channel joins: `CONTROL_NAMESPACE` if
    /// set, otherwise the path of `AUTH_URL` (`/` when there is none).
    ///
    /// # Errors
    /// [`GatewayError::Channel`] if `AUTH_URL` is not a usable URL.
    pub fn control_namespace(&self) -> Result<String, GatewayError> {
        match &self.control_namespace {
            Some(namespace) => Ok(namespace.clone()),
            None => Ok(authority_namespace(&self.auth_url)?),
        }
    }

    /// Builds the token verifier, reading the PEM file if one is
    /// configured.
    ///
    /// # Errors
    /// [`GatewayError::Io`] if the PEM file can't be read,
    /// [`GatewayError::Token`] if the key is unusable.
    pub fn token_verifier(&self) -> Result<TokenVerifier, GatewayError> {
        let Some(verify) = &self.verify else {
            return Ok(TokenVerifier::Disabled);
        };
        let key = match &verify.key {
            VerifyKey::Secret(secret) => secret.clone().into_bytes(),
            VerifyKey::PemFile(path) => std::fs::read(path)?,
        };
        Ok(TokenVerifier::new(verify.algorithm, &key)?)
    }

    fn warn_on_defaults(&self) {
        let defaults = Self::default();
        if self.session_secret == defaults.session_secret {
            warn!("SESSION_SECRET is the default; session cookies are forgeable");
        }
        if self.api_key == defaults.api_key {
            warn!("API_KEY is the default");
        }
    }
}

/// Loads `KEY=value` lines from `path` into the process environment.
///
/// Variables that are already set are left alone. Returns `Ok(false)` when
/// there is no such file.
///
/// Must run before any other thread reads or writes the environment;
/// `main` calls it first thing.
///
/// # Errors
/// [`GatewayError::Config`] if the file exists but can't be read or
/// parsed.
pub fn load_env_file(path: &Path) -> Result<bool, GatewayError> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded environment file");
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(GatewayError::Config(format!("{}: {e}", path.display()))),
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, GatewayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, GatewayError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GatewayError::Config(format!(
            "{name}={raw:?}: expected true or false"
        ))),
    }
}

fn verify_settings(alg: &str, key: String) -> Result<VerifySettings, GatewayError> {
    let algorithm = Algorithm::from_str(alg.trim())
        .map_err(|e| GatewayError::Config(format!("AUTH_VERIFY_ALG={alg:?}: {e}")))?;
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => VerifyKey::Secret(key),
        _ => VerifyKey::PemFile(PathBuf::from(key)),
    };
    Ok(VerifySettings { algorithm, key })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_empty_environment_uses_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.this_url, "http://localhost:3000");
        assert_eq!(config.auth_url, "http://localhost:420");
        assert_eq!(config.db_dir, PathBuf::from("./db"));
        assert_eq!(config.session.cookie_name, "connect.sid");
        assert_eq!(config.session.max_age_secs, 86_400);
        assert!(config.verify.is_none());
    }

    #[test]
    fn test_from_lookup_this_url_follows_port() {
        let config = GatewayConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.this_url, "http://localhost:8080");
        assert_eq!(config.bind_addr().port(), 8080);
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("PORT", "4000"),
            ("SESSION_SECRET", "s3cret"),
            ("AUTH_URL", "https://auth.example.com"),
            ("THIS_URL", "https://gate.example.com"),
            ("API_KEY", "k"),
            ("DB_DIR", "/var/lib/classgate"),
            ("SESSION_MAX_AGE_SECS", "60"),
            ("SESSION_REAP_SECS", "5"),
            ("COOKIE_SECURE", "true"),
            ("CONTROL_NAMESPACE", "/gateway"),
        ]))
        .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(config.this_url, "https://gate.example.com");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.db_dir, PathBuf::from("/var/lib/classgate"));
        assert_eq!(config.session.max_age_secs, 60);
        assert_eq!(config.session.reap_interval_secs, 5);
        assert!(config.session.secure);
        assert_eq!(config.control_namespace().unwrap(), "/gateway");
    }

    #[test]
    fn test_control_namespace_defaults_to_auth_url_path() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("AUTH_URL", "http://localhost:420/oauth")]))
                .unwrap();
        assert_eq!(config.control_namespace().unwrap(), "/oauth");
    }

    #[test]
    fn test_control_namespace_without_path_is_root() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.control_namespace().unwrap(), "/");
    }

    #[test]
    fn test_control_namespace_variable_overrides_path() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTH_URL", "http://localhost:420/oauth"),
            ("CONTROL_NAMESPACE", "/admin"),
        ]))
        .unwrap();
        assert_eq!(config.control_namespace().unwrap(), "/admin");
    }

    #[test]
    fn test_from_lookup_bad_port_is_config_error() {
        let result = GatewayConfig::from_lookup(lookup(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(GatewayError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_from_lookup_bad_bool_is_config_error() {
        let result = GatewayConfig::from_lookup(lookup(&[("COOKIE_SECURE", "maybe")]));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_from_lookup_empty_value_counts_as_unset() {
        let config = GatewayConfig::from_lookup(lookup(&[("PORT", "")])).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_from_lookup_hs256_key_is_secret() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTH_VERIFY_ALG", "HS256"),
            ("AUTH_VERIFY_KEY", "shared"),
        ]))
        .unwrap();

        let verify = config.verify.unwrap();
        assert_eq!(verify.algorithm, Algorithm::HS256);
        assert_eq!(verify.key, VerifyKey::Secret("shared".into()));
    }

    #[test]
    fn test_from_lookup_rs256_key_is_path() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTH_VERIFY_ALG", "RS256"),
            ("AUTH_VERIFY_KEY", "/etc/authority.pem"),
        ]))
        .unwrap();

        assert_eq!(
            config.verify.unwrap().key,
            VerifyKey::PemFile(PathBuf::from("/etc/authority.pem"))
        );
    }

    #[test]
    fn test_from_lookup_alg_without_key_is_config_error() {
        let result = GatewayConfig::from_lookup(lookup(&[("AUTH_VERIFY_ALG", "HS256")]));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_from_lookup_unknown_alg_is_config_error() {
        let result = GatewayConfig::from_lookup(lookup(&[
            ("AUTH_VERIFY_ALG", "XX999"),
            ("AUTH_VERIFY_KEY", "k"),
        ]));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_load_env_file_sets_unset_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "CLASSGATE_ENV_FILE_VAR=from-file\n").unwrap();

        assert!(load_env_file(&path).unwrap());
        assert_eq!(
            std::env::var("CLASSGATE_ENV_FILE_VAR").as_deref(),
            Ok("from-file")
        );
    }

    #[test]
    fn test_load_env_file_keeps_existing_variables() {
        let before = std::env::var_os("PATH");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PATH=/nowhere\n").unwrap();

        load_env_file(&path).unwrap();

        assert_eq!(std::env::var_os("PATH"), before);
    }

    #[test]
    fn test_load_env_file_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_env_file(&dir.path().join(".env")).unwrap());
    }

    #[test]
    fn test_load_env_file_malformed_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "NOT A VALID LINE 'unterminated\n").unwrap();

        assert!(matches!(load_env_file(&path), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_authority_login_url_copies_this_url_verbatim() {
        let config = GatewayConfig {
            auth_url: "http://auth.local/".into(),
            this_url: "http://gate.local:3000".into(),
            ..Default::default()
        };
        assert_eq!(
            config.authority_login_url(),
            "http://auth.local/oauth?redirectURL=http://gate.local:3000"
        );
    }

    #[test]
    fn test_token_verifier_disabled_by_default() {
        let verifier = GatewayConfig::default().token_verifier().unwrap();
        assert!(!verifier.is_enabled());
    }

    #[test]
    fn test_token_verifier_missing_pem_is_io_error() {
        let config = GatewayConfig {
            verify: Some(VerifySettings {
                algorithm: Algorithm::RS256,
                key: VerifyKey::PemFile("/nonexistent/authority.pem".into()),
            }),
            ..Default::default()
        };
        assert!(matches!(config.token_verifier(), Err(GatewayError::Io(_))));
    }

    #[test]
    fn test_verify_key_debug_hides_secret() {
        let printed = format!("{:?}", VerifyKey::Secret("hunter2".into()));
        assert!(!printed.contains("hunter2"));
    }
}
