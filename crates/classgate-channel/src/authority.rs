//! Where and how to reach the authority's Socket.IO endpoint.

use classgate_protocol::DEFAULT_NAMESPACE;
use classgate_transport::WebSocketConnector;

use crate::ChannelError;

/// Splits an authority URL into its WebSocket origin and URL path.
///
/// Socket.IO clients treat the path of the URL they are given as the
/// namespace to join, never as part of the endpoint. So
/// `http://auth.local/oauth` means "dial `ws://auth.local`, join
/// `/oauth`".
fn split_authority(auth_url: &str) -> Result<(String, &str), ChannelError> {
    let invalid = || ChannelError::InvalidUrl(auth_url.to_string());
    let (scheme, rest) = auth_url.split_once("://").ok_or_else(invalid)?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };
    // Query strings and fragments are not part of either half.
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (host, path) = match rest.find('/') {
        Some(slash) => rest.split_at(slash),
        None => (rest, ""),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((format!("{scheme}://{host}"), path.trim_end_matches('/')))
}

/// Builds the Engine.IO WebSocket URL for an authority URL.
///
/// Only the origin is used; see [`authority_namespace`] for the path.
///
/// ```
/// # use classgate_channel::engine_io_url;
/// assert_eq!(
///     engine_io_url("https://auth.example.com/oauth").unwrap(),
///     "wss://auth.example.com/socket.io/?EIO=4&transport=websocket",
/// );
/// ```
///
/// # Errors
/// [`ChannelError::InvalidUrl`] unless the scheme is `http`, `https`, `ws`
/// or `wss` and a host is present.
pub fn engine_io_url(auth_url: &str) -> Result<String, ChannelError> {
    let (origin, _) = split_authority(auth_url)?;
    Ok(format!("{origin}/socket.io/?EIO=4&transport=websocket"))
}

/// The Socket.IO namespace named by the path of an authority URL, or `/`
/// when it has none.
///
/// ```
/// # use classgate_channel::authority_namespace;
/// assert_eq!(authority_namespace("http://localhost:420/oauth").unwrap(), "/oauth");
/// assert_eq!(authority_namespace("http://localhost:420").unwrap(), "/");
/// ```
///
/// # Errors
/// [`ChannelError::InvalidUrl`], as for [`engine_io_url`].
pub fn authority_namespace(auth_url: &str) -> Result<String, ChannelError> {
    let (_, path) = split_authority(auth_url)?;
    if path.is_empty() {
        Ok(DEFAULT_NAMESPACE.to_string())
    } else {
        Ok(path.to_string())
    }
}

/// A WebSocket connector for the authority at `auth_url` that presents
/// `api_key` in the `api` header of the upgrade request.
pub fn authority_connector(
    auth_url: &str,
    api_key: &str,
) -> Result<WebSocketConnector, ChannelError> {
    Ok(WebSocketConnector::new(engine_io_url(auth_url)?).header("api", api_key))
}
