//! Control-channel protocol types.
//!
//! The authority runs a Socket.IO server. Socket.IO is a two-layer
//! protocol:
//!
//! ```text
//! Engine.IO  (connection: open / close / ping / pong / message)
//!     └── Socket.IO  (inside "message": connect / disconnect / event / ack)
//! ```
//!
//! Over a WebSocket, every packet is a single text frame. The first
//! character is the Engine.IO packet type; for `message` packets the
//! second character is the Socket.IO packet type. [`Packet`] flattens the
//! two layers into one enum because the gateway never needs them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event the gateway emits after every (re)connect to ask for the
/// authority's current class.
pub const GET_ACTIVE_CLASS: &str = "getActiveClass";

/// Event the authority pushes when the active class changes.
pub const SET_CLASS: &str = "setClass";

/// The default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

// ---------------------------------------------------------------------------
// ControlEvent
// ---------------------------------------------------------------------------

/// A named event with an opaque JSON payload.
///
/// On the wire an event is a JSON array whose first element is the name:
/// `["setClass", {"id": 7}]`. The payload is the first argument after
/// the name, `Null` when there is none. Any further arguments are kept
/// in `extra`, so a handler that reads `payload` sees the same value a
/// single-argument Socket.IO listener would.
///
/// `#[serde(rename = "type")]` keeps the JSON view of an event as
/// `{ "type": "setClass", "payload": ... }` for anything that logs or
/// forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    /// Event name, e.g. [`SET_CLASS`].
    #[serde(rename = "type")]
    pub kind: String,

    /// Event payload, opaque to the gateway.
    #[serde(default)]
    pub payload: Value,

    /// Arguments after the first, in order. Usually empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Value>,
}

impl ControlEvent {
    /// Creates an event with a payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            extra: Vec::new(),
        }
    }

    /// Creates an event that carries no arguments.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Returns `true` if this event has the given name.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

// ---------------------------------------------------------------------------
// OpenHandshake
// ---------------------------------------------------------------------------

/// The body of the Engine.IO `open` packet the server sends first.
///
/// `pingInterval` and `pingTimeout` are in milliseconds. The client must
/// consider the connection dead if it hears nothing (not even a ping)
/// for `ping_interval + ping_timeout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session id assigned by the server.
    pub sid: String,

    /// Transports the server would allow an upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// How often the server sends pings.
    pub ping_interval: u64,

    /// How long the server waits for a pong.
    pub ping_timeout: u64,

    /// Largest payload the server accepts, in bytes.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Total silence after which the connection should be declared dead.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.ping_interval.saturating_add(self.ping_timeout),
        )
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// One decoded control-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // -- Engine.IO --
    /// Server → client, first frame of every connection.
    Open(OpenHandshake),

    /// Either side is closing the Engine.IO session.
    Close,

    /// Server → client heartbeat. Must be answered with [`Packet::Pong`].
    Ping,

    /// Client → server heartbeat answer.
    Pong,

    /// Placeholder packet, ignored.
    Noop,

    // -- Socket.IO (inside Engine.IO "message") --
    /// Client → server: join `namespace`. Server → client: joined, with
    /// `data` holding `{ "sid": ... }`.
    Connect {
        namespace: String,
        data: Option<Value>,
    },

    /// Either side leaves `namespace`.
    Disconnect { namespace: String },

    /// A named event. `ack` is set when the sender wants an
    /// acknowledgement.
    Event {
        namespace: String,
        ack: Option<u64>,
        event: ControlEvent,
    },

    /// Acknowledgement of an earlier event.
    Ack {
        namespace: String,
        ack: u64,
        args: Vec<Value>,
    },

    /// Server refused the namespace connect.
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl Packet {
    /// Namespace connect request for `namespace`.
    pub fn connect(namespace: impl Into<String>) -> Self {
        Self::Connect {
            namespace: namespace.into(),
            data: None,
        }
    }

    /// Event packet with no acknowledgement.
    pub fn event(namespace: impl Into<String>, event: ControlEvent) -> Self {
        Self::Event {
            namespace: namespace.into(),
            ack: None,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_event_serializes_kind_as_type() {
        let event = ControlEvent::new(SET_CLASS, json!({"id": 3}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "setClass", "payload": {"id": 3}}));
    }

    #[test]
    fn test_control_event_bare_has_null_payload() {
        let event = ControlEvent::bare(GET_ACTIVE_CLASS);
        assert!(event.is(GET_ACTIVE_CLASS));
        assert_eq!(event.payload, Value::Null);
    }

    #[test]
    fn test_open_handshake_parses_camel_case() {
        let open: OpenHandshake = serde_json::from_str(
            r#"{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        assert_eq!(open.sid, "abc");
        assert_eq!(open.ping_interval, 25000);
        assert_eq!(open.max_payload, Some(1_000_000));
        assert_eq!(
            open.liveness_window(),
            std::time::Duration::from_millis(45_000)
        );
    }

    #[test]
    fn test_open_handshake_tolerates_missing_optional_fields() {
        let open: OpenHandshake = serde_json::from_str(
            r#"{"sid":"x","pingInterval":1,"pingTimeout":2}"#,
        )
        .unwrap();
        assert!(open.upgrades.is_empty());
        assert_eq!(open.max_payload, None);
    }
}
