//! Text codec for Engine.IO v4 / Socket.IO v5 packets.
//!
//! A frame looks like this:
//!
//! ```text
//! 4 2 /admin, 12 ["setClass",{"id":7}]
//! │ │ │       │  └─ JSON data (optional)
//! │ │ │       └──── ack id (optional, events and acks only)
//! │ │ └──────────── namespace + "," (omitted for "/")
//! │ └────────────── Socket.IO type (0 connect … 4 connect_error)
//! └──────────────── Engine.IO type (4 = message)
//! ```
//!
//! Binary packet types (Socket.IO 5 and 6, Engine.IO `b` frames) are
//! reported as [`ProtocolError::Unsupported`]; the authority never sends
//! them on this channel.

use serde_json::Value;

use crate::{ControlEvent, OpenHandshake, Packet, ProtocolError};

const ENGINE_OPEN: char = '0';
const ENGINE_CLOSE: char = '1';
const ENGINE_PING: char = '2';
const ENGINE_PONG: char = '3';
const ENGINE_MESSAGE: char = '4';
const ENGINE_UPGRADE: char = '5';
const ENGINE_NOOP: char = '6';

const SOCKET_CONNECT: char = '0';
const SOCKET_DISCONNECT: char = '1';
const SOCKET_EVENT: char = '2';
const SOCKET_ACK: char = '3';
const SOCKET_CONNECT_ERROR: char = '4';
const SOCKET_BINARY_EVENT: char = '5';
const SOCKET_BINARY_ACK: char = '6';

/// Encodes a packet into a single text frame.
///
/// # Errors
/// Returns [`ProtocolError::Encode`] if a JSON section fails to
/// serialize.
pub fn encode(packet: &Packet) -> Result<String, ProtocolError> {
    let frame = match packet {
        Packet::Open(open) => {
            let json = serde_json::to_string(open).map_err(ProtocolError::Encode)?;
            format!("{ENGINE_OPEN}{json}")
        }
        Packet::Close => ENGINE_CLOSE.to_string(),
        Packet::Ping => ENGINE_PING.to_string(),
        Packet::Pong => ENGINE_PONG.to_string(),
        Packet::Noop => ENGINE_NOOP.to_string(),

        Packet::Connect { namespace, data } => {
            let mut out = socket_prefix(SOCKET_CONNECT, namespace);
            if let Some(data) = data {
                out.push_str(&to_json(data)?);
            }
            out
        }
        Packet::Disconnect { namespace } => {
            socket_prefix(SOCKET_DISCONNECT, namespace)
        }
        Packet::Event {
            namespace,
            ack,
            event,
        } => {
            let mut out = socket_prefix(SOCKET_EVENT, namespace);
            if let Some(id) = ack {
                out.push_str(&id.to_string());
            }
            let mut array = vec![Value::String(event.kind.clone())];
            if !event.payload.is_null() || !event.extra.is_empty() {
                array.push(event.payload.clone());
            }
            array.extend(event.extra.iter().cloned());
            out.push_str(&to_json(&Value::Array(array))?);
            out
        }
        Packet::Ack {
            namespace,
            ack,
            args,
        } => {
            let mut out = socket_prefix(SOCKET_ACK, namespace);
            out.push_str(&ack.to_string());
            out.push_str(&to_json(&Value::Array(args.clone()))?);
            out
        }
        Packet::ConnectError { namespace, data } => {
            let mut out = socket_prefix(SOCKET_CONNECT_ERROR, namespace);
            if let Some(data) = data {
                out.push_str(&to_json(data)?);
            }
            out
        }
    };
    Ok(frame)
}

/// Decodes a single text frame into a packet.
///
/// # Errors
/// - [`ProtocolError::InvalidPacket`]: empty frame, unknown type, or a
///   data section of the wrong shape
/// - [`ProtocolError::Decode`]: the JSON section does not parse
/// - [`ProtocolError::Unsupported`]: binary or upgrade packets
pub fn decode(frame: &str) -> Result<Packet, ProtocolError> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolError::InvalidPacket("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        ENGINE_OPEN => {
            let open: OpenHandshake =
                serde_json::from_str(rest).map_err(ProtocolError::Decode)?;
            Ok(Packet::Open(open))
        }
        ENGINE_CLOSE => Ok(Packet::Close),
        // A ping may carry a "probe" body during transport upgrades.
        ENGINE_PING => Ok(Packet::Ping),
        ENGINE_PONG => Ok(Packet::Pong),
        ENGINE_MESSAGE => decode_socket(rest),
        ENGINE_UPGRADE => Err(ProtocolError::Unsupported("upgrade".into())),
        ENGINE_NOOP => Ok(Packet::Noop),
        'b' => Err(ProtocolError::Unsupported("binary message".into())),
        other => Err(ProtocolError::InvalidPacket(format!(
            "unknown engine packet type {other:?}"
        ))),
    }
}

/// Decodes the Socket.IO layer of an Engine.IO `message` packet.
fn decode_socket(body: &str) -> Result<Packet, ProtocolError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or_else(|| {
        ProtocolError::InvalidPacket("empty socket packet".into())
    })?;
    let (namespace, rest) = split_namespace(chars.as_str());

    match kind {
        SOCKET_CONNECT => Ok(Packet::Connect {
            namespace,
            data: parse_optional_json(rest)?,
        }),
        SOCKET_DISCONNECT => Ok(Packet::Disconnect { namespace }),
        SOCKET_EVENT => {
            let (ack, data) = split_ack(rest)?;
            let event = event_from_array(data)?;
            Ok(Packet::Event {
                namespace,
                ack,
                event,
            })
        }
        SOCKET_ACK => {
            let (ack, data) = split_ack(rest)?;
            let ack = ack.ok_or_else(|| {
                ProtocolError::InvalidPacket("ack without id".into())
            })?;
            let args = match parse_optional_json(data)? {
                Some(Value::Array(args)) => args,
                None => Vec::new(),
                Some(_) => {
                    return Err(ProtocolError::InvalidPacket(
                        "ack data must be an array".into(),
                    ));
                }
            };
            Ok(Packet::Ack {
                namespace,
                ack,
                args,
            })
        }
        SOCKET_CONNECT_ERROR => Ok(Packet::ConnectError {
            namespace,
            data: parse_optional_json(rest)?,
        }),
        SOCKET_BINARY_EVENT | SOCKET_BINARY_ACK => {
            Err(ProtocolError::Unsupported("binary socket packet".into()))
        }
        other => Err(ProtocolError::InvalidPacket(format!(
            "unknown socket packet type {other:?}"
        ))),
    }
}

/// Builds `4<type>` plus the namespace section when it isn't `/`.
fn socket_prefix(kind: char, namespace: &str) -> String {
    let mut out = String::with_capacity(4 + namespace.len());
    out.push(ENGINE_MESSAGE);
    out.push(kind);
    if !namespace.is_empty() && namespace != crate::DEFAULT_NAMESPACE {
        out.push_str(namespace);
        out.push(',');
    }
    out
}

/// Splits a leading `/nsp,` off `rest`. No namespace means `/`.
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (crate::DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.find(',') {
        Some(comma) => (rest[..comma].to_string(), &rest[comma + 1..]),
        None => (rest.to_string(), ""),
    }
}

/// Splits leading ASCII digits (the ack id) off `rest`.
fn split_ack(rest: &str) -> Result<(Option<u64>, &str), ProtocolError> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, rest));
    }
    let id = rest[..digits].parse::<u64>().map_err(|e| {
        ProtocolError::InvalidPacket(format!("bad ack id: {e}"))
    })?;
    Ok((Some(id), &rest[digits..]))
}

fn parse_optional_json(data: &str) -> Result<Option<Value>, ProtocolError> {
    if data.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(ProtocolError::Decode)
}

/// Turns `["name", arg...]` into a [`ControlEvent`].
fn event_from_array(data: &str) -> Result<ControlEvent, ProtocolError> {
    let mut items = match parse_optional_json(data)? {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(ProtocolError::InvalidPacket(
                "event data must be a non-empty array".into(),
            ));
        }
    };
    if items.is_empty() {
        return Err(ProtocolError::InvalidPacket(
            "event data must be a non-empty array".into(),
        ));
    }
    let kind = match items.remove(0) {
        Value::String(kind) => kind,
        _ => {
            return Err(ProtocolError::InvalidPacket(
                "event name must be a string".into(),
            ));
        }
    };
    let mut args = items.into_iter();
    let payload = args.next().unwrap_or(Value::Null);
    Ok(ControlEvent {
        kind,
        payload,
        extra: args.collect(),
    })
}

fn to_json(value: &Value) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(ProtocolError::Encode)
}
