//! Engine.IO / Socket.IO packet model and text codec for the realtime socket.
//!
//! This crate owns the wire representation spoken between `social-sync` and
//! the backend's socket server. Only the WebSocket transport with text
//! framing is supported; binary attachments are rejected at decode time.
//!
//! WIRE SHAPE
//! ==========
//! Every WebSocket text message is one Engine.IO packet: a single type digit
//! followed by an optional payload. Engine type `4` (message) wraps a
//! Socket.IO packet, which has its own type digit, an optional `/namespace,`
//! prefix, an optional numeric ack id, and a JSON payload:
//!
//! ```text
//! 0{"sid":"abc","pingInterval":25000,...}   open
//! 2                                         ping
//! 40{"token":"..."}                          socket connect (client → server)
//! 42["new_message",{"conversationId":"c1"}]  socket event
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode_packet`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text message had no type digit at all.
    #[error("empty packet")]
    Empty,
    /// The leading Engine.IO type digit is not one this codec knows.
    #[error("unknown engine packet type: {0:?}")]
    UnknownEngineType(char),
    /// The Socket.IO type digit inside an engine message is not known.
    #[error("unknown socket packet type: {0:?}")]
    UnknownSocketType(char),
    /// Binary event/ack packets need attachment frames, which are not supported.
    #[error("binary socket packets are not supported")]
    BinaryUnsupported,
    /// The payload was not valid JSON.
    #[error("invalid packet payload: {0}")]
    Json(#[from] serde_json::Error),
    /// An event payload was not a JSON array beginning with a string name.
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),
}

/// Engine.IO `open` payload sent by the server right after the upgrade.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Handshake {
    /// Engine session identifier.
    pub sid: String,
    /// Transports the server would upgrade to (empty on a pure WS session).
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong before dropping the session.
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes.
    pub max_payload: u64,
}

/// A named Socket.IO event and its first argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `"new_message"`.
    pub name: String,
    /// First event argument; `Value::Null` when the event carries none.
    pub data: Value,
    /// Acknowledgement id requested by the sender, if any.
    pub ack_id: Option<u64>,
}

impl Event {
    /// Build an event with a payload and no ack request.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self { name: name.into(), data, ack_id: None }
    }

    /// Build an event that carries no arguments.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

/// One packet on the socket, flattened across the Engine.IO and Socket.IO layers.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Engine `0`: session handshake from the server.
    Open(Handshake),
    /// Engine `1`: transport close.
    Close,
    /// Engine `2`: heartbeat ping (server → client in EIO v4).
    Ping,
    /// Engine `3`: heartbeat reply.
    Pong,
    /// Engine `6`: no-op.
    Noop,
    /// Socket `0`: namespace connect. The client sends auth, the server replies with `{sid}`.
    Connect(Option<Value>),
    /// Socket `1`: namespace disconnect.
    Disconnect,
    /// Socket `2`: named event.
    Event(Event),
    /// Socket `3`: acknowledgement of an earlier event.
    Ack { id: u64, args: Vec<Value> },
    /// Socket `4`: the server refused the namespace connect.
    ConnectError(Value),
}

/// Encode a packet into its text wire form.
#[must_use]
pub fn encode_packet(packet: &Packet) -> String {
    match packet {
        Packet::Open(handshake) => format!("0{}", to_json(handshake)),
        Packet::Close => "1".to_owned(),
        Packet::Ping => "2".to_owned(),
        Packet::Pong => "3".to_owned(),
        Packet::Noop => "6".to_owned(),
        Packet::Connect(None) => "40".to_owned(),
        Packet::Connect(Some(auth)) => format!("40{auth}"),
        Packet::Disconnect => "41".to_owned(),
        Packet::Event(event) => {
            let mut args = vec![Value::String(event.name.clone())];
            if !event.data.is_null() {
                args.push(event.data.clone());
            }
            let ack = event.ack_id.map(|id| id.to_string()).unwrap_or_default();
            format!("42{ack}{}", Value::Array(args))
        }
        Packet::Ack { id, args } => format!("43{id}{}", Value::Array(args.clone())),
        Packet::ConnectError(data) => format!("44{data}"),
    }
}

/// Decode one text wire message into a packet.
///
/// # Errors
///
/// Returns [`CodecError`] for empty input, unknown type digits, binary
/// packets, malformed JSON, or event payloads that are not `[name, ...]`.
pub fn decode_packet(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let Some(engine_type) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let rest = chars.as_str();

    match engine_type {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        // Probe pings ("2probe") only happen during polling upgrades; the payload is ignored.
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '6' => Ok(Packet::Noop),
        other => Err(CodecError::UnknownEngineType(other)),
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let Some(socket_type) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let rest = strip_namespace(chars.as_str());
    let (ack_id, payload) = split_ack_id(rest);

    match socket_type {
        '0' => Ok(Packet::Connect(parse_optional_json(payload)?)),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(ack_id, payload),
        '3' => {
            let id = ack_id.ok_or_else(|| CodecError::InvalidEvent("ack without id".to_owned()))?;
            let args = match parse_optional_json(payload)? {
                Some(Value::Array(args)) => args,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            Ok(Packet::Ack { id, args })
        }
        '4' => Ok(Packet::ConnectError(parse_optional_json(payload)?.unwrap_or(Value::Null))),
        '5' | '6' => Err(CodecError::BinaryUnsupported),
        other => Err(CodecError::UnknownSocketType(other)),
    }
}

fn decode_event(ack_id: Option<u64>, payload: &str) -> Result<Packet, CodecError> {
    let Some(Value::Array(mut args)) = parse_optional_json(payload)? else {
        return Err(CodecError::InvalidEvent(payload.to_owned()));
    };
    if args.is_empty() {
        return Err(CodecError::InvalidEvent(payload.to_owned()));
    }
    let Value::String(name) = args.remove(0) else {
        return Err(CodecError::InvalidEvent(payload.to_owned()));
    };
    let data = if args.is_empty() { Value::Null } else { args.swap_remove(0) };
    Ok(Packet::Event(Event { name, data, ack_id }))
}

/// Drop a leading `/namespace,` segment. Only the default namespace is used.
fn strip_namespace(text: &str) -> &str {
    if !text.starts_with('/') {
        return text;
    }
    match text.find(',') {
        Some(idx) => &text[idx + 1..],
        None => "",
    }
}

fn split_ack_id(text: &str) -> (Option<u64>, &str) {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, text);
    }
    let (id, rest) = text.split_at(digits);
    match id.parse::<u64>() {
        Ok(id) => (Some(id), rest),
        Err(_) => (None, text),
    }
}

fn parse_optional_json(text: &str) -> Result<Option<Value>, CodecError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_owned())
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
