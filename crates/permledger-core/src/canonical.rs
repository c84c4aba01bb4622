//! Canonical CBOR encoding for deterministic serialization.
//!
//! Events are encoded following RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! Event ids are hashes of these bytes, so the encoding must be identical on
//! every platform. Decoding re-encodes and rejects anything non-canonical.

use ciborium::value::Value;

use crate::error::CoreError;
use crate::event::{ActionKind, LedgerAction, LedgerEvent, EVENT_VERSION};
use crate::role::Role;
use crate::types::{DocumentHash, EventId, Principal};

/// Event field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const SEQ: u64 = 1;
    pub const PREV_EVENT_ID: u64 = 2;
    pub const CALLER: u64 = 3;
    pub const TIMESTAMP: u64 = 4;
    pub const KIND: u64 = 5;
    pub const DOCUMENT: u64 = 6;
    pub const ROLE: u64 = 7;
    pub const PRINCIPAL: u64 = 8;
}

/// Encode an event to canonical CBOR bytes.
pub fn canonical_bytes(event: &LedgerEvent) -> Vec<u8> {
    let value = event_to_cbor_value(event);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// Convert an event to a CBOR Value (map with integer keys).
fn event_to_cbor_value(event: &LedgerEvent) -> Value {
    let key = |k: u64| Value::Integer(k.into());
    let prev = match &event.prev_event_id {
        Some(id) => Value::Bytes(id.0.to_vec()),
        None => Value::Null,
    };
    let role = match event.action.role() {
        Some(role) => Value::Integer(role.to_u8().into()),
        None => Value::Null,
    };
    let principal = match event.action.principal() {
        Some(p) => Value::Bytes(p.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (key(keys::VERSION), Value::Integer(event.version.into())),
        (key(keys::SEQ), Value::Integer(event.seq.into())),
        (key(keys::PREV_EVENT_ID), prev),
        (key(keys::CALLER), Value::Bytes(event.caller.0.to_vec())),
        (key(keys::TIMESTAMP), Value::Integer(event.timestamp.into())),
        (
            key(keys::KIND),
            Value::Integer(event.action.kind().to_u8().into()),
        ),
        (
            key(keys::DOCUMENT),
            Value::Bytes(event.action.document().0.to_vec()),
        ),
        (key(keys::ROLE), role),
        (key(keys::PRINCIPAL), principal),
    ])
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Null => buf.push(0xf6),
        _ => unreachable!("event maps only hold integers, byte strings and null"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode an event from canonical bytes.
///
/// Fails if the bytes are not exactly the canonical encoding of the decoded
/// event, so two different byte strings can never decode to the same event.
pub fn decode_event(bytes: &[u8]) -> Result<LedgerEvent, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let event = cbor_value_to_event(&value)?;

    if canonical_bytes(&event) != bytes {
        return Err(CoreError::MalformedEvent("non-canonical encoding".into()));
    }
    Ok(event)
}

/// Convert a CBOR Value (map) back to a LedgerEvent.
fn cbor_value_to_event(value: &Value) -> Result<LedgerEvent, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedEvent("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    };

    let int = |key: u64, name: &str| -> Result<i128, CoreError> {
        match get(key) {
            Some(Value::Integer(i)) => Ok(i128::from(*i)),
            _ => Err(CoreError::MalformedEvent(format!("missing {}", name))),
        }
    };

    let bytes32 = |key: u64, name: &str| -> Result<Option<[u8; 32]>, CoreError> {
        match get(key) {
            Some(Value::Bytes(b)) if b.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(b);
                Ok(Some(arr))
            }
            Some(Value::Null) | None => Ok(None),
            _ => Err(CoreError::MalformedEvent(format!("invalid {}", name))),
        }
    };

    let version = u8::try_from(int(keys::VERSION, "version")?)
        .map_err(|_| CoreError::MalformedEvent("version out of range".into()))?;
    if version != EVENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }
    let seq = u64::try_from(int(keys::SEQ, "seq")?)
        .map_err(|_| CoreError::MalformedEvent("seq out of range".into()))?;
    let timestamp = i64::try_from(int(keys::TIMESTAMP, "timestamp")?)
        .map_err(|_| CoreError::MalformedEvent("timestamp out of range".into()))?;

    let prev_event_id = bytes32(keys::PREV_EVENT_ID, "prev_event_id")?.map(EventId);
    let caller = bytes32(keys::CALLER, "caller")?
        .map(Principal)
        .ok_or_else(|| CoreError::MalformedEvent("missing caller".into()))?;
    let document = bytes32(keys::DOCUMENT, "document")?
        .map(DocumentHash)
        .ok_or_else(|| CoreError::MalformedEvent("missing document".into()))?;

    let kind_code = int(keys::KIND, "kind")?;
    let kind = u8::try_from(kind_code)
        .ok()
        .and_then(ActionKind::from_u8)
        .ok_or_else(|| CoreError::MalformedEvent(format!("invalid kind: {}", kind_code)))?;

    let role = match get(keys::ROLE) {
        Some(Value::Integer(i)) => {
            let code = i128::from(*i);
            let role = u8::try_from(code)
                .ok()
                .and_then(Role::from_u8)
                .ok_or_else(|| CoreError::MalformedEvent(format!("invalid role: {}", code)))?;
            Some(role)
        }
        Some(Value::Null) | None => None,
        _ => return Err(CoreError::MalformedEvent("invalid role".into())),
    };
    let principal = bytes32(keys::PRINCIPAL, "principal")?.map(Principal);

    let action = match (kind, role, principal) {
        (ActionKind::Register, None, None) => LedgerAction::Register { document },
        (ActionKind::Grant, Some(role), Some(principal)) => LedgerAction::Grant {
            document,
            role,
            principal,
        },
        (ActionKind::Revoke, Some(role), Some(principal)) => LedgerAction::Revoke {
            document,
            role,
            principal,
        },
        _ => {
            return Err(CoreError::MalformedEvent(format!(
                "fields do not match kind {:?}",
                kind
            )))
        }
    };

    Ok(LedgerEvent {
        version,
        seq,
        prev_event_id,
        caller,
        timestamp,
        action,
    })
}
