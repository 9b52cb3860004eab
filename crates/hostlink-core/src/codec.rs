//! Scalar codec
//!
//! Every value crosses the boundary as a text token. Integers and floats are
//! decimal text, booleans are `0`/`1`, strings are UTF-8 with the framing
//! characters escaped, and structured values are JSON text.
//!
//! Decoders never coerce: a token that does not parse is a [`DecodeError`], so
//! callers can tell a corrupt token from a legitimately absent one.

use crate::errors::{DecodeError, EncodeError};
use crate::registry::{HostObject, ObjectRegistry};
use crate::types::ObjectId;
use crate::value::ScriptValue;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Separates tokens inside one record
pub const TOKEN_SEPARATOR: char = ',';

/// Separates records inside one frame
pub const RECORD_SEPARATOR: char = ':';

const ESCAPE: u8 = b'%';

fn needs_escape(byte: u8) -> bool {
    byte == ESCAPE
        || byte == TOKEN_SEPARATOR as u8
        || byte == RECORD_SEPARATOR as u8
        || byte < 0x20
        || byte == 0x7f
}

// ----------------------------------------------------------------------------
// Integers, Floats, Booleans
// ----------------------------------------------------------------------------

pub fn encode_int(value: i64) -> String {
    value.to_string()
}

pub fn decode_int(token: &str) -> Result<i64, DecodeError> {
    token
        .parse::<i64>()
        .map_err(|_| DecodeError::invalid("integer", token))
}

/// Shortest decimal text that parses back to the same `f64`
pub fn encode_float(value: f64) -> String {
    value.to_string()
}

pub fn decode_float(token: &str) -> Result<f64, DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::invalid("float", token));
    }
    token
        .parse::<f64>()
        .map_err(|_| DecodeError::invalid("float", token))
}

pub fn encode_bool(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

pub fn decode_bool(token: &str) -> Result<bool, DecodeError> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(DecodeError::invalid("boolean", token)),
    }
}

// ----------------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------------

/// Escape `%`, the separators and ASCII control bytes as `%XX`
///
/// Non-ASCII text passes through untouched; only single-byte ASCII values are
/// ever escaped, so the result is always valid UTF-8.
pub fn encode_string(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii() && needs_escape(ch as u8) {
            encoded.push_str(&format!("%{:02X}", ch as u8));
        } else {
            encoded.push(ch);
        }
    }
    encoded
}

pub fn decode_string(token: &str) -> Result<String, DecodeError> {
    let bytes = token.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == ESCAPE {
            let digits = bytes
                .get(i + 1..i + 3)
                .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .and_then(|pair| core::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| DecodeError::invalid("string", token))?;
            decoded.push(digits);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).map_err(|_| DecodeError::invalid("string", token))
}

// ----------------------------------------------------------------------------
// Structured Values
// ----------------------------------------------------------------------------

/// JSON text of a structured value, escaped into a single token
pub fn encode_json(value: &ScriptValue) -> Result<String, EncodeError> {
    encode_json_raw(value).map(|text| encode_string(&text))
}

/// JSON text without token escaping
pub fn encode_json_raw(value: &ScriptValue) -> Result<String, EncodeError> {
    let json = value.to_json()?;
    serde_json::to_string(&json).map_err(|err| EncodeError::Json {
        reason: err.to_string(),
    })
}

pub fn decode_json(token: &str) -> Result<ScriptValue, DecodeError> {
    decode_json_raw(&decode_string(token)?)
}

pub fn decode_json_raw(text: &str) -> Result<ScriptValue, DecodeError> {
    ScriptValue::parse_json(text)
}

// ----------------------------------------------------------------------------
// Object References
// ----------------------------------------------------------------------------

/// Wire token of an optional object reference; `-1` when absent
pub fn encode_object_ref(id: Option<ObjectId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => encode_int(ObjectId::NULL_TOKEN),
    }
}

/// Decode an object reference; the null sentinel decodes to `None`
pub fn decode_object_ref(token: &str) -> Result<Option<ObjectId>, DecodeError> {
    let raw = decode_int(token)?;
    if raw == ObjectId::NULL_TOKEN {
        return Ok(None);
    }
    ObjectId::from_wire(raw)
        .map(Some)
        .ok_or_else(|| DecodeError::invalid("object id", token))
}

// ----------------------------------------------------------------------------
// Value Dispatch
// ----------------------------------------------------------------------------

/// Encode one argument, picking the scalar encoding from the value's variant
pub fn encode_value(
    value: &ScriptValue,
    registry: &ObjectRegistry<dyn HostObject>,
) -> Result<String, EncodeError> {
    match value {
        ScriptValue::Undefined => Err(EncodeError::Unencodable { kind: "undefined" }),
        ScriptValue::Null => Ok(encode_object_ref(None)),
        ScriptValue::Bool(b) => Ok(encode_bool(*b)),
        ScriptValue::Int(i) => Ok(encode_int(*i)),
        ScriptValue::Number(n) => Ok(encode_float(*n)),
        ScriptValue::String(s) => Ok(encode_string(s)),
        ScriptValue::Array(_) | ScriptValue::Object(_) => encode_json(value),
        ScriptValue::Function(_) => Err(EncodeError::Unencodable { kind: "function" }),
        ScriptValue::Instance(obj) => registry
            .object_to_id(obj)
            .map(|id| encode_object_ref(Some(id)))
            .ok_or(EncodeError::UnregisteredInstance {
                class_id: obj.class_id(),
            }),
    }
}

/// Encode a whole argument list; fails without partial output
pub fn encode_args(
    args: &[ScriptValue],
    registry: &ObjectRegistry<dyn HostObject>,
) -> Result<Vec<String>, EncodeError> {
    args.iter().map(|arg| encode_value(arg, registry)).collect()
}
