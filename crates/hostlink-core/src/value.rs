//! Dynamic values crossing the scripting boundary

use core::fmt;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{DecodeError, EncodeError};
use crate::registry::HostObject;

/// A script callable carried as an argument
#[derive(Clone)]
pub struct ScriptFunction(Arc<dyn Fn(&[ScriptValue]) -> ScriptValue + Send + Sync>);

impl ScriptFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[ScriptValue]) -> ScriptValue + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[ScriptValue]) -> ScriptValue {
        (self.0)(args)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptFunction")
    }
}

/// Argument value as seen by the scripting layer
#[derive(Clone, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(BTreeMap<String, ScriptValue>),
    Function(ScriptFunction),
    Instance(Arc<dyn HostObject>),
}

impl ScriptValue {
    /// Name of the value's kind as used in validation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Int(_) => "integer",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Array(_) => "array",
            ScriptValue::Object(_) => "object",
            ScriptValue::Function(_) => "function",
            ScriptValue::Instance(_) => "instance",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    /// Numeric view of `Int` and `Number`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON
    ///
    /// `Undefined` array elements become `null` and `Undefined` object members
    /// are skipped. Functions, instances and non-finite numbers have no JSON form.
    pub fn to_json(&self) -> Result<Value, EncodeError> {
        Ok(match self {
            ScriptValue::Undefined => {
                return Err(EncodeError::Unencodable { kind: "undefined" })
            }
            ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(*b),
            ScriptValue::Int(i) => Value::Number((*i).into()),
            ScriptValue::Number(n) => Value::Number(
                Number::from_f64(*n).ok_or(EncodeError::Unencodable {
                    kind: "non-finite number",
                })?,
            ),
            ScriptValue::String(s) => Value::String(s.clone()),
            ScriptValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        ScriptValue::Undefined => Ok(Value::Null),
                        other => other.to_json(),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            ScriptValue::Object(fields) => {
                let mut map = Map::new();
                for (key, item) in fields {
                    if item.is_undefined() {
                        continue;
                    }
                    map.insert(key.clone(), item.to_json()?);
                }
                Value::Object(map)
            }
            ScriptValue::Function(_) => {
                return Err(EncodeError::Unencodable { kind: "function" })
            }
            ScriptValue::Instance(_) => {
                return Err(EncodeError::Unencodable { kind: "instance" })
            }
        })
    }

    /// Convert from JSON; integral numbers that fit `i64` become `Int`
    ///
    /// Anything else, including unsigned integers above `i64::MAX`, becomes a
    /// `Number` and is rounded to the nearest `f64`, the same precision the
    /// scripting side has for numbers.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ScriptValue::Int(i),
                None => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ScriptValue::String(s),
            Value::Array(items) => {
                ScriptValue::Array(items.into_iter().map(ScriptValue::from_json).collect())
            }
            Value::Object(map) => ScriptValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, ScriptValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Parse JSON text
    pub fn parse_json(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str::<Value>(text)
            .map(ScriptValue::from_json)
            .map_err(|_| DecodeError::invalid("json", text))
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => f.write_str("Undefined"),
            ScriptValue::Null => f.write_str("Null"),
            ScriptValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            ScriptValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            ScriptValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            ScriptValue::String(s) => f.debug_tuple("String").field(s).finish(),
            ScriptValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            ScriptValue::Object(fields) => f.debug_tuple("Object").field(fields).finish(),
            ScriptValue::Function(func) => fmt::Debug::fmt(func, f),
            ScriptValue::Instance(obj) => f
                .debug_struct("Instance")
                .field("class_id", &obj.class_id())
                .finish(),
        }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScriptValue::Undefined, ScriptValue::Undefined) => true,
            (ScriptValue::Null, ScriptValue::Null) => true,
            (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
            (ScriptValue::Int(a), ScriptValue::Int(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => a == b,
            (ScriptValue::Object(a), ScriptValue::Object(b)) => a == b,
            (ScriptValue::Function(a), ScriptValue::Function(b)) => Arc::ptr_eq(&a.0, &b.0),
            (ScriptValue::Instance(a), ScriptValue::Instance(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        ScriptValue::Int(value.into())
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Int(value)
    }
}

impl From<u32> for ScriptValue {
    fn from(value: u32) -> Self {
        ScriptValue::Int(value.into())
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(value: Vec<ScriptValue>) -> Self {
        ScriptValue::Array(value)
    }
}

impl From<Arc<dyn HostObject>> for ScriptValue {
    fn from(value: Arc<dyn HostObject>) -> Self {
        ScriptValue::Instance(value)
    }
}

impl From<Map<String, Value>> for ScriptValue {
    fn from(value: Map<String, Value>) -> Self {
        ScriptValue::from_json(Value::Object(value))
    }
}
