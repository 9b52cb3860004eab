//! Argument validation
//!
//! Schemas describe the arguments of an outgoing call. [`validate`] checks an
//! argument list against one schema and reports the first failure with the
//! path of the offending value; it has no side effects. The bridge runs it
//! before encoding when the `validation` feature is enabled.
//!
//! The argument list itself is the root value, so paths read `args[0]`,
//! `args[1].name`, `args[2][3]`.

use core::fmt;
use std::sync::Arc;

use crate::errors::ValidationError;
use crate::types::ClassId;
use crate::value::ScriptValue;

/// Custom check run after the built-in one passes
pub type Verifier = Arc<dyn Fn(&ScriptValue) -> Result<(), String> + Send + Sync>;

// ----------------------------------------------------------------------------
// Schema Types
// ----------------------------------------------------------------------------

/// Built-in value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Number,
    Integer,
    String,
    Function,
    Boolean,
    Undefined,
    /// Anything, including undefined
    Any,
    /// A registered host object of the given class
    Instance(ClassId),
}

impl Kind {
    fn accepts(self, value: &ScriptValue) -> bool {
        match self {
            Kind::Number => value.as_f64().is_some(),
            Kind::Integer => match value {
                ScriptValue::Int(_) => true,
                ScriptValue::Number(n) => n.is_finite() && n.fract() == 0.0,
                _ => false,
            },
            Kind::String => matches!(value, ScriptValue::String(_)),
            Kind::Function => matches!(value, ScriptValue::Function(_)),
            Kind::Boolean => matches!(value, ScriptValue::Bool(_)),
            Kind::Undefined => value.is_undefined(),
            Kind::Any => true,
            Kind::Instance(class_id) => {
                matches!(value, ScriptValue::Instance(obj) if obj.class_id() == class_id)
            }
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Number => f.write_str("number"),
            Kind::Integer => f.write_str("integer"),
            Kind::String => f.write_str("string"),
            Kind::Function => f.write_str("function"),
            Kind::Boolean => f.write_str("boolean"),
            Kind::Undefined => f.write_str("undefined"),
            Kind::Any => f.write_str("any"),
            Kind::Instance(class_id) => write!(f, "instance of class {class_id:#x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Array,
    NonEmptyArray,
}

/// A single typed value, optionally an array of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDef {
    pub kind: Kind,
    pub arity: Arity,
    /// Undefined or null passes without further checks
    pub optional: bool,
}

impl TypeDef {
    fn expected(&self) -> String {
        match self.arity {
            Arity::Single => self.kind.to_string(),
            Arity::Array => format!("{}[]", self.kind),
            Arity::NonEmptyArray => format!("non-empty {}[]", self.kind),
        }
    }
}

/// Structure of a schema node
#[derive(Clone)]
pub enum Shape {
    Def(TypeDef),
    /// First matching branch wins
    Union(Vec<Schema>),
    /// Fixed tuple; surplus elements are rejected
    Tuple(Vec<Schema>),
    /// Keyed fields checked in declaration order
    Object(Vec<(String, Schema)>),
    /// Plain positional list; surplus elements are ignored
    List(Vec<Schema>),
    /// Plain keyed map
    Map(Vec<(String, Schema)>),
}

/// A schema node with an optional trailing verifier
#[derive(Clone)]
pub struct Schema {
    shape: Shape,
    verifier: Option<Verifier>,
}

impl Schema {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            verifier: None,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Attach a custom check, run only after the built-in check passes
    pub fn verify<F>(mut self, verifier: F) -> Self
    where
        F: Fn(&ScriptValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    fn expected(&self) -> String {
        match &self.shape {
            Shape::Def(def) => def.expected(),
            Shape::Union(branches) => branches
                .iter()
                .map(Schema::expected)
                .collect::<Vec<_>>()
                .join(" | "),
            Shape::Tuple(_) | Shape::List(_) => "array".to_string(),
            Shape::Object(_) | Shape::Map(_) => "object".to_string(),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("expected", &self.expected())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Schema Builders
// ----------------------------------------------------------------------------

fn def(kind: Kind, arity: Arity, optional: bool) -> Schema {
    Schema::new(Shape::Def(TypeDef {
        kind,
        arity,
        optional,
    }))
}

pub fn arg(kind: Kind) -> Schema {
    def(kind, Arity::Single, false)
}

pub fn optional_arg(kind: Kind) -> Schema {
    def(kind, Arity::Single, true)
}

pub fn arg_array(kind: Kind) -> Schema {
    def(kind, Arity::Array, false)
}

pub fn non_empty_arg_array(kind: Kind) -> Schema {
    def(kind, Arity::NonEmptyArray, false)
}

pub fn optional_arg_array(kind: Kind) -> Schema {
    def(kind, Arity::Array, true)
}

pub fn optional_non_empty_arg_array(kind: Kind) -> Schema {
    def(kind, Arity::NonEmptyArray, true)
}

pub fn or(branches: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Shape::Union(branches.into_iter().collect()))
}

pub fn array(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Shape::Tuple(items.into_iter().collect()))
}

pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Schema {
    Schema::new(Shape::Object(
        fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
    ))
}

pub fn list(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Shape::List(items.into_iter().collect()))
}

pub fn map<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Schema {
    Schema::new(Shape::Map(
        fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
    ))
}

// ----------------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------------

const ROOT: &str = "args";
static UNDEFINED: ScriptValue = ScriptValue::Undefined;

/// Check an argument list against one schema
pub fn validate(args: &[ScriptValue], schema: &Schema) -> Result<(), ValidationError> {
    check(&ScriptValue::Array(args.to_vec()), schema, ROOT)
}

/// Check an argument list against alternative schemas; any match passes
pub fn validate_args(args: &[ScriptValue], schemas: &[Schema]) -> Result<(), ValidationError> {
    match schemas {
        [] => Ok(()),
        [schema] => validate(args, schema),
        _ => validate(args, &or(schemas.iter().cloned())),
    }
}

fn check(value: &ScriptValue, schema: &Schema, path: &str) -> Result<(), ValidationError> {
    match &schema.shape {
        Shape::Def(def) => {
            if def.optional && matches!(value, ScriptValue::Undefined | ScriptValue::Null) {
                return Ok(());
            }
            check_def(value, def, path)?;
        }
        Shape::Union(branches) => check_union(value, branches, path)?,
        Shape::Tuple(items) => {
            let elements = expect_array(value, schema, path)?;
            check_positional(elements, items, path)?;
            if elements.len() > items.len() {
                return Err(ValidationError::new(
                    format!("{path}[{}]", items.len()),
                    "end of array",
                    format!(
                        "{} elements given, at most {} accepted",
                        elements.len(),
                        items.len()
                    ),
                ));
            }
        }
        Shape::List(items) => {
            let elements = expect_array(value, schema, path)?;
            check_positional(elements, items, path)?;
        }
        Shape::Object(fields) | Shape::Map(fields) => {
            let ScriptValue::Object(members) = value else {
                return Err(mismatch(path, schema.expected(), value));
            };
            for (key, field) in fields {
                let member = members.get(key).unwrap_or(&UNDEFINED);
                check(member, field, &format!("{path}.{key}"))?;
            }
        }
    }

    run_verifier(value, schema, path)
}

fn check_def(value: &ScriptValue, def: &TypeDef, path: &str) -> Result<(), ValidationError> {
    match def.arity {
        Arity::Single => {
            if !def.kind.accepts(value) {
                return Err(mismatch(path, def.expected(), value));
            }
        }
        Arity::Array | Arity::NonEmptyArray => {
            let ScriptValue::Array(elements) = value else {
                return Err(mismatch(path, def.expected(), value));
            };
            if def.arity == Arity::NonEmptyArray && elements.is_empty() {
                return Err(ValidationError::new(path, def.expected(), "array is empty"));
            }
            if let Some((i, bad)) = elements
                .iter()
                .enumerate()
                .find(|(_, element)| !def.kind.accepts(element))
            {
                return Err(mismatch(
                    &format!("{path}[{i}]"),
                    def.kind.to_string(),
                    bad,
                ));
            }
        }
    }
    Ok(())
}

fn check_union(
    value: &ScriptValue,
    branches: &[Schema],
    path: &str,
) -> Result<(), ValidationError> {
    let mut failures = Vec::with_capacity(branches.len());
    for branch in branches {
        match check(value, branch, path) {
            Ok(()) => return Ok(()),
            Err(err) => failures.push(err),
        }
    }
    let message = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    // the branch that got furthest names the location; ties keep the first
    let deepest = failures
        .iter()
        .rev()
        .max_by(|a, b| (a.path.len(), &a.path).cmp(&(b.path.len(), &b.path)));
    match deepest {
        Some(err) if err.path.len() > path.len() => Err(ValidationError::new(
            err.path.clone(),
            err.expected.clone(),
            message,
        )),
        _ => Err(ValidationError::new(
            path,
            branches
                .iter()
                .map(Schema::expected)
                .collect::<Vec<_>>()
                .join(" | "),
            message,
        )),
    }
}

fn check_positional(
    elements: &[ScriptValue],
    items: &[Schema],
    path: &str,
) -> Result<(), ValidationError> {
    for (i, item) in items.iter().enumerate() {
        let element = elements.get(i).unwrap_or(&UNDEFINED);
        check(element, item, &format!("{path}[{i}]"))?;
    }
    Ok(())
}

fn expect_array<'a>(
    value: &'a ScriptValue,
    schema: &Schema,
    path: &str,
) -> Result<&'a [ScriptValue], ValidationError> {
    match value {
        ScriptValue::Array(elements) => Ok(elements),
        other => Err(mismatch(path, schema.expected(), other)),
    }
}

fn run_verifier(value: &ScriptValue, schema: &Schema, path: &str) -> Result<(), ValidationError> {
    match &schema.verifier {
        Some(verifier) => {
            verifier(value).map_err(|message| ValidationError::new(path, schema.expected(), message))
        }
        None => Ok(()),
    }
}

fn mismatch(path: &str, expected: String, actual: &ScriptValue) -> ValidationError {
    ValidationError::new(path, expected, format!("got {}", actual.kind_name()))
}
