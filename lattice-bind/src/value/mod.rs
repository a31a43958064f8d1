//! Value Graph
//!
//! Bindings evaluate against a live, mutable graph of dynamically typed
//! values. This module defines that graph and the interception primitive the
//! context manager builds on.
//!
//! # Interception
//!
//! There is no language-level way to hook a field write in Rust, so the
//! containers in this module are explicit reactive cells: every read and
//! write of an [`ObjectRef`] slot or [`ArrayRef`] element goes through a
//! method, and any [`SlotHook`] installed on that slot is called after the
//! write lands. Sequence operations (`push`, `shift`, `splice`, ...) report a
//! [`ChangeRecord`] to every installed [`SequenceHook`].
//!
//! Hooks are always invoked with no container borrow held, so a hook may read
//! or write the same container again.
//!
//! # Identity
//!
//! Containers and functions are reference types: cloning a [`Value`] that
//! holds one shares the underlying storage. [`Value::same`] compares by
//! identity for those and by value for primitives.

mod array;
mod object;

pub use array::{ArrayRef, ChangeKind, ChangeRecord, SequenceHook, MAX_PADDING};
pub use object::{HookTag, ObjectRef, SlotHook};

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// A dynamically typed value reachable from a binding context.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Function),
}

/// A callable value.
///
/// Functions receive the receiver they were reached through (`this`) and the
/// evaluated argument list.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&Value, &[Value]) -> Value>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(ObjectRef::from_pairs(pairs))
    }

    /// Build an array value.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(ArrayRef::from_vec(items.into_iter().collect()))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        Value::Function(Function::new(f))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Anything but `Undefined`. `Null` counts as defined.
    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects and arrays: values whose members can be intercepted.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Strict identity: `===` for primitives, pointer equality otherwise.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(a) => match a.len() {
                0 => 0.0,
                1 => a.get_untracked(0).to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// Read a member through the tracked accessors.
    ///
    /// Objects look the key up; arrays and strings answer `length` and
    /// numeric indexes. Everything else yields `Undefined`.
    pub fn get_member(&self, key: &str) -> Value {
        self.member(key, true)
    }

    /// Like [`Value::get_member`] but without calling read hooks.
    pub fn get_member_untracked(&self, key: &str) -> Value {
        self.member(key, false)
    }

    fn member(&self, key: &str, tracked: bool) -> Value {
        match self {
            Value::Object(o) if tracked => o.get(key),
            Value::Object(o) => o.get_untracked(key),
            Value::Array(a) => {
                if key == "length" {
                    return Value::Number(a.len() as f64);
                }
                match key.parse::<usize>() {
                    Ok(index) if tracked => a.get(index),
                    Ok(index) => a.get_untracked(index),
                    Err(_) => Value::Undefined,
                }
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined)
            }
            _ => Value::Undefined,
        }
    }

    /// Convert to a JSON value. Functions become `null`, `Undefined` inside
    /// containers is kept as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(a) => {
                serde_json::Value::Array(a.to_vec().iter().map(Value::to_json).collect())
            }
            Value::Object(o) => serde_json::Value::Object(
                o.entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Default ordering used by [`ArrayRef::sort`]: `Undefined` last, the
    /// rest by their string form.
    pub(crate) fn default_sort_order(a: &Value, b: &Value) -> Ordering {
        match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.to_string().cmp(&b.to_string()),
        }
    }
}

/// Format a number the way templates render it: integral values without a
/// fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(a) => {
                let parts: Vec<String> = a
                    .to_vec()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                    .collect();
                f.write_str(&parts.join(","))
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("function"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(a) => f.debug_list().entries(a.to_vec()).finish(),
            Value::Object(o) => f.debug_map().entries(o.entries()).finish(),
            Value::Function(func) => func.fmt(f),
        }
    }
}

/// Equality is identity, see [`Value::same`].
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.same(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from))
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_for_containers_and_value_for_primitives() {
        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1))]);

        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert!(Value::from("hi").same(&Value::from("hi")));
        assert!(!Value::from(1).same(&Value::from("1")));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let source = json!({"a": {"b": [1, 2, "three"]}, "flag": true, "none": null});
        let value = Value::from(source.clone());

        assert_eq!(value.to_json(), source);
        assert_eq!(value.get_member("a").get_member("b").get_member("length"), Value::from(3));
    }

    #[test]
    fn string_members() {
        let s = Value::from("héllo");
        assert_eq!(s.get_member("length"), Value::from(5));
        assert_eq!(s.get_member("1"), Value::from("é"));
        assert!(s.get_member("nope").is_undefined());
    }

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(Value::from(2.0).to_string(), "2");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(1e20).to_string(), "100000000000000000000");
        assert_eq!(Value::from(-3.0).to_string(), "-3");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::array([Value::from(1), Value::Null, Value::from("x")]).to_string(), "1,,x");
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("4x").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::from(true).to_number(), 1.0);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from(0).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::array([]).truthy());
        assert!(!Value::Null.truthy());
    }
}
