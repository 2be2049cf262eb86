use crate::ErrorObject;
use crate::Promise;
use serde::ser::SerializeMap;
use serde::ser::SerializeSeq;
use serde::Serialize;
use serde::Serializer;
use std::fmt;
use std::rc::Rc;

/// A dynamically typed value carried by promises: fulfillment values, rejection reasons and
/// handler results are all `Value`s.
///
/// Compound values are reference counted, so cloning a `Value` (which happens once per reaction
/// when a promise fans out to many observers) is cheap.
#[derive(Debug, Clone, Default)]
pub enum Value {
  #[default]
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  Array(Rc<[Value]>),
  Object(Rc<Object>),
  Error(Rc<ErrorObject>),
  /// A promise used as a value. Resolving a promise with this adopts its state.
  Promise(Promise),
}

impl Value {
  pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
    Value::Array(items.into_iter().collect())
  }

  #[inline]
  pub fn is_undefined(&self) -> bool {
    matches!(self, Value::Undefined)
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self {
      Value::Array(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_object(&self) -> Option<&Object> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  pub fn as_error(&self) -> Option<&ErrorObject> {
    match self {
      Value::Error(err) => Some(err),
      _ => None,
    }
  }

  pub fn as_promise(&self) -> Option<&Promise> {
    match self {
      Value::Promise(p) => Some(p),
      _ => None,
    }
  }
}

/// Promises compare by identity; everything else compares structurally.
impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => a == b,
      (Value::Object(a), Value::Object(b)) => a == b,
      (Value::Error(a), Value::Error(b)) => a == b,
      (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
      _ => false,
    }
  }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
  if n.is_nan() {
    f.write_str("NaN")
  } else if n.is_infinite() {
    f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
  } else if n.fract() == 0.0 && n.abs() < 1e21 {
    write!(f, "{}", n as i128)
  } else {
    write!(f, "{n}")
  }
}

/// Renders the value the way ECMAScript's `String(value)` would.
impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Undefined => f.write_str("undefined"),
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Number(n) => fmt_number(*n, f),
      Value::String(s) => f.write_str(s),
      Value::Array(items) => {
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(",")?;
          }
          if !matches!(item, Value::Undefined | Value::Null) {
            write!(f, "{item}")?;
          }
        }
        Ok(())
      }
      Value::Object(_) => f.write_str("[object Object]"),
      Value::Error(err) => write!(f, "{err}"),
      Value::Promise(_) => f.write_str("[object Promise]"),
    }
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Undefined | Value::Null => serializer.serialize_unit(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      // Integral numbers serialize as integers so that `1` round-trips as `1`, not `1.0`.
      Value::Number(n) if n.fract() == 0.0 && n.abs() <= 9007199254740991.0 => {
        serializer.serialize_i64(*n as i64)
      }
      Value::Number(n) => serializer.serialize_f64(*n),
      Value::String(s) => serializer.serialize_str(s),
      Value::Array(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
          seq.serialize_element(item)?;
        }
        seq.end()
      }
      Value::Object(obj) => obj.serialize(serializer),
      Value::Error(err) => {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", err.name())?;
        map.serialize_entry("message", err.message())?;
        if err.is_aggregate() {
          map.serialize_entry("errors", err.errors())?;
        }
        map.end()
      }
      Value::Promise(_) => serializer.serialize_map(Some(0))?.end(),
    }
  }
}

impl From<serde_json::Value> for Value {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
      serde_json::Value::String(s) => Value::String(s.into()),
      serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
      serde_json::Value::Object(map) => {
        let mut obj = Object::new();
        for (key, value) in map {
          obj.set(key, value.into());
        }
        obj.into()
      }
    }
  }
}

impl From<()> for Value {
  fn from(_: ()) -> Self {
    Value::Undefined
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::Number(value.into())
  }
}

impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::Number(value.into())
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.into())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(value.into())
  }
}

impl From<Rc<str>> for Value {
  fn from(value: Rc<str>) -> Self {
    Value::String(value)
  }
}

impl From<Vec<Value>> for Value {
  fn from(value: Vec<Value>) -> Self {
    Value::Array(value.into())
  }
}

impl From<Object> for Value {
  fn from(value: Object) -> Self {
    Value::Object(Rc::new(value))
  }
}

impl From<Promise> for Value {
  fn from(value: Promise) -> Self {
    Value::Promise(value)
  }
}

/// A plain object with string keys, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
  properties: Vec<(Rc<str>, Value)>,
}

impl Object {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder form of [`Object::set`].
  pub fn with(mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
    self.set(key, value.into());
    self
  }

  /// Sets `key`, replacing an existing property in place or appending a new one.
  pub fn set(&mut self, key: impl Into<Rc<str>>, value: Value) {
    let key = key.into();
    match self.properties.iter_mut().find(|(k, _)| *k == key) {
      Some((_, slot)) => *slot = value,
      None => self.properties.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self
      .properties
      .iter()
      .find(|(k, _)| &**k == key)
      .map(|(_, v)| v)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.properties.iter().map(|(k, _)| &**k)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.properties.iter().map(|(k, v)| (&**k, v))
  }

  pub fn len(&self) -> usize {
    self.properties.len()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }
}

impl Serialize for Object {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.properties.len()))?;
    for (key, value) in &self.properties {
      map.serialize_entry(&**key, value)?;
    }
    map.end()
  }
}
