use crate::Value;
use std::fmt;
use std::rc::Rc;

/// An error value, the equivalent of an ECMAScript `Error` instance.
///
/// Error objects are ordinary [`Value`]s: they are what producers and handlers usually reject
/// with, and what [`any`](crate::any) rejects with (an `AggregateError`) when every input
/// rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
  name: Rc<str>,
  message: Rc<str>,
  stack: Option<Rc<str>>,
  errors: Vec<Value>,
}

impl ErrorObject {
  pub fn new(name: impl Into<Rc<str>>, message: impl Into<Rc<str>>) -> Self {
    Self {
      name: name.into(),
      message: message.into(),
      stack: None,
      errors: Vec::new(),
    }
  }

  /// An `Error` with `message`.
  pub fn error(message: impl Into<Rc<str>>) -> Self {
    Self::new("Error", message)
  }

  /// A `TypeError` with `message`.
  pub fn type_error(message: impl Into<Rc<str>>) -> Self {
    Self::new("TypeError", message)
  }

  /// An `AggregateError` carrying `errors` in order.
  pub fn aggregate(errors: Vec<Value>, message: impl Into<Rc<str>>) -> Self {
    Self {
      errors,
      ..Self::new("AggregateError", message)
    }
  }

  /// Attaches a diagnostic stack trace.
  pub fn with_stack(mut self, stack: impl Into<Rc<str>>) -> Self {
    self.stack = Some(stack.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn stack(&self) -> Option<&str> {
    self.stack.as_deref()
  }

  /// The reasons carried by an `AggregateError`; empty for other errors.
  pub fn errors(&self) -> &[Value] {
    &self.errors
  }

  pub fn is_aggregate(&self) -> bool {
    &*self.name == "AggregateError"
  }
}

impl fmt::Display for ErrorObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.message.is_empty() {
      f.write_str(&self.name)
    } else {
      write!(f, "{}: {}", self.name, self.message)
    }
  }
}

impl From<ErrorObject> for Value {
  fn from(value: ErrorObject) -> Self {
    Value::Error(Rc::new(value))
  }
}
