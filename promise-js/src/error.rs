use crate::Value;

/// Faults surfaced to the host while running microtasks.
///
/// These are never delivered to promise handlers; they are what a host would report as an
/// uncaught error from a microtask.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromiseError {
  /// A promise was rejected while nothing was listening for its rejection.
  #[error(transparent)]
  UncaughtRejection(#[from] UncaughtRejection),

  /// A job queued with [`Agent::queue_microtask`](crate::Agent::queue_microtask) threw.
  #[error("uncaught exception: {0}")]
  Throw(Value),
}

/// A genuine rejection of a promise that had no rejection reactions registered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Uncaught (in promise) {reason}")]
pub struct UncaughtRejection {
  reason: Value,
  stack: Option<String>,
}

impl UncaughtRejection {
  pub fn new(reason: Value) -> Self {
    let stack = reason
      .as_error()
      .and_then(|err| err.stack())
      .map(|stack| format!("(in promise) {stack}"));
    Self { reason, stack }
  }

  /// The rejection reason that nobody handled.
  pub fn reason(&self) -> &Value {
    &self.reason
  }

  /// The reason's stack trace, if it is an error value that carried one.
  pub fn stack(&self) -> Option<&str> {
    self.stack.as_deref()
  }

  pub fn into_reason(self) -> Value {
    self.reason
  }
}
