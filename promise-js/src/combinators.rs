//! `Promise.all`, `Promise.allSettled`, `Promise.race` and `Promise.any`.
//!
//! Each combinator is an ordinary consumer of [`Promise::then`]: it registers one fulfillment and
//! one rejection handler per input and settles its own result promise through the public
//! [`Resolve`](crate::Resolve)/[`Reject`](crate::Reject) functions. Registering both handlers in a
//! single `then` call keeps fulfillments and rejections the same number of turns away from the
//! result, so "first to settle" means the same thing in either direction.

use crate::Agent;
use crate::Completion;
use crate::ErrorObject;
use crate::Handler;
use crate::Object;
use crate::Promise;
use crate::Value;
use serde::Serialize;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

/// Message of the `AggregateError` produced by [`any`].
pub const ALL_REJECTED_MESSAGE: &str = "All promises were rejected";

/// The per-input descriptor produced by [`all_settled`].
///
/// As a [`Value`] this is the object `{status: "fulfilled", value}` or
/// `{status: "rejected", reason}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettledOutcome {
  Fulfilled { value: Value },
  Rejected { reason: Value },
}

impl SettledOutcome {
  /// Parses a descriptor object back into an outcome.
  pub fn from_value(value: &Value) -> Option<Self> {
    let obj = value.as_object()?;
    match obj.get("status")?.as_str()? {
      "fulfilled" => Some(SettledOutcome::Fulfilled {
        value: obj.get("value").cloned().unwrap_or_default(),
      }),
      "rejected" => Some(SettledOutcome::Rejected {
        reason: obj.get("reason").cloned().unwrap_or_default(),
      }),
      _ => None,
    }
  }
}

impl From<SettledOutcome> for Value {
  fn from(outcome: SettledOutcome) -> Self {
    match outcome {
      SettledOutcome::Fulfilled { value } => Object::new()
        .with("status", "fulfilled")
        .with("value", value)
        .into(),
      SettledOutcome::Rejected { reason } => Object::new()
        .with("status", "rejected")
        .with("reason", reason)
        .into(),
    }
  }
}

/// Fixed-size, index-addressed result slots that report when the last one is filled.
struct Slots {
  values: RefCell<Vec<Value>>,
  remaining: Cell<usize>,
}

impl Slots {
  fn new(len: usize) -> Rc<Self> {
    Rc::new(Self {
      values: RefCell::new(vec![Value::Undefined; len]),
      remaining: Cell::new(len),
    })
  }

  /// Stores `value` at `index`, returning all values once every slot has been filled.
  fn fill(&self, index: usize, value: Value) -> Option<Vec<Value>> {
    if let Some(slot) = self.values.borrow_mut().get_mut(index) {
      *slot = value;
    }
    let remaining = self.remaining.get().saturating_sub(1);
    self.remaining.set(remaining);
    (remaining == 0).then(|| self.values.take())
  }
}

/// Fulfills with every input's value, in input order, once all inputs fulfill. Rejects with the
/// first rejection reason.
pub fn all(agent: &Agent, promises: impl IntoIterator<Item = Promise>) -> Promise {
  let promises: Vec<Promise> = promises.into_iter().collect();
  let (result, resolve, reject) = Promise::with_resolvers(agent);
  if promises.is_empty() {
    resolve.call(Vec::<Value>::new());
    return result;
  }

  let slots = Slots::new(promises.len());
  for (index, promise) in promises.into_iter().enumerate() {
    let on_fulfilled = {
      let slots = slots.clone();
      let resolve = resolve.clone();
      Handler::new(move |value| {
        if let Some(values) = slots.fill(index, value) {
          resolve.call(values);
        }
        Ok(Value::Undefined)
      })
    };
    let on_rejected = {
      let reject = reject.clone();
      Handler::new(move |reason| {
        reject.call(reason);
        Ok(Value::Undefined)
      })
    };
    promise.then(Some(on_fulfilled), Some(on_rejected));
  }
  result
}

/// Fulfills once every input settles, with a [`SettledOutcome`] descriptor per input. Never
/// rejects.
pub fn all_settled(agent: &Agent, promises: impl IntoIterator<Item = Promise>) -> Promise {
  let promises: Vec<Promise> = promises.into_iter().collect();
  let (result, resolve, _) = Promise::with_resolvers(agent);
  if promises.is_empty() {
    resolve.call(Vec::<Value>::new());
    return result;
  }

  let slots = Slots::new(promises.len());
  for (index, promise) in promises.into_iter().enumerate() {
    let record = {
      let slots = slots.clone();
      let resolve = resolve.clone();
      move |outcome: SettledOutcome| -> Completion {
        if let Some(values) = slots.fill(index, outcome.into()) {
          resolve.call(values);
        }
        Ok(Value::Undefined)
      }
    };
    let record_rejection = record.clone();
    promise.then(
      Some(Handler::new(move |value| {
        record(SettledOutcome::Fulfilled { value })
      })),
      Some(Handler::new(move |reason| {
        record_rejection(SettledOutcome::Rejected { reason })
      })),
    );
  }
  result
}

/// Settles like whichever input settles first, in either direction.
///
/// With no inputs, the result stays pending forever.
pub fn race(agent: &Agent, promises: impl IntoIterator<Item = Promise>) -> Promise {
  let (result, resolve, reject) = Promise::with_resolvers(agent);
  for promise in promises {
    let resolve = resolve.clone();
    let reject = reject.clone();
    promise.then(
      Some(Handler::new(move |value| {
        resolve.call(value);
        Ok(Value::Undefined)
      })),
      Some(Handler::new(move |reason| {
        reject.call(reason);
        Ok(Value::Undefined)
      })),
    );
  }
  result
}

/// Fulfills with the first fulfillment. If every input rejects, rejects with an
/// `AggregateError` whose `errors` are the reasons in input order.
pub fn any(agent: &Agent, promises: impl IntoIterator<Item = Promise>) -> Promise {
  let promises: Vec<Promise> = promises.into_iter().collect();
  let (result, resolve, reject) = Promise::with_resolvers(agent);
  if promises.is_empty() {
    reject.call(ErrorObject::aggregate(Vec::new(), ALL_REJECTED_MESSAGE));
    return result;
  }

  let slots = Slots::new(promises.len());
  for (index, promise) in promises.into_iter().enumerate() {
    let on_fulfilled = {
      let resolve = resolve.clone();
      Handler::new(move |value| {
        resolve.call(value);
        Ok(Value::Undefined)
      })
    };
    let on_rejected = {
      let slots = slots.clone();
      let reject = reject.clone();
      Handler::new(move |reason| {
        if let Some(errors) = slots.fill(index, reason) {
          reject.call(ErrorObject::aggregate(errors, ALL_REJECTED_MESSAGE));
        }
        Ok(Value::Undefined)
      })
    };
    promise.then(Some(on_fulfilled), Some(on_rejected));
  }
  result
}
