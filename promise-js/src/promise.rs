//! The promise state machine.
//!
//! A [`Promise`] starts out pending and settles at most once. Both settlement functions are
//! deferred: calling [`Resolve::call`] or [`Reject::call`] only enqueues a settle job on the
//! owning [`Agent`], and the pending check happens again when that job runs. So of several
//! settlement attempts in one turn, the first whose job actually settles wins.
//!
//! Reactions registered before settlement are replayed in registration order by the settle job
//! itself. Reactions registered after settlement are replayed by a reaction job enqueued at
//! registration time, never synchronously inside [`Promise::then`].

use crate::Agent;
use crate::ErrorObject;
use crate::Job;
use crate::JobKind;
use crate::JobResult;
use crate::UncaughtRejection;
use crate::UnhandledRejections;
use crate::Value;
use serde::Serialize;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use tracing::trace;
use tracing::warn;

/// The settlement state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromiseState {
  Pending,
  Fulfilled,
  Rejected,
}

/// Which reaction list a settlement replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PromiseReactionType {
  Fulfill,
  Reject,
}

/// Identifier of a promise, unique within its agent. Used for debugging and tracing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PromiseId(u64);

impl PromiseId {
  #[inline]
  pub const fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  #[inline]
  pub const fn to_raw(self) -> u64 {
    self.0
  }
}

impl fmt::Debug for PromiseId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("PromiseId").field(&self.0).finish()
  }
}

impl fmt::Display for PromiseId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The outcome of a handler: `Ok` fulfills (or, for a promise value, adopts) the derived promise;
/// `Err` is a thrown value and rejects it.
pub type Completion = Result<Value, Value>;

/// A `then`/`catch` handler.
pub struct Handler(Box<dyn FnOnce(Value) -> Completion>);

impl Handler {
  pub fn new(f: impl FnOnce(Value) -> Completion + 'static) -> Self {
    Self(Box::new(f))
  }

  fn call(self, argument: Value) -> Completion {
    (self.0)(argument)
  }
}

impl fmt::Debug for Handler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Handler")
  }
}

type Reaction = Box<dyn FnOnce(Value)>;

enum PromiseRecordState {
  Pending,
  Fulfilled(Value),
  Rejected(Value),
}

impl PromiseRecordState {
  fn state(&self) -> PromiseState {
    match self {
      PromiseRecordState::Pending => PromiseState::Pending,
      PromiseRecordState::Fulfilled(_) => PromiseState::Fulfilled,
      PromiseRecordState::Rejected(_) => PromiseState::Rejected,
    }
  }
}

struct PromiseInner {
  id: PromiseId,
  agent: Agent,
  state: PromiseRecordState,
  fulfill_reactions: Vec<Reaction>,
  reject_reactions: Vec<Reaction>,
}

/// Reactions released by dropped promises, waiting to be dropped by the outermost drop.
///
/// A pending `then` chain is a linked list: each reaction owns the next derived promise. Dropping
/// the reactions from inside `PromiseInner::drop` would recurse once per link.
#[derive(Default)]
struct DeferredDrops {
  reactions: Vec<Reaction>,
  draining: bool,
}

thread_local! {
  static DEFERRED_DROPS: RefCell<DeferredDrops> = RefCell::new(DeferredDrops::default());
}

struct DrainGuard;

impl Drop for DrainGuard {
  fn drop(&mut self) {
    let _ = DEFERRED_DROPS.try_with(|deferred| deferred.borrow_mut().draining = false);
  }
}

impl Drop for PromiseInner {
  fn drop(&mut self) {
    let mut reactions = mem::take(&mut self.fulfill_reactions);
    reactions.append(&mut self.reject_reactions);
    if reactions.is_empty() {
      return;
    }

    // If the thread-local is already gone, `reactions` is dropped in place.
    let should_drain = DEFERRED_DROPS.try_with(|deferred| {
      let mut deferred = deferred.borrow_mut();
      deferred.reactions.append(&mut reactions);
      !mem::replace(&mut deferred.draining, true)
    });
    if !matches!(should_drain, Ok(true)) {
      return;
    }

    let _guard = DrainGuard;
    loop {
      let next = DEFERRED_DROPS
        .try_with(|deferred| deferred.borrow_mut().reactions.pop())
        .ok()
        .flatten();
      match next {
        // Dropped outside the borrow; nested promise drops only append to the worklist.
        Some(reaction) => drop(reaction),
        None => break,
      }
    }
  }
}

/// A deferred value: the eventual result (fulfillment value or rejection reason) of an
/// asynchronous computation.
///
/// `Promise` is a handle; clones refer to the same promise.
#[derive(Clone)]
pub struct Promise {
  inner: Rc<RefCell<PromiseInner>>,
}

/// The settle-success function handed to a producer.
#[derive(Clone)]
pub struct Resolve {
  promise: Promise,
}

impl Resolve {
  /// Resolves the promise with `value` on a later microtask turn. If `value` is a promise, its
  /// eventual outcome is adopted instead.
  pub fn call(&self, value: impl Into<Value>) {
    self
      .promise
      .settle_deferred(PromiseReactionType::Fulfill, value.into());
  }
}

impl fmt::Debug for Resolve {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Resolve").field(&self.promise.id()).finish()
  }
}

/// The settle-failure function handed to a producer.
#[derive(Clone)]
pub struct Reject {
  promise: Promise,
}

impl Reject {
  /// Rejects the promise with `reason` on a later microtask turn.
  pub fn call(&self, reason: impl Into<Value>) {
    self
      .promise
      .settle_deferred(PromiseReactionType::Reject, reason.into());
  }
}

impl fmt::Debug for Reject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Reject").field(&self.promise.id()).finish()
  }
}

fn call_handler(handler: Handler, argument: Value, resolve: &Resolve, reject: &Reject) {
  match handler.call(argument) {
    Ok(value) => resolve.call(value),
    Err(thrown) => reject.call(thrown),
  }
}

impl Promise {
  /// Creates a promise and runs `producer` synchronously with its settlement functions.
  ///
  /// If the producer returns `Err`, the promise is rejected with the thrown value.
  pub fn new<F>(agent: &Agent, producer: F) -> Self
  where
    F: FnOnce(Resolve, Reject) -> Result<(), Value>,
  {
    let (promise, resolve, reject) = Self::with_resolvers(agent);
    if let Err(thrown) = producer(resolve, reject.clone()) {
      reject.call(thrown);
    }
    promise
  }

  /// Creates a pending promise along with its settlement functions.
  pub fn with_resolvers(agent: &Agent) -> (Self, Resolve, Reject) {
    let promise = Self {
      inner: Rc::new(RefCell::new(PromiseInner {
        id: agent.next_promise_id(),
        agent: agent.clone(),
        state: PromiseRecordState::Pending,
        fulfill_reactions: Vec::new(),
        reject_reactions: Vec::new(),
      })),
    };
    let resolve = Resolve {
      promise: promise.clone(),
    };
    let reject = Reject {
      promise: promise.clone(),
    };
    (promise, resolve, reject)
  }

  /// A promise resolved with `value` (adopting it if it is a promise).
  pub fn resolved(agent: &Agent, value: impl Into<Value>) -> Self {
    let (promise, resolve, _) = Self::with_resolvers(agent);
    resolve.call(value);
    promise
  }

  /// A promise rejected with `reason`.
  pub fn rejected(agent: &Agent, reason: impl Into<Value>) -> Self {
    let (promise, _, reject) = Self::with_resolvers(agent);
    reject.call(reason);
    promise
  }

  pub fn id(&self) -> PromiseId {
    self.inner.borrow().id
  }

  /// The agent this promise schedules its jobs on.
  pub fn agent(&self) -> Agent {
    self.inner.borrow().agent.clone()
  }

  pub fn state(&self) -> PromiseState {
    self.inner.borrow().state.state()
  }

  /// The settled payload: `Ok(value)` once fulfilled, `Err(reason)` once rejected.
  pub fn result(&self) -> Option<Completion> {
    match &self.inner.borrow().state {
      PromiseRecordState::Pending => None,
      PromiseRecordState::Fulfilled(value) => Some(Ok(value.clone())),
      PromiseRecordState::Rejected(reason) => Some(Err(reason.clone())),
    }
  }

  /// Returns whether `self` and `other` are handles to the same promise.
  pub fn ptr_eq(&self, other: &Promise) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }

  fn settle_deferred(&self, type_: PromiseReactionType, value: Value) {
    let promise = self.clone();
    self
      .agent()
      .enqueue(Job::new(JobKind::Settle, move || promise.settle(type_, value)));
  }

  fn settle(&self, type_: PromiseReactionType, value: Value) -> JobResult {
    if self.state() != PromiseState::Pending {
      return Ok(());
    }

    if let Value::Promise(inner) = &value {
      if inner.ptr_eq(self) {
        let err = ErrorObject::type_error("Chaining cycle detected for promise");
        return self.settle(PromiseReactionType::Reject, err.into());
      }
      trace!(promise = %self.id(), inner = %inner.id(), "adopting state of inner promise");
      let resolve = Resolve {
        promise: self.clone(),
      };
      let reject = Reject {
        promise: self.clone(),
      };
      inner.subscribe(
        Box::new(move |value: Value| resolve.call(value)),
        Box::new(move |reason: Value| reject.call(reason)),
      );
      return Ok(());
    }

    {
      let mut inner = self.inner.borrow_mut();
      if type_ == PromiseReactionType::Reject && inner.reject_reactions.is_empty() {
        match inner.agent.options().unhandled_rejections {
          UnhandledRejections::Strict => return Err(UncaughtRejection::new(value).into()),
          UnhandledRejections::Warn => {
            warn!(promise = %inner.id, reason = %value, "unhandled promise rejection");
          }
        }
      }
      inner.state = match type_ {
        PromiseReactionType::Fulfill => PromiseRecordState::Fulfilled(value),
        PromiseReactionType::Reject => PromiseRecordState::Rejected(value),
      };
      trace!(promise = %inner.id, state = ?inner.state.state(), "settled");
    }

    self.run_reactions();
    Ok(())
  }

  /// Drains both reaction lists, invoking the ones matching the settled state.
  fn run_reactions(&self) {
    let (reactions, argument) = {
      let mut inner = self.inner.borrow_mut();
      let fulfill_reactions = mem::take(&mut inner.fulfill_reactions);
      let reject_reactions = mem::take(&mut inner.reject_reactions);
      match &inner.state {
        PromiseRecordState::Pending => return,
        PromiseRecordState::Fulfilled(value) => (fulfill_reactions, value.clone()),
        PromiseRecordState::Rejected(reason) => (reject_reactions, reason.clone()),
      }
    };

    for reaction in reactions {
      reaction(argument.clone());
    }
  }

  fn subscribe(&self, on_fulfilled: Reaction, on_rejected: Reaction) {
    let mut inner = self.inner.borrow_mut();
    inner.fulfill_reactions.push(on_fulfilled);
    inner.reject_reactions.push(on_rejected);
    if !matches!(inner.state, PromiseRecordState::Pending) {
      let promise = self.clone();
      inner.agent.enqueue(Job::new(JobKind::Reaction, move || {
        promise.run_reactions();
        Ok(())
      }));
    }
  }

  /// Registers fulfillment and rejection handlers, returning the derived promise.
  ///
  /// A missing handler forwards the value (or reason) to the derived promise unchanged. A
  /// handler's `Ok` resolves the derived promise and its `Err` rejects it; errors never flow back
  /// into `self`.
  pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
    let (derived, resolve, reject) = Self::with_resolvers(&self.agent());

    let fulfill_reaction: Reaction = {
      let resolve = resolve.clone();
      let reject = reject.clone();
      Box::new(move |value: Value| match on_fulfilled {
        Some(handler) => call_handler(handler, value, &resolve, &reject),
        None => resolve.call(value),
      })
    };
    let reject_reaction: Reaction = Box::new(move |reason: Value| match on_rejected {
      Some(handler) => call_handler(handler, reason, &resolve, &reject),
      None => reject.call(reason),
    });

    self.subscribe(fulfill_reaction, reject_reaction);
    derived
  }

  /// `then(on_fulfilled)`: the common single-handler form.
  pub fn and_then(&self, on_fulfilled: impl FnOnce(Value) -> Completion + 'static) -> Promise {
    self.then(Some(Handler::new(on_fulfilled)), None)
  }

  /// `then(None, on_rejected)`.
  pub fn catch(&self, on_rejected: impl FnOnce(Value) -> Completion + 'static) -> Promise {
    self.then(None, Some(Handler::new(on_rejected)))
  }

  /// Runs `on_finally` once the promise settles either way, then forwards the original outcome.
  ///
  /// If `on_finally` itself returns `Err`, the derived promise rejects with that error instead.
  pub fn finally(&self, on_finally: impl FnOnce() -> Result<(), Value> + 'static) -> Promise {
    let on_finally = Rc::new(Cell::new(Some(on_finally)));
    let on_fulfilled = {
      let on_finally = on_finally.clone();
      Handler::new(move |value| {
        if let Some(f) = on_finally.take() {
          f()?;
        }
        Ok(value)
      })
    };
    let on_rejected = Handler::new(move |reason| {
      if let Some(f) = on_finally.take() {
        f()?;
      }
      Err(reason)
    });
    self.then(Some(on_fulfilled), Some(on_rejected))
  }
}

impl fmt::Debug for Promise {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.inner.try_borrow() {
      Ok(inner) => f
        .debug_struct("Promise")
        .field("id", &inner.id)
        .field("state", &inner.state.state())
        .finish(),
      Err(_) => f.debug_struct("Promise").finish_non_exhaustive(),
    }
  }
}
