use crate::Job;
use crate::JobKind;
use crate::JobResult;
use crate::MicrotaskQueue;
use crate::PromiseError;
use crate::PromiseId;
use crate::Value;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug_span;

/// What to do when a promise is rejected while it has no rejection reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledRejections {
  /// Raise [`PromiseError::UncaughtRejection`] from the settling job. The rejection does not
  /// take effect: the promise stays pending.
  #[default]
  Strict,
  /// Log the rejection with `tracing::warn!` and settle the promise as rejected anyway.
  Warn,
}

/// Options shared by every promise created on an [`Agent`].
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
  pub unhandled_rejections: UnhandledRejections,
}

impl AgentOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn unhandled_rejections(mut self, mode: UnhandledRejections) -> Self {
    self.unhandled_rejections = mode;
    self
  }
}

struct AgentInner {
  options: AgentOptions,
  queue: RefCell<MicrotaskQueue>,
  next_promise_id: Cell<u64>,
}

/// The single-threaded host of a microtask queue.
///
/// Every [`Promise`](crate::Promise) belongs to an agent and schedules all of its settlement steps
/// and reaction replays as jobs on the agent's queue. Nothing runs until the embedding drains the
/// queue with [`Agent::perform_microtask_checkpoint`], [`Agent::run_until_idle`] or
/// [`Agent::perform_one_microtask`].
///
/// `Agent` is a cheap handle; clones share the same queue.
///
/// Queued jobs keep their promises (and through them the agent) alive. An embedding that abandons
/// an agent with work still queued should call [`Agent::clear`].
#[derive(Clone)]
pub struct Agent {
  inner: Rc<AgentInner>,
}

impl Default for Agent {
  fn default() -> Self {
    Self::new()
  }
}

/// Resets the checkpoint flag even if a job panics.
struct CheckpointGuard<'a> {
  queue: &'a RefCell<MicrotaskQueue>,
}

impl Drop for CheckpointGuard<'_> {
  fn drop(&mut self) {
    self.queue.borrow_mut().end_checkpoint();
  }
}

impl Agent {
  pub fn new() -> Self {
    Self::with_options(AgentOptions::default())
  }

  pub fn with_options(options: AgentOptions) -> Self {
    Self {
      inner: Rc::new(AgentInner {
        options,
        queue: RefCell::new(MicrotaskQueue::new()),
        next_promise_id: Cell::new(0),
      }),
    }
  }

  #[inline]
  pub fn options(&self) -> &AgentOptions {
    &self.inner.options
  }

  /// Returns whether `self` and `other` are handles to the same agent.
  pub fn ptr_eq(&self, other: &Agent) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }

  pub(crate) fn next_promise_id(&self) -> PromiseId {
    let id = self.inner.next_promise_id.get();
    self.inner.next_promise_id.set(id + 1);
    PromiseId::from_raw(id)
  }

  /// Enqueues a job in FIFO order.
  pub fn enqueue(&self, job: Job) {
    self.inner.queue.borrow_mut().enqueue(job);
  }

  /// The `queueMicrotask` host operation.
  ///
  /// If `callback` returns `Err`, the thrown value is reported as [`PromiseError::Throw`].
  pub fn queue_microtask(&self, callback: impl FnOnce() -> Result<(), Value> + 'static) {
    self.enqueue(Job::new(JobKind::Host, move || {
      callback().map_err(PromiseError::Throw)
    }));
  }

  /// Returns the number of queued jobs.
  pub fn pending_jobs(&self) -> usize {
    self.inner.queue.borrow().len()
  }

  /// Returns whether there is no queued work.
  pub fn is_idle(&self) -> bool {
    self.inner.queue.borrow().is_empty()
  }

  fn pop_job(&self) -> Option<Job> {
    self.inner.queue.borrow_mut().pop_front()
  }

  fn begin_checkpoint(&self) -> Option<CheckpointGuard<'_>> {
    if !self.inner.queue.borrow_mut().begin_checkpoint() {
      return None;
    }
    Some(CheckpointGuard {
      queue: &self.inner.queue,
    })
  }

  /// Runs exactly one queued job (one microtask turn).
  ///
  /// Returns `None` if the queue is empty or a checkpoint is in progress.
  pub fn perform_one_microtask(&self) -> Option<JobResult> {
    let _checkpoint = self.begin_checkpoint()?;
    let job = self.pop_job()?;
    Some(job.run())
  }

  /// Performs a microtask checkpoint (HTML terminology).
  ///
  /// - If a checkpoint is already in progress, this is a no-op (reentrancy guard).
  /// - Otherwise, drains the queue until it becomes empty, including jobs enqueued by jobs.
  ///
  /// Errors returned by jobs are collected and returned; the checkpoint keeps running later jobs
  /// even if earlier ones fail (HTML's "report the exception" behavior).
  pub fn perform_microtask_checkpoint(&self) -> Vec<PromiseError> {
    let mut errors = Vec::new();
    let Some(_checkpoint) = self.begin_checkpoint() else {
      return errors;
    };

    let span = debug_span!("microtask_checkpoint", jobs = tracing::field::Empty);
    let _enter = span.enter();
    let mut jobs = 0usize;
    while let Some(job) = self.pop_job() {
      jobs += 1;
      if let Err(err) = job.run() {
        errors.push(err);
      }
    }
    span.record("jobs", jobs);
    errors
  }

  /// Drains the queue, stopping at the first fault.
  ///
  /// This is the fatal-by-default way to run microtasks: the first uncaught rejection (or
  /// throwing host job) is returned and the remaining jobs stay queued, so the caller may inspect
  /// state and resume. Called from inside a running job, this is a no-op.
  pub fn run_until_idle(&self) -> Result<(), PromiseError> {
    let Some(_checkpoint) = self.begin_checkpoint() else {
      return Ok(());
    };

    let span = debug_span!("microtask_checkpoint", jobs = tracing::field::Empty);
    let _enter = span.enter();
    let mut jobs = 0usize;
    let result = loop {
      let Some(job) = self.pop_job() else {
        break Ok(());
      };
      jobs += 1;
      if let Err(err) = job.run() {
        break Err(err);
      }
    };
    span.record("jobs", jobs);
    result
  }

  /// Cancels all queued jobs without running them, returning how many were dropped.
  ///
  /// Promises waiting on cancelled settlement steps stay pending forever.
  pub fn clear(&self) -> usize {
    self.inner.queue.borrow_mut().drain_and_cancel()
  }
}

impl fmt::Debug for Agent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Agent")
      .field("options", &self.inner.options)
      .field("pending_jobs", &self.inner.queue.try_borrow().map(|q| q.len()).ok())
      .finish()
  }
}
