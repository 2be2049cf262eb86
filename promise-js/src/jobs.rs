//! Jobs scheduled on an [`Agent`](crate::Agent)'s microtask queue.
//!
//! Every observable step of a promise happens inside a job: settling (including adopting the
//! state of an inner promise) and replaying reactions registered after settlement. Hosts can also
//! enqueue their own work via [`Agent::queue_microtask`](crate::Agent::queue_microtask), which is
//! the equivalent of `queueMicrotask`.

use crate::PromiseError;
use std::fmt;

/// A coarse classification of queued work, used for debugging and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  /// A deferred `resolve`/`reject` step of a promise.
  Settle,
  /// Replay of reactions registered on an already settled promise.
  Reaction,
  /// A host callback queued via `queue_microtask`.
  Host,
}

/// The result of running a job.
///
/// If this returns an error, the embedding is expected to treat it like an uncaught exception
/// thrown from a microtask (i.e. report it).
pub type JobResult = Result<(), PromiseError>;

/// A parameterless closure that can be enqueued and later run by the agent.
pub struct Job {
  kind: JobKind,
  run: Box<dyn FnOnce() -> JobResult>,
}

impl Job {
  /// Create a new job of `kind` backed by `run`.
  pub fn new(kind: JobKind, run: impl FnOnce() -> JobResult + 'static) -> Self {
    Self {
      kind,
      run: Box::new(run),
    }
  }

  /// Returns this job's kind.
  #[inline]
  pub fn kind(&self) -> JobKind {
    self.kind
  }

  /// Run the job, consuming it.
  #[inline]
  pub fn run(self) -> JobResult {
    let Job { run, .. } = self;
    run()
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job").field("kind", &self.kind).finish()
  }
}
