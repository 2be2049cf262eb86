//! A minimal FIFO microtask queue.
//!
//! The queue itself only stores jobs and the checkpoint re-entrancy flag; running jobs is done by
//! [`Agent`](crate::Agent), which must release its borrow of the queue before each job runs so
//! that jobs can enqueue further jobs.

use crate::Job;
use std::collections::VecDeque;

/// A FIFO microtask queue.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
  queue: VecDeque<Job>,
  performing_microtask_checkpoint: bool,
}

impl MicrotaskQueue {
  /// Creates an empty microtask queue.
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Enqueues a job in FIFO order.
  #[inline]
  pub fn enqueue(&mut self, job: Job) {
    self.queue.push_back(job);
  }

  /// Returns the number of queued jobs.
  #[inline]
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  /// Returns whether the queue is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  pub(crate) fn begin_checkpoint(&mut self) -> bool {
    if self.performing_microtask_checkpoint {
      return false;
    }
    self.performing_microtask_checkpoint = true;
    true
  }

  pub(crate) fn end_checkpoint(&mut self) {
    self.performing_microtask_checkpoint = false;
  }

  pub(crate) fn pop_front(&mut self) -> Option<Job> {
    self.queue.pop_front()
  }

  /// Drops all queued jobs without running them, returning how many were discarded.
  pub fn drain_and_cancel(&mut self) -> usize {
    let cancelled = self.queue.len();
    self.queue.clear();
    cancelled
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::JobKind;

  #[test]
  fn checkpoint_flag_is_not_reentrant() {
    let mut queue = MicrotaskQueue::new();
    assert!(queue.begin_checkpoint());
    assert!(!queue.begin_checkpoint());
    queue.end_checkpoint();
    assert!(queue.begin_checkpoint());
  }

  #[test]
  fn pops_in_fifo_order() {
    let mut queue = MicrotaskQueue::new();
    queue.enqueue(Job::new(JobKind::Settle, || Ok(())));
    queue.enqueue(Job::new(JobKind::Host, || Ok(())));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop_front().map(|job| job.kind()), Some(JobKind::Settle));
    assert_eq!(queue.pop_front().map(|job| job.kind()), Some(JobKind::Host));
    assert!(queue.is_empty());
  }

  #[test]
  fn drain_and_cancel_discards_without_running() {
    let mut queue = MicrotaskQueue::new();
    queue.enqueue(Job::new(JobKind::Host, || panic!("cancelled job must not run")));
    assert_eq!(queue.drain_and_cancel(), 1);
    assert!(queue.is_empty());
  }
}
