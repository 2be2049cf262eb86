//! JavaScript-style Promises on a single-threaded microtask agent.
//!
//! This crate provides:
//! - [`Promise`], a deferred value that settles at most once, with `then`/`catch`/`finally`
//! - the combinators [`all`], [`all_settled`], [`race`] and [`any`]
//! - [`Agent`], which owns the FIFO microtask queue every promise schedules its work on
//!
//! # Scheduling model
//!
//! Nothing a promise does happens synchronously. Settling enqueues a job; registering a handler on
//! an already settled promise enqueues a job. The embedding drives execution by draining the
//! agent's queue:
//!
//! ```
//! use promise_js::{Agent, Promise, Value};
//!
//! let agent = Agent::new();
//! let doubled = Promise::new(&agent, |resolve, _reject| {
//!   resolve.call(21);
//!   Ok(())
//! })
//! .and_then(|value| Ok(Value::from(value.as_number().unwrap_or_default() * 2.0)));
//!
//! assert!(doubled.result().is_none());
//! agent.run_until_idle().unwrap();
//! assert_eq!(doubled.result(), Some(Ok(Value::from(42))));
//! ```
//!
//! # Unhandled rejections
//!
//! Rejecting a promise that has no rejection handler registered at that moment is a fault: by
//! default ([`UnhandledRejections::Strict`]) the settling job fails with
//! [`PromiseError::UncaughtRejection`] and the promise stays pending. Attach a handler before the
//! rejection is processed (for example with [`Promise::catch`]) to observe it instead.

mod agent;
mod combinators;
mod error;
mod error_object;
mod jobs;
mod microtask_queue;
mod promise;
mod value;

pub use crate::agent::Agent;
pub use crate::agent::AgentOptions;
pub use crate::agent::UnhandledRejections;
pub use crate::combinators::all;
pub use crate::combinators::all_settled;
pub use crate::combinators::any;
pub use crate::combinators::race;
pub use crate::combinators::SettledOutcome;
pub use crate::combinators::ALL_REJECTED_MESSAGE;
pub use crate::error::PromiseError;
pub use crate::error::UncaughtRejection;
pub use crate::error_object::ErrorObject;
pub use crate::jobs::Job;
pub use crate::jobs::JobKind;
pub use crate::jobs::JobResult;
pub use crate::microtask_queue::MicrotaskQueue;
pub use crate::promise::Completion;
pub use crate::promise::Handler;
pub use crate::promise::Promise;
pub use crate::promise::PromiseId;
pub use crate::promise::PromiseState;
pub use crate::promise::Reject;
pub use crate::promise::Resolve;
pub use crate::value::Object;
pub use crate::value::Value;
