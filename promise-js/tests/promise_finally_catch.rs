use std::cell::Cell;
use std::rc::Rc;

use promise_js::Agent;
use promise_js::Promise;
use promise_js::Value;

fn counter() -> (Rc<Cell<u32>>, impl FnOnce() -> Result<(), Value>) {
  let calls = Rc::new(Cell::new(0));
  let on_finally = {
    let calls = calls.clone();
    move || {
      calls.set(calls.get() + 1);
      Ok(())
    }
  };
  (calls, on_finally)
}

#[test]
fn finally_runs_once_and_forwards_fulfillment() {
  let agent = Agent::new();
  let (calls, on_finally) = counter();
  let derived = Promise::resolved(&agent, "value").finally(on_finally);
  assert_eq!(calls.get(), 0);

  agent.run_until_idle().unwrap();
  assert_eq!(calls.get(), 1);
  assert_eq!(derived.result(), Some(Ok(Value::from("value"))));
}

#[test]
fn finally_runs_once_and_forwards_rejection() {
  let agent = Agent::new();
  let (calls, on_finally) = counter();
  let derived = Promise::rejected(&agent, "reason").finally(on_finally);
  let caught = derived.catch(Ok);

  agent.run_until_idle().unwrap();
  assert_eq!(calls.get(), 1);
  assert_eq!(derived.result(), Some(Err(Value::from("reason"))));
  assert_eq!(caught.result(), Some(Ok(Value::from("reason"))));
}

#[test]
fn finally_error_replaces_the_outcome() {
  let agent = Agent::new();

  let from_fulfilled =
    Promise::resolved(&agent, 1).finally(|| Err(Value::from("cleanup failed")));
  from_fulfilled.catch(Ok);

  let from_rejected =
    Promise::rejected(&agent, "original").finally(|| Err(Value::from("cleanup failed")));
  from_rejected.catch(Ok);

  agent.run_until_idle().unwrap();
  assert_eq!(from_fulfilled.result(), Some(Err(Value::from("cleanup failed"))));
  assert_eq!(from_rejected.result(), Some(Err(Value::from("cleanup failed"))));
}

#[test]
fn catch_recovers_and_the_chain_continues() {
  let agent = Agent::new();
  let seen = Rc::new(Cell::new(false));
  let chained = {
    let seen = seen.clone();
    Promise::rejected(&agent, "r")
      .catch(|reason| Ok(Value::from(format!("recovered from {reason}"))))
      .and_then(move |value| {
        seen.set(true);
        Ok(value)
      })
  };

  agent.run_until_idle().unwrap();
  assert!(seen.get());
  assert_eq!(chained.result(), Some(Ok(Value::from("recovered from r"))));
}

#[test]
fn catch_passes_fulfillment_through() {
  let agent = Agent::new();
  let called = Rc::new(Cell::new(false));
  let derived = {
    let called = called.clone();
    Promise::resolved(&agent, 9).catch(move |reason| {
      called.set(true);
      Ok(reason)
    })
  };

  agent.run_until_idle().unwrap();
  assert!(!called.get());
  assert_eq!(derived.result(), Some(Ok(Value::from(9))));
}

#[test]
fn rethrowing_from_catch_keeps_the_chain_rejected() {
  let agent = Agent::new();
  let derived = Promise::rejected(&agent, "first").catch(|reason| Err(Value::from(format!("{reason}!"))));
  let caught = derived.catch(Ok);

  agent.run_until_idle().unwrap();
  assert_eq!(derived.result(), Some(Err(Value::from("first!"))));
  assert_eq!(caught.result(), Some(Ok(Value::from("first!"))));
}
