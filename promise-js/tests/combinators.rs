use promise_js::all;
use promise_js::all_settled;
use promise_js::any;
use promise_js::race;
use promise_js::Agent;
use promise_js::Promise;
use promise_js::PromiseState;
use promise_js::SettledOutcome;
use promise_js::Value;
use promise_js::ALL_REJECTED_MESSAGE;
use serde_json::json;

#[test]
fn all_fulfills_in_input_order() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, resolve_b, _) = Promise::with_resolvers(&agent);
  let (c, resolve_c, _) = Promise::with_resolvers(&agent);
  let result = all(&agent, [a, b, c]);

  resolve_c.call(3);
  agent.run_until_idle().unwrap();
  resolve_a.call(1);
  resolve_b.call(2);
  agent.run_until_idle().unwrap();

  assert_eq!(
    result.result(),
    Some(Ok(Value::from(vec![Value::from(1), Value::from(2), Value::from(3)])))
  );
}

#[test]
fn all_rejects_with_the_first_rejection() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, _, reject_b) = Promise::with_resolvers(&agent);
  let (c, _, reject_c) = Promise::with_resolvers(&agent);
  let result = all(&agent, [a, b, c]);
  result.catch(Ok);

  resolve_a.call(1);
  agent.run_until_idle().unwrap();
  reject_b.call("e");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Err(Value::from("e"))));

  reject_c.call("later");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Err(Value::from("e"))));
}

#[test]
fn all_of_nothing_is_an_empty_array() {
  let agent = Agent::new();
  let result = all(&agent, Vec::<Promise>::new());
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Ok(Value::from(Vec::<Value>::new()))));
}

#[test]
fn all_settled_describes_every_outcome() {
  let agent = Agent::new();
  let a = Promise::resolved(&agent, 1);
  let b = Promise::rejected(&agent, "e");
  let result = all_settled(&agent, [a, b]);

  agent.run_until_idle().unwrap();
  let Some(Ok(value)) = result.result() else {
    panic!("expected all_settled to fulfill, got {:?}", result.result());
  };
  assert_eq!(
    serde_json::to_value(&value).unwrap(),
    json!([
      { "status": "fulfilled", "value": 1 },
      { "status": "rejected", "reason": "e" },
    ])
  );
  let outcomes: Vec<_> = value
    .as_array()
    .unwrap()
    .iter()
    .map(|v| SettledOutcome::from_value(v).unwrap())
    .collect();
  assert_eq!(
    outcomes,
    vec![
      SettledOutcome::Fulfilled {
        value: Value::from(1)
      },
      SettledOutcome::Rejected {
        reason: Value::from("e")
      },
    ]
  );
}

#[test]
fn all_settled_fulfills_even_when_everything_rejects() {
  let agent = Agent::new();
  let result = all_settled(
    &agent,
    [
      Promise::rejected(&agent, "x"),
      Promise::rejected(&agent, "y"),
    ],
  );
  agent.run_until_idle().unwrap();
  assert_eq!(result.state(), PromiseState::Fulfilled);

  let empty = all_settled(&agent, Vec::<Promise>::new());
  agent.run_until_idle().unwrap();
  assert_eq!(empty.result(), Some(Ok(Value::from(Vec::<Value>::new()))));
}

#[test]
fn race_takes_the_earlier_fulfillment() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, resolve_b, _) = Promise::with_resolvers(&agent);
  let result = race(&agent, [a, b]);

  resolve_b.call("b");
  agent.run_until_idle().unwrap();
  resolve_a.call("a");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Ok(Value::from("b"))));
}

#[test]
fn race_takes_the_earlier_rejection() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, _, reject_b) = Promise::with_resolvers(&agent);
  let result = race(&agent, [a, b]);
  result.catch(Ok);

  // Both settle in the same turn; B's settle job is queued first.
  reject_b.call("b failed");
  resolve_a.call("a");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Err(Value::from("b failed"))));
}

#[test]
fn race_of_nothing_stays_pending() {
  let agent = Agent::new();
  let result = race(&agent, Vec::<Promise>::new());
  agent.run_until_idle().unwrap();
  assert_eq!(result.state(), PromiseState::Pending);
}

#[test]
fn any_aggregates_reasons_in_input_order() {
  let agent = Agent::new();
  let (a, _, reject_a) = Promise::with_resolvers(&agent);
  let (b, _, reject_b) = Promise::with_resolvers(&agent);
  let result = any(&agent, [a, b]);
  result.catch(Ok);

  reject_b.call("e2");
  agent.run_until_idle().unwrap();
  assert_eq!(result.state(), PromiseState::Pending);
  reject_a.call("e1");
  agent.run_until_idle().unwrap();

  let Some(Err(reason)) = result.result() else {
    panic!("expected any to reject, got {:?}", result.result());
  };
  let err = reason.as_error().unwrap();
  assert!(err.is_aggregate());
  assert_eq!(err.message(), ALL_REJECTED_MESSAGE);
  assert_eq!(err.errors(), &[Value::from("e1"), Value::from("e2")]);
}

#[test]
fn any_fulfills_with_the_first_fulfillment() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, _, reject_b) = Promise::with_resolvers(&agent);
  let result = any(&agent, [a, b]);

  reject_b.call("e");
  agent.run_until_idle().unwrap();
  resolve_a.call(5);
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Ok(Value::from(5))));
}

#[test]
fn any_short_circuits_before_remaining_rejections() {
  let agent = Agent::new();
  let (a, resolve_a, _) = Promise::with_resolvers(&agent);
  let (b, _, reject_b) = Promise::with_resolvers(&agent);
  let result = any(&agent, [a, b]);

  resolve_a.call("first");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Ok(Value::from("first"))));

  reject_b.call("ignored");
  agent.run_until_idle().unwrap();
  assert_eq!(result.result(), Some(Ok(Value::from("first"))));
}

#[test]
fn any_of_nothing_rejects_with_an_empty_aggregate() {
  let agent = Agent::new();
  let result = any(&agent, Vec::<Promise>::new());
  result.catch(Ok);
  agent.run_until_idle().unwrap();

  let Some(Err(reason)) = result.result() else {
    panic!("expected any to reject, got {:?}", result.result());
  };
  let err = reason.as_error().unwrap();
  assert!(err.is_aggregate());
  assert!(err.errors().is_empty());
}
