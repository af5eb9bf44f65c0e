// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests against the `engine` crate's public API directly
//! (no parser involved) — these exercise invariants that are awkward to
//! phrase as a literal script: microtask/macrotask ordering, call-stack
//! depth, and promise single-shot settlement.
//!
//! Literal end-to-end scripts live in the top-level `e2e-tests` crate,
//! which drives `parser` and `engine` together.

use engine::context::{Agent, EngineOptions};
use engine::function::FunctionFlags;
use engine::promise::PromiseState;
use engine::value::Value;

fn new_agent() -> Agent {
    Agent::new(EngineOptions::default())
}

fn push_marker(agent: &mut Agent, _this: Value, args: &[Value]) -> engine::error::JsResult<Value> {
    let env = agent.global_environment();
    let order_key = agent.intern("order");
    let Value::Object(arr) = agent.get_binding(env, order_key)? else {
        unreachable!("test fixture always seeds `order` as an array")
    };
    let len = agent.array_length(arr);
    agent.array_push_element(arr, len, args[0].clone());
    Ok(Value::Undefined)
}

#[test]
fn microtasks_run_before_the_next_macrotask() {
    // Invariant 4: schedule_microtask(m); schedule_macrotask(t) must run m
    // strictly before t.
    let mut agent = new_agent();
    let env = agent.global_environment();
    let order_key = agent.intern("order");
    let order_array = agent.new_array_from(Vec::new());
    agent.create_binding(env, order_key, Some(Value::Object(order_array)), true, true).unwrap();

    let micro = agent.new_native_function("micro", 1, push_marker, FunctionFlags::default());
    let macro_fn = agent.new_native_function("macro", 1, push_marker, FunctionFlags::default());
    agent.event_loop.schedule_microtask(micro, Value::from_str("micro"));
    agent.event_loop.schedule_macrotask(macro_fn);

    agent.drain_microtasks();
    // After the microtask drain, only "micro" should have run.
    assert_eq!(agent.array_length(order_array), 1);

    agent.run_event_loop();
    agent.event_loop.stop();
    assert_eq!(agent.array_length(order_array), 2);
}

#[test]
fn call_stack_depth_is_bounded() {
    // Invariant 8: recursing past the configured depth raises a RangeError
    // before the host stack overflows.
    let options = EngineOptions { max_call_depth: 8, ..EngineOptions::default() };
    let mut agent = Agent::new(options);

    fn recurse(agent: &mut Agent, this: Value, _args: &[Value]) -> engine::error::JsResult<Value> {
        agent.call(&this, this.clone(), &[])
    }
    let f = agent.new_native_function("recurse", 0, recurse, FunctionFlags::default());
    let callee = Value::Function(f);
    let result = agent.call(&callee, callee.clone(), &[]);
    assert!(result.is_err(), "expected a RangeError once depth exceeds the configured limit");
}

#[test]
fn promise_settlement_is_permanent_and_single_shot() {
    let mut agent = new_agent();
    let (_obj, promise) = agent.new_promise();
    agent.resolve_promise(promise, Value::Number(1.0));
    agent.resolve_promise(promise, Value::Number(2.0));
    assert_eq!(agent.promise_state(promise), PromiseState::Fulfilled);
    assert!(matches!(agent.promise_value(promise), Value::Number(n) if n == 1.0));

    agent.reject_promise(promise, Value::Number(99.0));
    assert_eq!(agent.promise_state(promise), PromiseState::Fulfilled, "a settled promise cannot flip state");
}
