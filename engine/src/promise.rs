// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Promise state machine.
//!
//! Fulfillment/rejection is permanent and single-shot: once a promise
//! leaves `Pending` its handler lists are drained once and the state never
//! changes again.

use crate::context::{Agent, JsResult};
use crate::function::FunctionRef;
use crate::object::ObjectRef;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

pub struct Reaction {
    pub handler: Option<FunctionRef>,
    pub result_capability: ObjectRef,
}

pub struct PromiseData {
    pub state: PromiseState,
    pub value: Value,
    pub fulfill_reactions: Vec<Reaction>,
    pub reject_reactions: Vec<Reaction>,
    pub is_handled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseRef(pub(crate) u32);

impl Agent {
    pub fn new_promise(&mut self) -> (ObjectRef, PromiseRef) {
        let id = PromiseRef(self.promises.len() as u32);
        self.promises.push(PromiseData { state: PromiseState::Pending, value: Value::Undefined, fulfill_reactions: Vec::new(), reject_reactions: Vec::new(), is_handled: false });
        let obj = self.new_object(Some(self.object_prototype()), crate::object::ObjectKind::Promise);
        self.bind_promise_object(obj, id);
        (obj, id)
    }

    /// Settles a promise (fulfilled or rejected branch share this: only
    /// the reaction list and recorded value differ). No-op once the
    /// promise has already settled.
    fn settle(&mut self, promise: PromiseRef, state: PromiseState, value: Value) {
        let data = &mut self.promises[promise.0 as usize];
        if data.state != PromiseState::Pending {
            return;
        }
        data.state = state;
        data.value = value.clone();
        let reactions = match state {
            PromiseState::Fulfilled => std::mem::take(&mut data.fulfill_reactions),
            _ => std::mem::take(&mut data.reject_reactions),
        };
        data.fulfill_reactions.clear();
        data.reject_reactions.clear();
        for reaction in reactions {
            if let Some(handler) = reaction.handler {
                self.event_loop.schedule_microtask(handler, value.clone());
            }
        }
    }

    pub fn resolve_promise(&mut self, promise: PromiseRef, value: Value) {
        // A resolution value that is itself a thenable is adopted rather
        // than stored directly (`PromiseResolveThenableJob` in the real
        // algorithm); the core keeps this simplified to "resolve with the
        // value" since thenable adoption is a built-ins-layer concern once
        // `then` is a user-overridable method.
        self.settle(promise, PromiseState::Fulfilled, value);
    }

    pub fn reject_promise(&mut self, promise: PromiseRef, reason: Value) {
        self.settle(promise, PromiseState::Rejected, reason);
    }

    pub fn promise_value(&self, promise: PromiseRef) -> Value {
        self.promises[promise.0 as usize].value.clone()
    }

    pub fn promise_state(&self, promise: PromiseRef) -> PromiseState {
        self.promises[promise.0 as usize].state
    }

    /// `.then(onFulfilled, onRejected)`: if already settled, schedules a
    /// microtask immediately; otherwise appends to the pending reaction
    /// list.
    pub fn promise_then(&mut self, promise: PromiseRef, on_fulfilled: Option<FunctionRef>, on_rejected: Option<FunctionRef>, result_capability: ObjectRef) {
        let data = &mut self.promises[promise.0 as usize];
        data.is_handled = true;
        match data.state {
            PromiseState::Pending => {
                data.fulfill_reactions.push(Reaction { handler: on_fulfilled, result_capability });
                data.reject_reactions.push(Reaction { handler: on_rejected, result_capability });
            }
            PromiseState::Fulfilled => {
                let value = data.value.clone();
                if let Some(handler) = on_fulfilled {
                    self.event_loop.schedule_microtask(handler, value);
                }
            }
            PromiseState::Rejected => {
                let value = data.value.clone();
                if let Some(handler) = on_rejected {
                    self.event_loop.schedule_microtask(handler, value);
                }
            }
        }
    }

    fn bind_promise_object(&mut self, obj: ObjectRef, promise: PromiseRef) {
        let key = crate::shape::PropertyKey::Interned(self.intern("__promise_slot"));
        self.define_own_data_property(obj, key, Value::Number(promise.0 as f64), crate::shape::Attributes::CONSTANT);
    }

    /// Recovers the [`PromiseRef`] backing a promise object, if `obj` is one.
    pub fn promise_ref_of(&mut self, obj: ObjectRef) -> Option<PromiseRef> {
        if self.objects[obj.0 as usize].kind != crate::object::ObjectKind::Promise {
            return None;
        }
        let key = crate::shape::PropertyKey::Interned(self.intern("__promise_slot"));
        match self.get_property(obj, key, Value::Object(obj)).ok()? {
            Value::Number(n) => Some(PromiseRef(n as u32)),
            _ => None,
        }
    }

    /// `await`. There is no stackful coroutine here,
    /// so a pending operand is settled by driving the event loop itself —
    /// draining microtasks and, if that doesn't move it, popping one
    /// macrotask at a time — rather than truly suspending this call and
    /// resuming it later (see DESIGN.md's Open Question on async bodies).
    /// A non-promise operand resolves immediately.
    pub fn await_promise(&mut self, value: Value) -> JsResult<Value> {
        let Value::Object(obj) = &value else { return Ok(value) };
        let Some(promise) = self.promise_ref_of(*obj) else { return Ok(value) };
        loop {
            match self.promise_state(promise) {
                PromiseState::Fulfilled => return Ok(self.promises[promise.0 as usize].value.clone()),
                PromiseState::Rejected => {
                    let reason = self.promises[promise.0 as usize].value.clone();
                    self.throw_exception(reason.clone());
                    return Err(self.take_exception().unwrap());
                }
                PromiseState::Pending => {
                    if self.event_loop.has_pending_microtasks() {
                        self.drain_microtasks();
                        continue;
                    }
                    if !self.pop_and_run_one_macrotask() {
                        // Nothing left that could ever settle this promise.
                        return Ok(Value::Undefined);
                    }
                }
            }
        }
    }

    fn pop_and_run_one_macrotask(&mut self) -> bool {
        let Some(task) = self.event_loop.pop_macrotask() else { return false };
        let _ = self.call(&Value::Function(task.callback), Value::Undefined, &[]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;

    #[test]
    fn resolving_a_settled_promise_is_a_noop() {
        let mut agent = Agent::new(EngineOptions::default());
        let (_, p) = agent.new_promise();
        agent.resolve_promise(p, Value::Number(1.0));
        agent.resolve_promise(p, Value::Number(2.0));
        match &agent.promises[p.0 as usize].value {
            Value::Number(n) => assert_eq!(*n, 1.0),
            _ => panic!("expected a number"),
        }
    }

    #[test]
    fn then_after_settlement_still_schedules_a_microtask() {
        let mut agent = Agent::new(EngineOptions::default());
        let (_, p) = agent.new_promise();
        agent.resolve_promise(p, Value::Number(5.0));
        fn handler(_agent: &mut Agent, _this: Value, args: &[Value]) -> crate::error::JsResult<Value> {
            Ok(args[0].clone())
        }
        let f = agent.new_native_function("h", 1, handler, Default::default());
        let capability = agent.new_object(None, crate::object::ObjectKind::Ordinary);
        agent.promise_then(p, Some(f), None, capability);
        assert!(agent.event_loop.has_pending_microtasks());
    }
}
