// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-threaded cooperative scheduler.
//!
//! Microtasks (promise reactions) always drain to exhaustion before the
//! next macrotask runs; scheduling a microtask from within a microtask
//! extends the current drain rather than queuing for "later".

use std::collections::VecDeque;

use crate::context::Agent;
use crate::function::FunctionRef;
use crate::value::Value;

pub struct Microtask {
    pub callback: FunctionRef,
    pub argument: Value,
}

pub struct Macrotask {
    pub callback: FunctionRef,
}

#[derive(Default)]
pub struct EventLoop {
    microtasks: VecDeque<Microtask>,
    macrotasks: VecDeque<Macrotask>,
    running: bool,
}

impl EventLoop {
    pub fn schedule_microtask(&mut self, callback: FunctionRef, argument: Value) {
        self.microtasks.push_back(Microtask { callback, argument });
    }

    pub fn schedule_macrotask(&mut self, callback: FunctionRef) {
        self.macrotasks.push_back(Macrotask { callback });
    }

    pub fn has_pending_microtasks(&self) -> bool {
        !self.microtasks.is_empty()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.microtasks.is_empty() || !self.macrotasks.is_empty()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub(crate) fn pop_macrotask(&mut self) -> Option<Macrotask> {
        self.macrotasks.pop_front()
    }
}

impl Agent {
    /// Drains the microtask queue to exhaustion. Because a reaction can
    /// itself schedule more microtasks, this always re-checks the queue
    /// rather than snapshotting its length up front.
    pub fn drain_microtasks(&mut self) {
        while let Some(task) = self.event_loop.microtasks.pop_front() {
            let _ = self.call(&Value::Function(task.callback), Value::Undefined, &[task.argument]);
        }
    }

    /// `run()`: alternates between a full microtask drain and
    /// pulling one macrotask, until both queues are empty or `stop()` was
    /// called.
    pub fn run_event_loop(&mut self) {
        self.event_loop.running = true;
        loop {
            self.drain_microtasks();
            if !self.event_loop.running {
                break;
            }
            let Some(task) = self.event_loop.macrotasks.pop_front() else { break };
            let _ = self.call(&Value::Function(task.callback), Value::Undefined, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;
    use crate::function::FunctionFlags;
    use crate::error::JsResult;
    use std::cell::RefCell;

    thread_local! {
        static LOG: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    }

    fn push_micro(_agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
        LOG.with(|l| l.borrow_mut().push("micro"));
        Ok(Value::Undefined)
    }
    fn push_macro(_agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
        LOG.with(|l| l.borrow_mut().push("macro"));
        Ok(Value::Undefined)
    }

    #[test]
    fn microtasks_run_before_macrotasks() {
        LOG.with(|l| l.borrow_mut().clear());
        let mut agent = Agent::new(EngineOptions::default());
        let micro = agent.new_native_function("micro", 0, push_micro, FunctionFlags::default());
        let macro_ = agent.new_native_function("macro", 0, push_macro, FunctionFlags::default());
        agent.event_loop.schedule_macrotask(macro_);
        agent.event_loop.schedule_microtask(micro, Value::Undefined);
        agent.run_event_loop();
        LOG.with(|l| assert_eq!(*l.borrow(), vec!["micro", "macro"]));
    }
}
