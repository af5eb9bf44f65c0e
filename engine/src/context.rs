// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `Agent`: the engine instance that owns every arena, and the
//! per-invocation `Context`/call-stack machinery above it.
//!
//! There is deliberately one `Agent` per engine instance and it is not
//! `Send` — the design is single-threaded cooperative end to end. Every other module's arena-indexed types (`ObjectRef`,
//! `FunctionRef`, `EnvironmentRef`, ...) are only meaningful relative to
//! the `Agent` that allocated them.

use ahash::AHashMap;

pub use crate::error::{JsError, JsResult};
use crate::error::{ErrorKind, StackFrame, StackTrace};
use crate::environment::{EnvironmentRecord, EnvironmentRef};
use crate::event_loop::EventLoop;
use crate::function::{FunctionData, FunctionFlags, FunctionRef};
use crate::object::{ObjectData, ObjectKind, ObjectRef};
use crate::profiler::{Profiler, Thresholds};
use crate::promise::PromiseData;
use crate::shape::ShapeTable;
use crate::value::Value;

/// Tunable defaults, pulled out into one place so tests can lower
/// thresholds and exercise tier promotion without recompiling.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub max_call_depth: u32,
    pub profiler_thresholds: Thresholds,
    pub jit_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions { max_call_depth: 1024, profiler_thresholds: Thresholds::default(), jit_enabled: true }
    }
}

/// One invocation's execution state. Frames live on
/// the `Agent`'s `Vec`-backed stack, not the host C stack, so the depth
/// guard can fire before the OS stack is at risk.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: Option<FunctionRef>,
    pub this_binding: Option<Value>,
    pub new_target: Option<Value>,
    pub variable_environment: EnvironmentRef,
    pub lexical_environment: EnvironmentRef,
    pub is_strict: bool,
    pub is_in_constructor_call: bool,
    pub super_called: bool,
}

pub struct Agent {
    pub(crate) objects: Vec<ObjectData>,
    pub(crate) functions: Vec<FunctionData>,
    pub(crate) environments: Vec<EnvironmentRecord>,
    pub(crate) shapes: ShapeTable,
    pub(crate) promises: Vec<PromiseData>,

    interner: AHashMap<String, u32>,
    interned_names: Vec<String>,

    call_stack: Vec<CallFrame>,
    /// Gates recursive entry independent of `call_stack`'s length: native
    /// functions recurse through `Agent::call` without ever pushing a
    /// `CallFrame`, so tracking depth separately is the only way to catch
    /// runaway native recursion.
    call_depth: u32,
    /// Call frames that still back a pending Promise callback are moved
    /// here at return instead of being dropped; released in bulk when the
    /// `Agent` itself is dropped.
    survivor_contexts: Vec<CallFrame>,

    exception: Option<JsError>,

    pub(crate) global_object: ObjectRef,
    pub(crate) object_prototype: ObjectRef,
    pub(crate) function_prototype: ObjectRef,
    pub(crate) generator_prototype: ObjectRef,
    /// The script goal symbol's variable/lexical environment (:
    /// "`var` lives in the enclosing variable environment (function or
    /// global)"). Created lazily on first use so an `Agent` that never
    /// runs a script doesn't pay for one; reused across every
    /// `run_program` call on the same `Agent` so a REPL's later
    /// statements see bindings an earlier one created.
    pub(crate) global_environment: Option<crate::environment::EnvironmentRef>,

    /// Stack of in-progress generator bodies' yield buffers. There is no stackful coroutine backing generators —
    /// a call to a generator function runs its whole body eagerly,
    /// recording each yielded value here, and `.next()` simply replays the
    /// buffer (see DESIGN.md's Open Question on generator suspension).
    pub(crate) yield_sinks: Vec<Vec<Value>>,

    pub profiler: Profiler,
    pub event_loop: EventLoop,
    pub options: EngineOptions,
}

impl Agent {
    pub fn new(options: EngineOptions) -> Self {
        let mut agent = Agent {
            objects: Vec::new(),
            functions: Vec::new(),
            environments: Vec::new(),
            shapes: ShapeTable::default(),
            promises: Vec::new(),
            interner: AHashMap::new(),
            interned_names: Vec::new(),
            call_stack: Vec::new(),
            call_depth: 0,
            survivor_contexts: Vec::new(),
            exception: None,
            global_object: ObjectRef(0),
            object_prototype: ObjectRef(0),
            function_prototype: ObjectRef(0),
            generator_prototype: ObjectRef(0),
            global_environment: None,
            yield_sinks: Vec::new(),
            profiler: Profiler::new(options.profiler_thresholds),
            event_loop: EventLoop::default(),
            options,
        };
        // Bootstrap order matters: object_prototype has no prototype of its
        // own; function_prototype's prototype is object_prototype; the
        // global object's prototype is object_prototype.
        let object_prototype = agent.raw_new_object(None, ObjectKind::Ordinary);
        agent.object_prototype = object_prototype;
        let function_prototype = agent.raw_new_object(Some(object_prototype), ObjectKind::Function);
        agent.function_prototype = function_prototype;
        let generator_prototype = agent.raw_new_object(Some(object_prototype), ObjectKind::Ordinary);
        agent.generator_prototype = generator_prototype;
        crate::interpreter::install_generator_next(&mut agent, generator_prototype);
        let global_object = agent.raw_new_object(Some(object_prototype), ObjectKind::Ordinary);
        agent.global_object = global_object;
        agent
    }

    pub fn generator_prototype(&self) -> ObjectRef {
        self.generator_prototype
    }

    /// The script goal symbol's environment, creating it on first access.
    /// `var`/function declarations at the top level of any script run on
    /// this `Agent` land here; a REPL or a test harness can
    /// read back top-level bindings (`get_binding`) after `run_program`.
    pub fn global_environment(&mut self) -> crate::environment::EnvironmentRef {
        if let Some(env) = self.global_environment {
            return env;
        }
        let env = self.new_environment(None, true);
        self.global_environment = Some(env);
        env
    }

    pub(crate) fn push_yield_sink(&mut self) {
        self.yield_sinks.push(Vec::new());
    }

    pub(crate) fn pop_yield_sink(&mut self) -> Vec<Value> {
        self.yield_sinks.pop().unwrap_or_default()
    }

    /// Records one yielded value in the innermost active generator body. A
    /// `yield` reached outside a generator call is a parser-level error the
    /// core does not need to defend against.
    pub(crate) fn record_yield(&mut self, value: Value) {
        if let Some(sink) = self.yield_sinks.last_mut() {
            sink.push(value);
        }
    }

    fn raw_new_object(&mut self, prototype: Option<ObjectRef>, kind: ObjectKind) -> ObjectRef {
        let id = ObjectRef(self.objects.len() as u32);
        self.objects.push(ObjectData::new(prototype, kind));
        id
    }

    pub fn new_object(&mut self, prototype: Option<ObjectRef>, kind: ObjectKind) -> ObjectRef {
        self.raw_new_object(prototype, kind)
    }

    pub fn new_array_from(&mut self, elements: Vec<Value>) -> ObjectRef {
        let arr = self.raw_new_object(Some(self.object_prototype), ObjectKind::Array);
        for (i, v) in elements.into_iter().enumerate() {
            self.array_push_element(arr, i as u32, v);
        }
        arr
    }

    pub fn global_object(&self) -> ObjectRef {
        self.global_object
    }

    pub fn object_prototype(&self) -> ObjectRef {
        self.object_prototype
    }

    pub fn function_prototype(&self) -> ObjectRef {
        self.function_prototype
    }

    /// String interning: property keys and identifier bindings are
    /// resolved to small integers so hot paths (shape lookup, environment
    /// lookup) stay `Copy`-cheap.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.interner.get(name) {
            return id;
        }
        let id = self.interned_names.len() as u32;
        self.interned_names.push(name.to_string());
        self.interner.insert(name.to_string(), id);
        id
    }

    pub fn resolve_interned(&self, id: u32) -> &str {
        &self.interned_names[id as usize]
    }

    /// Registers a built-in on the global object: `register_built_in_object(name, ObjectRef)`.
    pub fn register_built_in_object(&mut self, name: &str, value: Value) {
        let key = crate::shape::PropertyKey::Interned(self.intern(name));
        self.define_own_data_property(self.global_object, key, value, crate::shape::Attributes::USER);
    }

    // -- Exception channel -----------------------------

    pub fn throw(&mut self, kind: ErrorKind, message: &str) -> JsError {
        let error_obj = self.raw_new_object(Some(self.object_prototype), ObjectKind::Error);
        let message_key = crate::shape::PropertyKey::Interned(self.intern("message"));
        let name_key = crate::shape::PropertyKey::Interned(self.intern("name"));
        self.define_own_data_property(error_obj, message_key, Value::from_str(message), crate::shape::Attributes::USER);
        self.define_own_data_property(error_obj, name_key, Value::from_str(kind.name()), crate::shape::Attributes::USER);
        let stack = self.capture_stack_trace();
        let err = JsError::new(Value::Object(error_obj), stack);
        self.exception = Some(err.clone());
        err
    }

    pub fn throw_exception(&mut self, value: Value) {
        let stack = self.capture_stack_trace();
        self.exception = Some(JsError::new(value, stack));
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn clear_exception(&mut self) {
        self.exception = None;
    }

    pub fn take_exception(&mut self) -> Option<JsError> {
        self.exception.take()
    }

    fn capture_stack_trace(&self) -> StackTrace {
        let frames = self
            .call_stack
            .iter()
            .rev()
            .map(|frame| StackFrame {
                function_name: frame.function.and_then(|f| self.functions[f.0 as usize].name.clone()),
                file: None,
                line: 0,
                column: 0,
            })
            .collect();
        StackTrace(frames)
    }

    // -- Call stack ---------------------------------

    pub fn enter_call_guard(&mut self) -> JsResult<()> {
        if self.call_depth >= self.options.max_call_depth {
            return Err(self.throw(ErrorKind::Range, "call stack size exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call_guard(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub(crate) fn push_frame(&mut self, frame: CallFrame) -> JsResult<()> {
        self.call_stack.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) -> Option<CallFrame> {
        self.call_stack.pop()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    pub fn is_strict_mode(&self) -> bool {
        self.current_frame().map(|f| f.is_strict).unwrap_or(false)
    }

    pub fn get_this_binding(&self) -> Value {
        self.current_frame().and_then(|f| f.this_binding.clone()).unwrap_or(Value::Undefined)
    }

    pub fn set_return_value(&mut self, _value: Value) {
        // Return values flow back through `JsResult<Value>` in this
        // implementation rather than a frame slot; kept as a no-op entry
        // point so call sites that expect a context-level return slot
        // still have somewhere to call.
    }

    pub fn set_new_target(&mut self, value: Value) {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.new_target = Some(value);
        }
    }

    pub fn get_current_filename(&self) -> Option<crate::value::JsString> {
        None
    }

    /// Moves a call frame whose function context a pending Promise
    /// callback still needs into survivor storage instead of dropping it
    ///. There is no reclamation path — see DESIGN.md's
    /// Open Question #2.
    pub fn promote_to_survivor(&mut self, frame: CallFrame) {
        self.survivor_contexts.push(frame);
    }

    pub fn survivor_count(&self) -> usize {
        self.survivor_contexts.len()
    }

    // -- `to_primitive` hooks consumed by `Value` ----------

    pub(crate) fn get_method(&mut self, value: &Value, name: &str) -> JsResult<Option<Value>> {
        let obj = match value {
            Value::Object(o) => *o,
            Value::Function(_) => self.function_prototype,
            _ => return Ok(None),
        };
        let key = crate::shape::PropertyKey::Interned(self.intern(name));
        let method = self.get_property(obj, key, value.clone())?;
        match method {
            Value::Function(_) => Ok(Some(method)),
            _ => Ok(None),
        }
    }

    pub(crate) fn get_to_primitive_override(&mut self, _value: &Value) -> JsResult<Option<Value>> {
        // `Symbol.toPrimitive` is a built-ins-layer well-known symbol;
        // the core only needs the hook to exist. No built-in
        // library is registered by the core itself, so this is always
        // empty until a host registers one via `register_built_in_object`.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_depth_is_bounded() {
        let mut agent = Agent::new(EngineOptions { max_call_depth: 4, ..Default::default() });
        fn recurse(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
            let f = args[0].clone();
            agent.call(&f, this, args)
        }
        let f = agent.new_native_function("recurse", 1, recurse, FunctionFlags::default());
        let result = agent.call(&Value::Function(f), Value::Undefined, &[Value::Function(f)]);
        assert!(result.is_err());
    }

    #[test]
    fn interning_the_same_name_twice_returns_the_same_id() {
        let mut agent = Agent::new(EngineOptions::default());
        let a = agent.intern("foo");
        let b = agent.intern("foo");
        assert_eq!(a, b);
    }
}
