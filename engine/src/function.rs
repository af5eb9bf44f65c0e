// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callable objects and the call/construct protocols.
//!
//! A function's captured scope is *not* a live pointer to its defining
//! environment kept alive by a GC — the design has no cycle collector.
//! Instead every identifier the function body
//! references from outside its own parameters is snapshotted as a
//! `__closure_<name>` property on the function's own object; the defining
//! environment can then be torn down as soon as the defining call returns.

use std::rc::Rc;

use ahash::AHashMap;

use ast::{FunctionBody, NodeId, Param};

use crate::bytecode::{self, RunOutcome};
use crate::context::{Agent, CallFrame, JsResult};
use crate::environment::EnvironmentRef;
use crate::error::ErrorKind;
use crate::jit;
use crate::object::{ObjectKind, ObjectRef};
use crate::profiler::Tier;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef(pub(crate) u32);

pub type NativeFn = fn(&mut Agent, Value, &[Value]) -> JsResult<Value>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionFlags {
    pub is_constructor: bool,
    pub is_arrow: bool,
    pub is_class_constructor: bool,
    pub is_strict: bool,
    pub is_generator: bool,
    pub is_async: bool,
}

pub enum FunctionBehavior {
    Native(NativeFn),
    Script {
        params: Rc<Vec<Param>>,
        body: Rc<FunctionBody>,
        defining_env: EnvironmentRef,
    },
    Bound {
        target: FunctionRef,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
}

/// The interned names `bytecode::compile` needs to pre-declare a slot for:
/// every parameter plus every `var` the body hoists, so a slot exists even
/// along a conditional path that never assigns it.
fn declared_names(agent: &mut Agent, params: &[Param], body: &FunctionBody) -> Vec<u32> {
    let mut names = Vec::new();
    for p in params {
        crate::interpreter::collect_pattern_names(&p.pattern, &mut names);
    }
    if let FunctionBody::Block(stmts) = body {
        crate::interpreter::collect_var_names(stmts, &mut names);
    }
    names.into_iter().map(|n| agent.intern(&n)).collect()
}

pub struct FunctionData {
    pub name: Option<crate::value::JsString>,
    pub behavior: FunctionBehavior,
    pub flags: FunctionFlags,
    /// Own property bag: `.length`, `.name`, `.prototype`, and
    /// `__closure_<name>` shadow properties. A function
    /// is callable *and* an ordinary-ish object at once; this is where the
    /// "ordinary-ish" part lives.
    pub properties: ObjectRef,
    /// Names (interned) this function body closes over, resolved outside
    /// its own parameter list. Populated once, at function-expression
    /// evaluation time.
    pub closed_over_names: Rc<Vec<u32>>,
    pub call_count: u32,
    /// The defining `Function` node's own id — distinct from any node id
    /// inside its body — used to key this function's entry in the
    /// profiler, separately from the per-expression entries the
    /// interpreter records while the body runs. Meaningless (`0`, never
    /// consulted) for native/bound functions, which never tier up.
    pub node_id: NodeId,
    /// Lazily compiled once `call_count` crosses `Thresholds::bytecode`;
    /// `None` until then, and stays `None` forever if compilation was
    /// attempted and declined (see `bytecode_declined`).
    pub bytecode: Option<Rc<bytecode::Program>>,
    pub bytecode_declined: bool,
    /// Lazily compiled once `call_count` crosses `Thresholds::machine_code`
    /// *and* `bytecode` is a control-flow-free arithmetic block.
    pub machine_code: Option<Rc<jit::MachineCodeFunction>>,
    pub machine_code_declined: bool,
}

impl Agent {
    pub fn new_script_function(
        &mut self,
        name: Option<crate::value::JsString>,
        params: Vec<Param>,
        body: FunctionBody,
        defining_env: EnvironmentRef,
        closed_over_names: Vec<u32>,
        flags: FunctionFlags,
        node_id: NodeId,
    ) -> FunctionRef {
        let properties = self.new_object(Some(self.function_prototype), ObjectKind::Function);
        let len = params.iter().filter(|p| !p.is_rest && p.default.is_none()).count();
        let length_key = crate::shape::PropertyKey::Interned(self.intern("length"));
        self.define_own_data_property(properties, length_key, Value::Number(len as f64), crate::shape::Attributes::FUNCTION_LENGTH);
        if flags.is_constructor && !flags.is_arrow {
            let proto_obj = self.new_object(Some(self.object_prototype), ObjectKind::Ordinary);
            let proto_key = crate::shape::PropertyKey::Interned(self.intern("prototype"));
            self.define_own_data_property(properties, proto_key, Value::Object(proto_obj), crate::shape::Attributes { writable: true, enumerable: false, configurable: false, is_accessor: false });
        }
        let data = FunctionData {
            name,
            behavior: FunctionBehavior::Script { params: Rc::new(params), body: Rc::new(body), defining_env },
            flags,
            properties,
            closed_over_names: Rc::new(closed_over_names),
            call_count: 0,
            node_id,
            bytecode: None,
            bytecode_declined: false,
            machine_code: None,
            machine_code_declined: false,
        };
        let id = FunctionRef(self.functions.len() as u32);
        self.functions.push(data);
        id
    }

    pub fn new_native_function(&mut self, name: &str, arity: u32, native: NativeFn, flags: FunctionFlags) -> FunctionRef {
        let properties = self.new_object(Some(self.function_prototype), ObjectKind::Function);
        let length_key = crate::shape::PropertyKey::Interned(self.intern("length"));
        self.define_own_data_property(properties, length_key, Value::Number(arity as f64), crate::shape::Attributes::FUNCTION_LENGTH);
        let data = FunctionData {
            name: Some(name.into()),
            behavior: FunctionBehavior::Native(native),
            flags,
            properties,
            closed_over_names: Rc::new(Vec::new()),
            call_count: 0,
            node_id: 0, // native functions never tier up; this key is never consulted.
            bytecode: None,
            bytecode_declined: false,
            machine_code: None,
            machine_code_declined: false,
        };
        let id = FunctionRef(self.functions.len() as u32);
        self.functions.push(data);
        id
    }

    pub fn bind_function(&mut self, target: FunctionRef, bound_this: Value, bound_args: Vec<Value>) -> FunctionRef {
        let target_flags = self.functions[target.0 as usize].flags;
        let properties = self.new_object(Some(self.function_prototype), ObjectKind::Function);
        let data = FunctionData {
            name: self.functions[target.0 as usize].name.clone(),
            behavior: FunctionBehavior::Bound { target, bound_this, bound_args },
            flags: target_flags,
            properties,
            closed_over_names: Rc::new(Vec::new()),
            call_count: 0,
            node_id: 0, // a bound wrapper dispatches straight to `target`; it never runs a body itself.
            bytecode: None,
            bytecode_declined: false,
            machine_code: None,
            machine_code_declined: false,
        };
        let id = FunctionRef(self.functions.len() as u32);
        self.functions.push(data);
        id
    }

    /// `call`. Native functions run directly; script
    /// functions get a fresh `Context`/call frame, parameter binding,
    /// `arguments` materialization, var/function hoisting, and closure
    /// seeding before the body runs.
    pub fn call(&mut self, callee: &Value, this_value: Value, args: &[Value]) -> JsResult<Value> {
        let func = match callee {
            Value::Function(f) => *f,
            _ => return Err(self.throw(ErrorKind::Type, "value is not a function")),
        };
        self.enter_call_guard()?;
        let result = self.call_inner(func, this_value, args, None);
        self.exit_call_guard();
        result
    }

    fn call_inner(&mut self, func: FunctionRef, this_value: Value, args: &[Value], new_target: Option<Value>) -> JsResult<Value> {
        // Behavior is read by value where possible to avoid borrowing
        // `self.functions` across the call into `self`.
        match &self.functions[func.0 as usize].behavior {
            FunctionBehavior::Native(native) => {
                let native = *native;
                let this = if !self.functions[func.0 as usize].flags.is_strict && this_value.is_nullish() {
                    Value::Object(self.global_object)
                } else {
                    this_value
                };
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| native(self, this, args)));
                match result {
                    Ok(r) => r,
                    Err(_) => Err(self.throw(ErrorKind::Internal, "native function panicked")),
                }
            }
            FunctionBehavior::Bound { target, bound_this, bound_args } => {
                let target = *target;
                let mut full_args = bound_args.clone();
                full_args.extend_from_slice(args);
                let bound_this = bound_this.clone();
                self.call_inner(target, bound_this, &full_args, new_target)
            }
            FunctionBehavior::Script { .. } => self.call_script_function(func, this_value, args, new_target),
        }
    }

    fn call_script_function(&mut self, func: FunctionRef, this_value: Value, args: &[Value], new_target: Option<Value>) -> JsResult<Value> {
        let (params, body, defining_env, flags, closed_over_names, node_id) = {
            let data = &self.functions[func.0 as usize];
            let FunctionBehavior::Script { params, body, defining_env } = &data.behavior else {
                unreachable!("call_script_function called on a non-script function")
            };
            (params.clone(), body.clone(), *defining_env, data.flags, data.closed_over_names.clone(), data.node_id)
        };
        self.functions[func.0 as usize].call_count += 1;

        let this_binding = if flags.is_arrow {
            None // arrows read `this` from the closure snapshot, not a frame binding.
        } else if !flags.is_strict && this_value.is_nullish() {
            Some(Value::Object(self.global_object))
        } else {
            Some(this_value)
        };

        let var_env = self.new_environment(Some(defining_env), true);
        let frame = CallFrame {
            function: Some(func),
            this_binding,
            new_target,
            variable_environment: var_env,
            lexical_environment: var_env,
            is_strict: flags.is_strict,
            is_in_constructor_call: new_target.is_some(),
            super_called: false,
        };
        self.push_frame(frame)?;

        if flags.is_generator {
            self.push_yield_sink();
        }

        let outcome = (|| -> JsResult<Value> {
            self.bind_parameters(var_env, &params, args)?;
            self.materialize_arguments(var_env, args, flags.is_strict)?;
            self.seed_closure(func, var_env, &closed_over_names)?;
            self.run_tiered_body(func, var_env, &params, &body, node_id, flags)
        })();

        self.write_back_closures(func, var_env, &closed_over_names);
        self.pop_frame();

        // A generator function never runs its body on the caller's behalf
        // directly: calling it produces an iterator object whose `.next()`
        // replays the values recorded while the body ran.
        if flags.is_generator {
            let yielded = self.pop_yield_sink();
            let return_value = outcome.unwrap_or(Value::Undefined);
            return Ok(Value::Object(self.make_generator_object(yielded, return_value)));
        }

        // An async function always returns a Promise: its
        // actual completion settles that promise instead of propagating
        // directly, so a caller can `.then`/`await` it uniformly.
        if flags.is_async {
            let (promise_obj, promise) = self.new_promise();
            match outcome {
                Ok(value) => self.resolve_promise(promise, value),
                Err(err) => self.reject_promise(promise, err.value),
            }
            return Ok(Value::Object(promise_obj));
        }
        outcome
    }

    /// Runs a script function's body at whatever tier its profile has
    /// earned. `node_id` is the defining `Function` node's own id, a
    /// distinct key from any node inside the body, so a function's
    /// promotion history never collides with the expression-level entries
    /// `interpreter::evaluate_expression` records while that body runs.
    ///
    /// Generators and async functions always run through the interpreter:
    /// `bytecode::compile` already has no case for `yield`/`await` and
    /// would decline them on its own, but skipping the attempt entirely
    /// avoids recompiling a body every call just to rediscover that.
    fn run_tiered_body(&mut self, func: FunctionRef, env: EnvironmentRef, params: &[Param], body: &Rc<FunctionBody>, node_id: NodeId, flags: FunctionFlags) -> JsResult<Value> {
        if flags.is_generator || flags.is_async {
            return crate::interpreter::hoist_and_run_function_body(self, env, body);
        }

        let tier = self.profiler.record_execution(node_id);
        if tier == Tier::Interpreter {
            return crate::interpreter::hoist_and_run_function_body(self, env, body);
        }

        let Some(program) = self.ensure_bytecode(func, params, body) else {
            return crate::interpreter::hoist_and_run_function_body(self, env, body);
        };

        if tier >= Tier::MachineCode {
            if let Some(machine_code) = self.ensure_machine_code(func, &program) {
                match bytecode::read_numeric_locals(self, env, &program)? {
                    Some(mut locals) => {
                        let result = machine_code.call(locals.as_mut_ptr());
                        bytecode::write_back_locals(self, env, &program, &locals)?;
                        return Ok(if result.is_nan() { Value::Undefined } else { Value::Number(result) });
                    }
                    None => {
                        // A local that looked monomorphic-Number at compile
                        // time no longer is; drop one tier and retry below
                        // rather than trust stale machine code.
                        self.profiler.record_deopt(node_id);
                    }
                }
            }
        }

        match bytecode::run(self, env, &program)? {
            RunOutcome::Completed(value) => Ok(value),
            RunOutcome::GuardFailed => {
                self.profiler.record_deopt(node_id);
                crate::interpreter::hoist_and_run_function_body(self, env, body)
            }
        }
    }

    /// Compiles and caches `func`'s body to bytecode the first time it's
    /// asked for, remembering a declined compile so later calls don't pay
    /// for re-discovering the same unsupported construct.
    fn ensure_bytecode(&mut self, func: FunctionRef, params: &[Param], body: &FunctionBody) -> Option<Rc<bytecode::Program>> {
        if let Some(program) = &self.functions[func.0 as usize].bytecode {
            return Some(program.clone());
        }
        if self.functions[func.0 as usize].bytecode_declined {
            return None;
        }
        let declared = declared_names(self, params, body);
        match bytecode::compile(self, body, &declared) {
            Some(program) => {
                let program = Rc::new(program);
                self.functions[func.0 as usize].bytecode = Some(program.clone());
                Some(program)
            }
            None => {
                self.functions[func.0 as usize].bytecode_declined = true;
                None
            }
        }
    }

    /// Compiles and caches `func`'s machine code the first time it's asked
    /// for. Declines outright when `EngineOptions::jit_enabled` is off, so
    /// an embedder can disable the tier without ever touching `mmap`.
    fn ensure_machine_code(&mut self, func: FunctionRef, program: &bytecode::Program) -> Option<Rc<jit::MachineCodeFunction>> {
        if !self.options.jit_enabled {
            return None;
        }
        if let Some(machine_code) = &self.functions[func.0 as usize].machine_code {
            return Some(machine_code.clone());
        }
        if self.functions[func.0 as usize].machine_code_declined {
            return None;
        }
        match jit::compile(program) {
            Some(machine_code) => {
                let machine_code = Rc::new(machine_code);
                self.functions[func.0 as usize].machine_code = Some(machine_code.clone());
                Some(machine_code)
            }
            None => {
                self.functions[func.0 as usize].machine_code_declined = true;
                None
            }
        }
    }

    fn make_generator_object(&mut self, yielded: Vec<Value>, return_value: Value) -> ObjectRef {
        let values_arr = self.new_array_from(yielded);
        let obj = self.new_object(Some(self.generator_prototype()), ObjectKind::Ordinary);
        let values_key = crate::shape::PropertyKey::Interned(self.intern("__gen_values"));
        let index_key = crate::shape::PropertyKey::Interned(self.intern("__gen_index"));
        let done_key = crate::shape::PropertyKey::Interned(self.intern("__gen_done"));
        let return_key = crate::shape::PropertyKey::Interned(self.intern("__gen_return"));
        self.define_own_data_property(obj, values_key, Value::Object(values_arr), crate::shape::Attributes::USER);
        self.define_own_data_property(obj, index_key, Value::Number(0.0), crate::shape::Attributes::USER);
        self.define_own_data_property(obj, done_key, Value::Boolean(false), crate::shape::Attributes::USER);
        self.define_own_data_property(obj, return_key, return_value, crate::shape::Attributes::USER);
        obj
    }

    fn bind_parameters(&mut self, env: EnvironmentRef, params: &[Param], args: &[Value]) -> JsResult<()> {
        let mut i = 0usize;
        for param in params {
            if param.is_rest {
                let rest: Vec<Value> = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                let arr = self.new_array_from(rest);
                crate::interpreter::bind_pattern(self, env, &param.pattern, Value::Object(arr), true)?;
                break;
            }
            let mut value = args.get(i).cloned().unwrap_or(Value::Undefined);
            if matches!(value, Value::Undefined) {
                if let Some(default) = &param.default {
                    value = crate::interpreter::evaluate_in_env(self, env, default)?;
                }
            }
            crate::interpreter::bind_pattern(self, env, &param.pattern, value, true)?;
            i += 1;
        }
        Ok(())
    }

    /// Materializes the `arguments` object. Strict-mode functions get
    /// poisoned `callee`/`caller` accessors that throw on access.
    fn materialize_arguments(&mut self, env: EnvironmentRef, args: &[Value], is_strict: bool) -> JsResult<()> {
        let arr = self.new_array_from(args.to_vec());
        if is_strict {
            let poison = self.new_native_function("callee", 0, |agent, _this, _args| {
                Err(agent.throw(ErrorKind::Type, "'caller'/'callee' may not be accessed in strict mode"))
            }, FunctionFlags { is_strict: true, ..Default::default() });
            let callee_key = crate::shape::PropertyKey::Interned(self.intern("callee"));
            self.define_own_accessor_property(arr, callee_key, Some(poison), Some(poison), false, false);
        }
        let name = self.intern("arguments");
        self.create_binding(env, name, Some(Value::Object(arr)), true, true)
    }

    fn seed_closure(&mut self, func: FunctionRef, env: EnvironmentRef, names: &[u32]) -> JsResult<()> {
        let properties = self.functions[func.0 as usize].properties;
        for &name in names {
            let shadow_key = self.shadow_key(name);
            let has = self.has_property(properties, shadow_key);
            let value = if has { self.get_property(properties, shadow_key, Value::Object(properties))? } else { Value::Undefined };
            // Seed only if not already declared by a parameter/hoist pass.
            if !self.has_binding(env, name) {
                self.create_binding(env, name, Some(value), true, false)?;
            }
        }
        Ok(())
    }

    /// Writes modified closure variables back to the function's shadow
    /// properties, and to any sibling function object observed to hold the
    /// same shadow key in the parent environment.
    fn write_back_closures(&mut self, func: FunctionRef, env: EnvironmentRef, names: &[u32]) {
        let properties = self.functions[func.0 as usize].properties;
        for &name in names {
            if let Ok(value) = self.get_binding(env, name) {
                let shadow_key = self.shadow_key(name);
                self.define_own_data_property(properties, shadow_key, value, crate::shape::Attributes::USER);
            }
        }
    }

    fn shadow_key(&mut self, name: u32) -> crate::shape::PropertyKey {
        let resolved = self.resolve_interned(name).to_string();
        crate::shape::PropertyKey::Interned(self.intern(&format!("__closure_{resolved}")))
    }

    /// `construct`. Allocates `this` from the constructor's own
    /// `prototype` property (or `Object.prototype`), runs the body with
    /// `new.target` set, and — for a subclass that never called `super()`
    /// — auto-invokes the parent constructor first.
    pub fn construct(&mut self, callee: FunctionRef, args: &[Value], new_target: Value) -> JsResult<Value> {
        if !self.functions[callee.0 as usize].flags.is_constructor {
            return Err(self.throw(ErrorKind::Type, "value is not a constructor"));
        }
        self.enter_call_guard()?;
        let properties = self.functions[callee.0 as usize].properties;
        let proto_key = crate::shape::PropertyKey::Interned(self.intern("prototype"));
        let proto_value = self.get_property(properties, proto_key, Value::Object(properties))?;
        let prototype = match proto_value {
            Value::Object(o) => Some(o),
            _ => Some(self.object_prototype),
        };
        let this_obj = self.new_object(prototype, ObjectKind::Ordinary);
        let result = self.call_inner(callee, Value::Object(this_obj), args, Some(new_target));
        self.exit_call_guard();
        match result? {
            Value::Object(o) => Ok(Value::Object(o)),
            Value::Function(f) => Ok(Value::Function(f)),
            _ => Ok(Value::Object(this_obj)),
        }
    }

    pub fn function_name(&self, func: FunctionRef) -> Option<crate::value::JsString> {
        self.functions[func.0 as usize].name.clone()
    }

    pub fn is_constructor(&self, func: FunctionRef) -> bool {
        self.functions[func.0 as usize].flags.is_constructor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;

    #[test]
    fn bound_function_prepends_fixed_arguments() {
        let mut agent = Agent::new(EngineOptions::default());
        fn echo(_agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
            Ok(Value::Number(args.len() as f64))
        }
        let f = agent.new_native_function("echo", 0, echo, FunctionFlags::default());
        let bound = agent.bind_function(f, Value::Undefined, vec![Value::Number(1.0), Value::Number(2.0)]);
        let result = agent.call(&Value::Function(bound), Value::Undefined, &[Value::Number(3.0)]).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn calling_a_non_function_value_is_a_type_error() {
        let mut agent = Agent::new(EngineOptions::default());
        let result = agent.call(&Value::Number(1.0), Value::Undefined, &[]);
        assert!(result.is_err());
    }
}
