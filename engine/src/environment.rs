// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lexical scope chains.
//!
//! Two parallel chains are threaded through every call: a *variable
//! environment* that receives hoisted `var`/function bindings, and a
//! *lexical environment* for `let`/`const`/block scope. Both are made of
//! the same [`EnvironmentRecord`] building block; which chain a given
//! record belongs to is purely a matter of which pointer the `Context`
//! stores it under.

use ahash::AHashMap;

use crate::context::{Agent, JsResult};
use crate::error::ErrorKind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvironmentRef(pub(crate) u32);

#[derive(Debug, Clone)]
pub struct Binding {
    /// `None` signals the temporal dead zone: the binding exists (for
    /// `has_binding`) but reading it is a ReferenceError until the
    /// declarator's initializer runs.
    pub value: Option<Value>,
    pub mutable: bool,
    pub var_hoisted: bool,
}

#[derive(Debug)]
pub struct EnvironmentRecord {
    pub parent: Option<EnvironmentRef>,
    pub bindings: AHashMap<u32, Binding>,
    /// `with`-like constructs are out of scope; every
    /// environment here is declarative.
    pub is_function_scope: bool,
}

impl Agent {
    pub fn new_environment(&mut self, parent: Option<EnvironmentRef>, is_function_scope: bool) -> EnvironmentRef {
        let id = EnvironmentRef(self.environments.len() as u32);
        self.environments.push(EnvironmentRecord { parent, bindings: AHashMap::new(), is_function_scope });
        id
    }

    /// Declares a binding left uninitialized (TDZ) for `let`/`const`, or
    /// immediately initialized for `var` and function hoisting.
    pub fn create_binding(&mut self, env: EnvironmentRef, name: u32, initial: Option<Value>, mutable: bool, var_hoisted: bool) -> JsResult<()> {
        let record = &mut self.environments[env.0 as usize];
        if record.bindings.contains_key(&name) && !var_hoisted {
            return Err(self.throw(ErrorKind::Syntax, "identifier has already been declared"));
        }
        record.bindings.entry(name).or_insert(Binding { value: initial, mutable, var_hoisted });
        if let Some(v) = initial {
            if let Some(b) = self.environments[env.0 as usize].bindings.get_mut(&name) {
                b.value = Some(v);
            }
        }
        Ok(())
    }

    pub fn has_binding(&self, env: EnvironmentRef, name: u32) -> bool {
        self.environments[env.0 as usize].bindings.contains_key(&name)
    }

    /// Reads a binding in this environment only (no chain walk); used by
    /// `get_binding` once the declaring environment has been found.
    fn read_own_binding(&mut self, env: EnvironmentRef, name: u32) -> JsResult<Value> {
        let binding = self.environments[env.0 as usize].bindings.get(&name).unwrap();
        match &binding.value {
            Some(v) => Ok(v.clone()),
            None => Err(self.throw(ErrorKind::Reference, "cannot access binding before initialization")),
        }
    }

    /// Walks `env`'s parent chain looking up `name`; ReferenceError in
    /// strict mode (or always, for an explicit reference lookup) if the
    /// chain ends without a match.
    pub fn get_binding(&mut self, env: EnvironmentRef, name: u32) -> JsResult<Value> {
        let mut current = Some(env);
        while let Some(e) = current {
            if self.has_binding(e, name) {
                return self.read_own_binding(e, name);
            }
            current = self.environments[e.0 as usize].parent;
        }
        Err(self.throw(ErrorKind::Reference, "identifier is not defined"))
    }

    /// Like `get_binding` but returns `Undefined` on an unbound-name miss
    /// instead of throwing, for non-strict identifier reads. A TDZ access still throws: the name *is* bound, just
    /// not yet initialized.
    pub fn get_binding_sloppy(&mut self, env: EnvironmentRef, name: u32) -> JsResult<Value> {
        let mut current = Some(env);
        while let Some(e) = current {
            if self.has_binding(e, name) {
                return self.read_own_binding(e, name);
            }
            current = self.environments[e.0 as usize].parent;
        }
        Ok(Value::Undefined)
    }

    pub fn set_binding(&mut self, env: EnvironmentRef, name: u32, value: Value, strict: bool) -> JsResult<()> {
        let mut current = Some(env);
        while let Some(e) = current {
            if self.has_binding(e, name) {
                let binding = self.environments[e.0 as usize].bindings.get_mut(&name).unwrap();
                if binding.value.is_none() {
                    return Err(self.throw(ErrorKind::Reference, "cannot access binding before initialization"));
                }
                if !binding.mutable {
                    return Err(self.throw(ErrorKind::Type, "assignment to constant variable"));
                }
                binding.value = Some(value);
                return Ok(());
            }
            current = self.environments[e.0 as usize].parent;
        }
        if strict {
            Err(self.throw(ErrorKind::Reference, "identifier is not defined"))
        } else {
            // Sloppy-mode implicit global creation: create on the outermost
            // (global) environment of the chain.
            let mut outer = env;
            while let Some(p) = self.environments[outer.0 as usize].parent {
                outer = p;
            }
            self.create_binding(outer, name, Some(value), true, true)
        }
    }

    pub fn delete_binding(&mut self, env: EnvironmentRef, name: u32) -> bool {
        self.environments[env.0 as usize].bindings.remove(&name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Agent, EngineOptions};

    #[test]
    fn tdz_read_before_initializer_is_reference_error() {
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, false);
        let name = agent.intern("x");
        agent.create_binding(env, name, None, true, false).unwrap();
        let result = agent.get_binding(env, name);
        assert!(result.is_err());
    }

    #[test]
    fn writing_a_const_binding_is_a_type_error() {
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, false);
        let name = agent.intern("x");
        agent.create_binding(env, name, Some(Value::Number(1.0)), false, false).unwrap();
        let result = agent.set_binding(env, name, Value::Number(2.0), true);
        assert!(result.is_err());
    }

    #[test]
    fn lookup_walks_to_parent_environment() {
        let mut agent = Agent::new(EngineOptions::default());
        let parent = agent.new_environment(None, false);
        let name = agent.intern("x");
        agent.create_binding(parent, name, Some(Value::Number(42.0)), true, false).unwrap();
        let child = agent.new_environment(Some(parent), false);
        let value = agent.get_binding(child, name).unwrap();
        assert!(matches!(value, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn redeclaring_a_non_var_binding_in_the_same_scope_fails() {
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, false);
        let name = agent.intern("x");
        agent.create_binding(env, name, Some(Value::Undefined), true, false).unwrap();
        let result = agent.create_binding(env, name, Some(Value::Undefined), true, false);
        assert!(result.is_err());
    }
}
