// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tree-walking evaluator.
//!
//! This is the baseline tier every function starts in; the profiler
//! (`crate::profiler`) watches the node ids this module evaluates and
//! `function.rs::call_script_function` promotes hot functions to
//! bytecode/JIT based on it. `Profiler::record_execution` is called from
//! the single chokepoint in `evaluate_expression` that dispatches on
//! `Expression`, so every tier sees the same node-id traffic regardless of
//! which one is actually running. Once a binary expression's own node has
//! been promoted past the interpreter tier, `evaluate_binary` starts
//! feeding it type feedback (`Profiler::feedback_mut`) — the same
//! monomorphic-Number signal a hot function's bytecode/JIT compile relies
//! on staying accurate.

use std::collections::HashSet;

use num_traits::Zero;

use ast::{
    ArrayPattern, AssignmentExpression, AssignmentOperator, AssignmentTarget, BinaryExpression, BinaryOperator, BindingPattern, Class, ClassMemberKind, Expression, ForHead, ForInit, Function,
    FunctionBody, LogicalOperator, MemberExpression, MemberProperty, ObjectPattern, ObjectProperty, Program, PropertyKeyExpr, Statement, UnaryOperator, UpdateOperator, VariableDeclaration,
    VariableKind,
};

use crate::context::{Agent, JsResult};
use crate::environment::EnvironmentRef;
use crate::error::ErrorKind;
use crate::function::{FunctionFlags, FunctionRef};
use crate::object::{ObjectKind, ObjectRef};
use crate::profiler::Tier;
use crate::shape::{Attributes, PropertyKey};
use crate::value::{PrimitiveHint, Value};

/// The result of running a statement: either it fell through normally, or
/// it's unwinding toward an enclosing construct.
pub enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

// ---------------------------------------------------------------------
// Small field-access helpers
// ---------------------------------------------------------------------
//
// A handful of things here read/write arena fields directly rather than
// through an `Agent` method, since nothing outside `object.rs`/`function.rs`
// otherwise needs them — adding a public accessor there for one call site
// here would just move the same line of code.

/// Parses a BigInt literal's digit text (as lexed by `parser`, minus the
/// trailing `n`) into an arbitrary-precision integer. Hex literals carry a
/// `0x` prefix the lexer leaves intact.
fn parse_bigint_literal(digits: &str) -> num_bigint::BigInt {
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        return num_bigint::BigInt::parse_bytes(hex.as_bytes(), 16).unwrap_or_default();
    }
    digits.parse().unwrap_or_default()
}

fn array_length(agent: &Agent, obj: ObjectRef) -> u32 {
    agent.array_length(obj)
}

fn prototype_of(agent: &Agent, obj: ObjectRef) -> Option<ObjectRef> {
    agent.objects[obj.0 as usize].prototype
}

fn set_prototype_of(agent: &mut Agent, obj: ObjectRef, prototype: Option<ObjectRef>) {
    agent.objects[obj.0 as usize].prototype = prototype;
}

fn function_properties(agent: &Agent, f: FunctionRef) -> ObjectRef {
    agent.functions[f.0 as usize].properties
}

fn has_binding_in_chain(agent: &Agent, env: EnvironmentRef, name: u32) -> bool {
    let mut current = Some(env);
    while let Some(e) = current {
        if agent.has_binding(e, name) {
            return true;
        }
        current = agent.environments[e.0 as usize].parent;
    }
    false
}

// ---------------------------------------------------------------------
// Entry points consumed by `function.rs`
// ---------------------------------------------------------------------

/// Runs a function body to completion: hoists `var`/function declarations
/// into `env` first, then executes statement by
/// statement. An arrow function's expression body is just evaluated
/// directly and returned.
pub fn hoist_and_run_function_body(agent: &mut Agent, env: EnvironmentRef, body: &FunctionBody) -> JsResult<Value> {
    match body {
        FunctionBody::Expression(expr) => evaluate_expression(agent, env, expr),
        FunctionBody::Block(stmts) => {
            hoist_declarations(agent, env, stmts, true)?;
            match execute_statements(agent, env, stmts)? {
                Completion::Return(v) => Ok(v),
                _ => Ok(Value::Undefined),
            }
        }
    }
}

/// Runs a top-level script. The
/// script gets a fresh global variable/lexical environment chained
/// directly off the global object — there is no enclosing function frame,
/// so `var`s and function declarations become bindings visible to any
/// later top-level statement or `eval`-like re-entry in the same `Agent`.
pub fn run_program(agent: &mut Agent, program: &Program) -> JsResult<Value> {
    let global_env = agent.global_environment();
    let frame = crate::context::CallFrame {
        function: None,
        this_binding: Some(Value::Object(agent.global_object())),
        new_target: None,
        variable_environment: global_env,
        lexical_environment: global_env,
        is_strict: program.is_strict,
        is_in_constructor_call: false,
        super_called: false,
    };
    agent.push_frame(frame)?;
    let outcome = (|| -> JsResult<Value> {
        hoist_declarations(agent, global_env, &program.body, true)?;
        match execute_statements(agent, global_env, &program.body)? {
            Completion::Return(v) => Ok(v),
            _ => Ok(Value::Undefined),
        }
    })();
    agent.pop_frame();
    outcome
}

/// Evaluates `expr` against `env` as the current lexical environment
/// (used for parameter default values, which run in the function's own
/// scope before the body proper — step 3).
pub fn evaluate_in_env(agent: &mut Agent, env: EnvironmentRef, expr: &Expression) -> JsResult<Value> {
    evaluate_expression(agent, env, expr)
}

/// Destructures `value` against `pattern`, declaring each bound name in
/// `env`. `mutable` controls whether the
/// resulting bindings can later be reassigned (`let`/parameters: `true`;
/// `const`: `false`).
pub fn bind_pattern(agent: &mut Agent, env: EnvironmentRef, pattern: &BindingPattern, value: Value, mutable: bool) -> JsResult<()> {
    match pattern {
        BindingPattern::Identifier(name) => {
            let id = agent.intern(name);
            agent.create_binding(env, id, Some(value), mutable, false)
        }
        BindingPattern::Assignment(inner, default) => {
            let value = if matches!(value, Value::Undefined) { evaluate_expression(agent, env, default)? } else { value };
            bind_pattern(agent, env, inner, value, mutable)
        }
        BindingPattern::Rest(inner) => bind_pattern(agent, env, inner, value, mutable),
        BindingPattern::Array(array_pattern) => bind_array_pattern(agent, env, array_pattern, value, mutable),
        BindingPattern::Object(object_pattern) => bind_object_pattern(agent, env, object_pattern, value, mutable),
    }
}

fn bind_array_pattern(agent: &mut Agent, env: EnvironmentRef, pattern: &ArrayPattern, value: Value, mutable: bool) -> JsResult<()> {
    let items = iterate_to_vec(agent, value)?;
    for (i, element) in pattern.elements.iter().enumerate() {
        let Some(element) = element else { continue };
        if let BindingPattern::Rest(inner) = element {
            let rest: Vec<Value> = items.get(i..).map(|s| s.to_vec()).unwrap_or_default();
            let arr = agent.new_array_from(rest);
            bind_pattern(agent, env, inner, Value::Object(arr), mutable)?;
            break;
        }
        let item = items.get(i).cloned().unwrap_or(Value::Undefined);
        bind_pattern(agent, env, element, item, mutable)?;
    }
    Ok(())
}

fn bind_object_pattern(agent: &mut Agent, env: EnvironmentRef, pattern: &ObjectPattern, value: Value, mutable: bool) -> JsResult<()> {
    let mut taken: Vec<PropertyKey> = Vec::new();
    for (key_expr, sub_pattern) in &pattern.properties {
        let key = evaluate_property_key(agent, env, key_expr)?;
        taken.push(key);
        let item = read_property_value(agent, &value, key)?;
        bind_pattern(agent, env, sub_pattern, item, mutable)?;
    }
    if let Some(rest) = &pattern.rest {
        let rest_obj = agent.new_object(Some(agent.object_prototype()), ObjectKind::Ordinary);
        if let Value::Object(src) = &value {
            for key in agent.own_property_keys(*src) {
                if taken.contains(&key) {
                    continue;
                }
                let v = agent.get_property(*src, key, value.clone())?;
                agent.define_own_data_property(rest_obj, key, v, Attributes::USER);
            }
        }
        bind_pattern(agent, env, rest, Value::Object(rest_obj), mutable)?;
    }
    Ok(())
}

fn read_property_value(agent: &mut Agent, value: &Value, key: PropertyKey) -> JsResult<Value> {
    match value {
        Value::Object(o) => {
            if let Some(length) = agent.array_length_get(*o, key) {
                return Ok(length);
            }
            agent.get_property(*o, key, value.clone())
        }
        Value::Function(f) => {
            let properties = function_properties(agent, *f);
            agent.get_property(properties, key, value.clone())
        }
        Value::String(s) => {
            if let PropertyKey::Index(i) = key {
                return Ok(s.chars().nth(i as usize).map(|c| Value::from_str(c.to_string())).unwrap_or(Value::Undefined));
            }
            Ok(Value::Undefined)
        }
        _ => Ok(Value::Undefined),
    }
}

/// Best-effort "iterable to Vec" used by array destructuring and
/// spread/for-of. Only arrays and strings are iterable in the core (full
/// `Symbol.iterator` protocol is a built-ins concern,).
fn iterate_to_vec(agent: &mut Agent, value: Value) -> JsResult<Vec<Value>> {
    match &value {
        Value::Object(o) => {
            let len = array_length(agent, *o);
            let mut out = Vec::with_capacity(len as usize);
            for i in 0..len {
                out.push(agent.get_property(*o, PropertyKey::Index(i), value.clone())?);
            }
            Ok(out)
        }
        Value::String(s) => Ok(s.chars().map(|c| Value::from_str(c.to_string())).collect()),
        _ => Err(agent.throw(ErrorKind::Type, "value is not iterable")),
    }
}

// ---------------------------------------------------------------------
// Hoisting
// ---------------------------------------------------------------------

/// Pre-scans `stmts` for `var` declarations and (when `is_function_scope`)
/// top-level function declarations, binding them up front. Nested function
/// bodies are not descended into; block-scoped `let`/`const` are bound when
/// their own statement runs, not here.
fn hoist_declarations(agent: &mut Agent, env: EnvironmentRef, stmts: &[Statement], is_function_scope: bool) -> JsResult<()> {
    let mut var_names = Vec::new();
    collect_var_names(stmts, &mut var_names);
    for name in var_names {
        let id = agent.intern(&name);
        if !agent.has_binding(env, id) {
            agent.create_binding(env, id, Some(Value::Undefined), true, true)?;
        }
    }
    if is_function_scope {
        for stmt in stmts {
            if let Statement::FunctionDeclaration(func) = stmt {
                if let Some(name) = &func.name {
                    let value = evaluate_function_expression(agent, env, func)?;
                    let id = agent.intern(name);
                    agent.create_binding(env, id, Some(value), true, true)?;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn collect_var_names(stmts: &[Statement], out: &mut Vec<String>) {
    for stmt in stmts {
        collect_var_names_stmt(stmt, out);
    }
}

fn collect_var_names_stmt(stmt: &Statement, out: &mut Vec<String>) {
    match stmt {
        Statement::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
            for d in &decl.declarations {
                collect_pattern_names(&d.id, out);
            }
        }
        Statement::Block(b) => collect_var_names(&b.body, out),
        Statement::If(s) => {
            collect_var_names_stmt(&s.consequent, out);
            if let Some(alt) = &s.alternate {
                collect_var_names_stmt(alt, out);
            }
        }
        Statement::While(s) => collect_var_names_stmt(&s.body, out),
        Statement::DoWhile(s) => collect_var_names_stmt(&s.body, out),
        Statement::For(s) => {
            if let Some(ForInit::VariableDeclaration(decl)) = &s.init {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        collect_pattern_names(&d.id, out);
                    }
                }
            }
            collect_var_names_stmt(&s.body, out);
        }
        Statement::ForIn(s) => {
            if let ForHead::VariableDeclaration(decl) = &s.left {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        collect_pattern_names(&d.id, out);
                    }
                }
            }
            collect_var_names_stmt(&s.body, out);
        }
        Statement::ForOf(s) => {
            if let ForHead::VariableDeclaration(decl) = &s.left {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        collect_pattern_names(&d.id, out);
                    }
                }
            }
            collect_var_names_stmt(&s.body, out);
        }
        Statement::Try(s) => {
            collect_var_names(&s.block.body, out);
            if let Some(h) = &s.handler {
                collect_var_names(&h.body.body, out);
            }
            if let Some(f) = &s.finalizer {
                collect_var_names(&f.body, out);
            }
        }
        Statement::Switch(s) => {
            for case in &s.cases {
                collect_var_names(&case.consequent, out);
            }
        }
        Statement::Labeled(s) => collect_var_names_stmt(&s.body, out),
        _ => {}
    }
}

pub(crate) fn collect_pattern_names(pattern: &BindingPattern, out: &mut Vec<String>) {
    match pattern {
        BindingPattern::Identifier(name) => out.push(name.clone()),
        BindingPattern::Assignment(inner, _) => collect_pattern_names(inner, out),
        BindingPattern::Rest(inner) => collect_pattern_names(inner, out),
        BindingPattern::Array(a) => {
            for el in a.elements.iter().flatten() {
                collect_pattern_names(el, out);
            }
        }
        BindingPattern::Object(o) => {
            for (_, p) in &o.properties {
                collect_pattern_names(p, out);
            }
            if let Some(rest) = &o.rest {
                collect_pattern_names(rest, out);
            }
        }
    }
}

// ---------------------------------------------------------------------
// Statement execution
// ---------------------------------------------------------------------

fn execute_statements(agent: &mut Agent, env: EnvironmentRef, stmts: &[Statement]) -> JsResult<Completion> {
    for stmt in stmts {
        match execute_statement(agent, env, stmt)? {
            Completion::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn execute_statement(agent: &mut Agent, env: EnvironmentRef, stmt: &Statement) -> JsResult<Completion> {
    match stmt {
        Statement::Empty(_) | Statement::Debugger(_) => Ok(Completion::Normal),
        Statement::ExpressionStatement(s) => {
            evaluate_expression(agent, env, &s.expression)?;
            Ok(Completion::Normal)
        }
        Statement::Block(b) => {
            let block_env = agent.new_environment(Some(env), false);
            hoist_block_lets(agent, block_env, &b.body)?;
            execute_statements(agent, block_env, &b.body)
        }
        Statement::VariableDeclaration(decl) => execute_variable_declaration(agent, env, decl),
        Statement::FunctionDeclaration(_) => Ok(Completion::Normal), // already hoisted
        Statement::ClassDeclaration(class) => {
            let value = evaluate_class_expression(agent, env, class)?;
            if let Some(name) = &class.name {
                let id = agent.intern(name);
                agent.create_binding(env, id, Some(value), true, false)?;
            }
            Ok(Completion::Normal)
        }
        Statement::If(s) => {
            if evaluate_expression(agent, env, &s.test)?.to_boolean() {
                execute_statement(agent, env, &s.consequent)
            } else if let Some(alt) = &s.alternate {
                execute_statement(agent, env, alt)
            } else {
                Ok(Completion::Normal)
            }
        }
        Statement::While(s) => {
            while evaluate_expression(agent, env, &s.test)?.to_boolean() {
                match execute_statement(agent, env, &s.body)? {
                    Completion::Break(None) => break,
                    Completion::Continue(None) => continue,
                    Completion::Normal => {}
                    other @ (Completion::Return(_) | Completion::Break(_) | Completion::Continue(_)) => return Ok(other),
                }
            }
            Ok(Completion::Normal)
        }
        Statement::DoWhile(s) => {
            loop {
                match execute_statement(agent, env, &s.body)? {
                    Completion::Break(None) => break,
                    Completion::Continue(None) => {}
                    Completion::Normal => {}
                    other @ (Completion::Return(_) | Completion::Break(_) | Completion::Continue(_)) => return Ok(other),
                }
                if !evaluate_expression(agent, env, &s.test)?.to_boolean() {
                    break;
                }
            }
            Ok(Completion::Normal)
        }
        Statement::For(s) => execute_for(agent, env, s),
        Statement::ForIn(s) => execute_for_in(agent, env, s),
        Statement::ForOf(s) => execute_for_of(agent, env, s),
        Statement::Return(s) => {
            let value = match &s.argument {
                Some(expr) => evaluate_expression(agent, env, expr)?,
                None => Value::Undefined,
            };
            Ok(Completion::Return(value))
        }
        Statement::Break(s) => Ok(Completion::Break(s.label.clone())),
        Statement::Continue(s) => Ok(Completion::Continue(s.label.clone())),
        Statement::Throw(s) => {
            let value = evaluate_expression(agent, env, &s.argument)?;
            agent.throw_exception(value);
            Err(agent.take_exception().unwrap())
        }
        Statement::Try(s) => execute_try(agent, env, s),
        Statement::Switch(s) => execute_switch(agent, env, s),
        Statement::Labeled(s) => match execute_statement(agent, env, &s.body)? {
            Completion::Break(Some(label)) if label == s.label => Ok(Completion::Normal),
            Completion::Continue(Some(label)) if label == s.label => Ok(Completion::Normal),
            other => Ok(other),
        },
    }
}

/// `let`/`const` declared directly in a block are bound (TDZ) up front so
/// forward-reference detection works the same way hoisted `var`s do, but
/// without giving them a value until their declarator actually runs.
fn hoist_block_lets(agent: &mut Agent, env: EnvironmentRef, stmts: &[Statement]) -> JsResult<()> {
    for stmt in stmts {
        if let Statement::VariableDeclaration(decl) = stmt {
            if decl.kind != VariableKind::Var {
                declare_tdz_bindings(agent, env, decl)?;
            }
        }
        if let Statement::FunctionDeclaration(func) = stmt {
            if let Some(name) = &func.name {
                let value = evaluate_function_expression(agent, env, func)?;
                let id = agent.intern(name);
                agent.create_binding(env, id, Some(value), true, true)?;
            }
        }
    }
    Ok(())
}

fn declare_tdz_bindings(agent: &mut Agent, env: EnvironmentRef, decl: &VariableDeclaration) -> JsResult<()> {
    for d in &decl.declarations {
        let mut names = Vec::new();
        collect_pattern_names(&d.id, &mut names);
        for name in names {
            let id = agent.intern(&name);
            agent.create_binding(env, id, None, decl.kind == VariableKind::Let, false)?;
        }
    }
    Ok(())
}

fn execute_variable_declaration(agent: &mut Agent, env: EnvironmentRef, decl: &VariableDeclaration) -> JsResult<Completion> {
    for d in &decl.declarations {
        let value = match &d.init {
            Some(expr) => evaluate_expression(agent, env, expr)?,
            None => Value::Undefined,
        };
        match decl.kind {
            VariableKind::Var => {
                // Already created (Undefined) by hoisting; this is a plain
                // assignment into the existing binding.
                if d.init.is_some() {
                    assign_to_pattern(agent, env, &d.id, value)?;
                }
            }
            VariableKind::Let => {
                if let BindingPattern::Identifier(name) = &d.id {
                    let id = agent.intern(name);
                    // Already TDZ-bound by `hoist_block_lets`; initialize it.
                    agent.set_binding(env, id, value, true)?;
                } else {
                    bind_pattern(agent, env, &d.id, value, true)?;
                }
            }
            VariableKind::Const => bind_pattern_const(agent, env, &d.id, value)?,
        }
    }
    Ok(Completion::Normal)
}

fn bind_pattern_const(agent: &mut Agent, env: EnvironmentRef, pattern: &BindingPattern, value: Value) -> JsResult<()> {
    // A plain identifier was already TDZ-declared by `hoist_block_lets`;
    // everything else (destructuring) declares fresh immutable bindings.
    if let BindingPattern::Identifier(name) = pattern {
        let id = agent.intern(name);
        if agent.has_binding(env, id) {
            return agent.set_binding(env, id, value, true);
        }
    }
    bind_pattern(agent, env, pattern, value, false)
}

fn assign_to_pattern(agent: &mut Agent, env: EnvironmentRef, pattern: &BindingPattern, value: Value) -> JsResult<()> {
    match pattern {
        BindingPattern::Identifier(name) => {
            let id = agent.intern(name);
            let strict = agent.is_strict_mode();
            agent.set_binding(env, id, value, strict)
        }
        BindingPattern::Assignment(inner, default) => {
            let value = if matches!(value, Value::Undefined) { evaluate_expression(agent, env, default)? } else { value };
            assign_to_pattern(agent, env, inner, value)
        }
        BindingPattern::Rest(inner) => assign_to_pattern(agent, env, inner, value),
        BindingPattern::Array(a) => {
            let items = iterate_to_vec(agent, value)?;
            for (i, el) in a.elements.iter().enumerate() {
                let Some(el) = el else { continue };
                if let BindingPattern::Rest(inner) = el {
                    let rest: Vec<Value> = items.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                    let arr = agent.new_array_from(rest);
                    assign_to_pattern(agent, env, inner, Value::Object(arr))?;
                    break;
                }
                assign_to_pattern(agent, env, el, items.get(i).cloned().unwrap_or(Value::Undefined))?;
            }
            Ok(())
        }
        BindingPattern::Object(o) => {
            for (key_expr, sub) in &o.properties {
                let key = evaluate_property_key(agent, env, key_expr)?;
                let v = read_property_value(agent, &value, key)?;
                assign_to_pattern(agent, env, sub, v)?;
            }
            Ok(())
        }
    }
}

fn execute_for(agent: &mut Agent, env: EnvironmentRef, s: &ast::ForStatement) -> JsResult<Completion> {
    let loop_env = agent.new_environment(Some(env), false);
    if let Some(init) = &s.init {
        match init {
            ForInit::VariableDeclaration(decl) => {
                if decl.kind != VariableKind::Var {
                    declare_tdz_bindings(agent, loop_env, decl)?;
                }
                execute_variable_declaration(agent, loop_env, decl)?;
            }
            ForInit::Expression(expr) => {
                evaluate_expression(agent, loop_env, expr)?;
            }
        }
    }
    loop {
        if let Some(test) = &s.test {
            if !evaluate_expression(agent, loop_env, test)?.to_boolean() {
                break;
            }
        }
        match execute_statement(agent, loop_env, &s.body)? {
            Completion::Break(None) => break,
            Completion::Continue(None) => {}
            Completion::Normal => {}
            other @ (Completion::Return(_) | Completion::Break(_) | Completion::Continue(_)) => return Ok(other),
        }
        if let Some(update) = &s.update {
            evaluate_expression(agent, loop_env, update)?;
        }
    }
    Ok(Completion::Normal)
}

fn execute_for_in(agent: &mut Agent, env: EnvironmentRef, s: &ast::ForInStatement) -> JsResult<Completion> {
    let right = evaluate_expression(agent, env, &s.right)?;
    let Value::Object(obj) = right else { return Ok(Completion::Normal) };
    let keys = enumerable_string_keys(agent, obj);
    for key in keys {
        let iter_env = agent.new_environment(Some(env), false);
        bind_for_head(agent, iter_env, &s.left, Value::from_str(key))?;
        match execute_statement(agent, iter_env, &s.body)? {
            Completion::Break(None) => break,
            Completion::Continue(None) => continue,
            Completion::Normal => {}
            other @ (Completion::Return(_) | Completion::Break(_) | Completion::Continue(_)) => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn execute_for_of(agent: &mut Agent, env: EnvironmentRef, s: &ast::ForOfStatement) -> JsResult<Completion> {
    let right = evaluate_expression(agent, env, &s.right)?;
    let items = iterate_to_vec(agent, right)?;
    for item in items {
        let item = if s.is_await { agent.await_promise(item)? } else { item };
        let iter_env = agent.new_environment(Some(env), false);
        bind_for_head(agent, iter_env, &s.left, item)?;
        match execute_statement(agent, iter_env, &s.body)? {
            Completion::Break(None) => break,
            Completion::Continue(None) => continue,
            Completion::Normal => {}
            other @ (Completion::Return(_) | Completion::Break(_) | Completion::Continue(_)) => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn bind_for_head(agent: &mut Agent, env: EnvironmentRef, head: &ForHead, value: Value) -> JsResult<()> {
    match head {
        ForHead::VariableDeclaration(decl) => {
            let d = &decl.declarations[0];
            bind_pattern(agent, env, &d.id, value, decl.kind != VariableKind::Const)
        }
        ForHead::Pattern(pattern) => assign_to_pattern(agent, env, pattern, value),
    }
}

/// Own-and-inherited enumerable string-keyed property names, de-duplicated
/// in first-seen (most-derived-first) order — `for-in`'s enumeration order
///.
fn enumerable_string_keys(agent: &mut Agent, obj: ObjectRef) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut current = Some(obj);
    while let Some(o) = current {
        for key in agent.own_property_keys(o) {
            if let PropertyKey::Interned(id) = key {
                let name = agent.resolve_interned(id).to_string();
                if seen.insert(name.clone()) {
                    out.push(name);
                }
            }
        }
        current = prototype_of(agent, o);
    }
    out
}

fn execute_try(agent: &mut Agent, env: EnvironmentRef, s: &ast::TryStatement) -> JsResult<Completion> {
    let block_env = agent.new_environment(Some(env), false);
    hoist_block_lets(agent, block_env, &s.block.body)?;
    let result = execute_statements(agent, block_env, &s.block.body);

    let result = match result {
        Err(err) => {
            if let Some(handler) = &s.handler {
                let catch_env = agent.new_environment(Some(env), false);
                if let Some(param) = &handler.param {
                    bind_pattern(agent, catch_env, param, err.value, true)?;
                }
                hoist_block_lets(agent, catch_env, &handler.body.body)?;
                execute_statements(agent, catch_env, &handler.body.body)
            } else {
                Err(err)
            }
        }
        ok => ok,
    };

    if let Some(finalizer) = &s.finalizer {
        let finally_env = agent.new_environment(Some(env), false);
        hoist_block_lets(agent, finally_env, &finalizer.body)?;
        // A completion from `finally` overrides whatever the try/catch
        // produced, including a pending exception.
        match execute_statements(agent, finally_env, &finalizer.body)? {
            Completion::Normal => result,
            other => Ok(other),
        }
    } else {
        result
    }
}

fn execute_switch(agent: &mut Agent, env: EnvironmentRef, s: &ast::SwitchStatement) -> JsResult<Completion> {
    let discriminant = evaluate_expression(agent, env, &s.discriminant)?;
    let switch_env = agent.new_environment(Some(env), false);
    for case in &s.cases {
        hoist_block_lets(agent, switch_env, &case.consequent)?;
    }
    let mut matched_index = None;
    for (i, case) in s.cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let test_value = evaluate_expression(agent, switch_env, test)?;
            if discriminant.strict_equals(&test_value) {
                matched_index = Some(i);
                break;
            }
        }
    }
    let start = match matched_index {
        Some(i) => i,
        None => match s.cases.iter().position(|c| c.test.is_none()) {
            Some(i) => i,
            None => return Ok(Completion::Normal),
        },
    };
    for case in &s.cases[start..] {
        match execute_statements(agent, switch_env, &case.consequent)? {
            Completion::Break(None) => return Ok(Completion::Normal),
            Completion::Normal => continue,
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

// ---------------------------------------------------------------------
// Expression evaluation
// ---------------------------------------------------------------------

pub fn evaluate_expression(agent: &mut Agent, env: EnvironmentRef, expr: &Expression) -> JsResult<Value> {
    let tier = agent.profiler.record_execution(expr.node_id());
    match expr {
        Expression::Undefined(_) => Ok(Value::Undefined),
        Expression::Null(_) => Ok(Value::Null),
        Expression::Boolean(_, b) => Ok(Value::Boolean(*b)),
        Expression::Number(_, n) => Ok(Value::Number(*n)),
        Expression::String(_, s) => Ok(Value::from_str(s.clone())),
        Expression::BigInt(_, digits) => Ok(Value::BigInt(parse_bigint_literal(digits))),
        Expression::RegExp(_, pattern, flags) => {
            let obj = agent.new_object(Some(agent.object_prototype()), ObjectKind::RegExp);
            let source_key = PropertyKey::Interned(agent.intern("source"));
            let flags_key = PropertyKey::Interned(agent.intern("flags"));
            agent.define_own_data_property(obj, source_key, Value::from_str(pattern.clone()), Attributes::USER);
            agent.define_own_data_property(obj, flags_key, Value::from_str(flags.clone()), Attributes::USER);
            Ok(Value::Object(obj))
        }
        Expression::TemplateLiteral(t) => {
            let mut out = String::new();
            for (i, quasi) in t.quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(e) = t.expressions.get(i) {
                    let v = evaluate_expression(agent, env, e)?;
                    out.push_str(&v.to_string(agent)?);
                }
            }
            Ok(Value::from_str(out))
        }
        Expression::TaggedTemplate(t) => {
            let tag = evaluate_expression(agent, env, &t.tag)?;
            let strings: Vec<Value> = t.quasi.quasis.iter().map(|q| Value::from_str(q.clone())).collect();
            let strings_arr = agent.new_array_from(strings);
            let mut args = vec![Value::Object(strings_arr)];
            for e in &t.quasi.expressions {
                args.push(evaluate_expression(agent, env, e)?);
            }
            agent.call(&tag, Value::Undefined, &args)
        }
        Expression::Identifier(_, name) => {
            let id = agent.intern(name);
            agent.get_binding_sloppy(env, id)
        }
        Expression::This(_) => Ok(agent.get_this_binding()),
        Expression::Super(_) => Ok(Value::Undefined), // `super` resolution lives at the call/member site.
        Expression::Array(arr) => {
            let mut values = Vec::new();
            for el in &arr.elements {
                match el {
                    Some(Expression::Spread(_, inner)) => {
                        let v = evaluate_expression(agent, env, inner)?;
                        values.extend(iterate_to_vec(agent, v)?);
                    }
                    Some(e) => values.push(evaluate_expression(agent, env, e)?),
                    None => values.push(Value::Undefined),
                }
            }
            Ok(Value::Object(agent.new_array_from(values)))
        }
        Expression::Object(obj_expr) => evaluate_object_expression(agent, env, obj_expr),
        Expression::Function(func) => evaluate_function_expression(agent, env, func),
        Expression::Class(class) => evaluate_class_expression(agent, env, class),
        Expression::Unary(u) => evaluate_unary(agent, env, u),
        Expression::Update(u) => evaluate_update(agent, env, u),
        Expression::Binary(b) => evaluate_binary(agent, env, b, tier),
        Expression::Logical(l) => evaluate_logical(agent, env, l),
        Expression::Assignment(a) => evaluate_assignment(agent, env, a),
        Expression::Conditional(c) => {
            if evaluate_expression(agent, env, &c.test)?.to_boolean() {
                evaluate_expression(agent, env, &c.consequent)
            } else {
                evaluate_expression(agent, env, &c.alternate)
            }
        }
        Expression::Sequence(seq) => {
            let mut last = Value::Undefined;
            for e in &seq.expressions {
                last = evaluate_expression(agent, env, e)?;
            }
            Ok(last)
        }
        Expression::Member(m) => evaluate_member(agent, env, m).map(|(v, _)| v),
        Expression::Call(c) => evaluate_call(agent, env, c),
        Expression::New(n) => evaluate_new(agent, env, n),
        Expression::Spread(_, inner) => evaluate_expression(agent, env, inner),
        Expression::Yield(y) => {
            let value = match &y.argument {
                Some(e) => evaluate_expression(agent, env, e)?,
                None => Value::Undefined,
            };
            if y.delegate {
                for item in iterate_to_vec(agent, value)? {
                    agent.record_yield(item);
                }
            } else {
                agent.record_yield(value);
            }
            Ok(Value::Undefined)
        }
        Expression::Await(a) => {
            let value = evaluate_expression(agent, env, &a.argument)?;
            agent.await_promise(value)
        }
        Expression::Paren(_, inner) => evaluate_expression(agent, env, inner),
    }
}

fn evaluate_object_expression(agent: &mut Agent, env: EnvironmentRef, obj_expr: &ast::ObjectExpression) -> JsResult<Value> {
    let obj = agent.new_object(Some(agent.object_prototype()), ObjectKind::Ordinary);
    for prop in &obj_expr.properties {
        match prop {
            ObjectProperty::KeyValue { key, value, .. } => {
                let k = evaluate_property_key(agent, env, key)?;
                let v = evaluate_expression(agent, env, value)?;
                agent.define_own_data_property(obj, k, v, Attributes::USER);
            }
            ObjectProperty::Getter { key, body } => {
                let k = evaluate_property_key(agent, env, key)?;
                let f = make_function_ref(agent, env, body)?;
                agent.define_own_accessor_property(obj, k, Some(f), None, true, true);
            }
            ObjectProperty::Setter { key, body } => {
                let k = evaluate_property_key(agent, env, key)?;
                let f = make_function_ref(agent, env, body)?;
                agent.define_own_accessor_property(obj, k, None, Some(f), true, true);
            }
            ObjectProperty::Spread(expr) => {
                let v = evaluate_expression(agent, env, expr)?;
                if let Value::Object(src) = &v {
                    for key in agent.own_property_keys(*src) {
                        let value = agent.get_property(*src, key, v.clone())?;
                        agent.define_own_data_property(obj, key, value, Attributes::USER);
                    }
                }
            }
        }
    }
    Ok(Value::Object(obj))
}

fn evaluate_property_key(agent: &mut Agent, env: EnvironmentRef, key: &PropertyKeyExpr) -> JsResult<PropertyKey> {
    match key {
        PropertyKeyExpr::Identifier(name) => Ok(PropertyKey::Interned(agent.intern(name))),
        PropertyKeyExpr::Computed(expr) => {
            let v = evaluate_expression(agent, env, expr)?;
            value_to_property_key(agent, &v)
        }
    }
}

fn value_to_property_key(agent: &mut Agent, value: &Value) -> JsResult<PropertyKey> {
    if let Value::Symbol(s) = value {
        return Ok(PropertyKey::Symbol(*s));
    }
    if let Value::Number(n) = value {
        if *n >= 0.0 && n.fract() == 0.0 {
            return Ok(PropertyKey::Index(*n as u32));
        }
    }
    let s = value.to_string(agent)?;
    if let Ok(i) = s.parse::<u32>() {
        if i.to_string() == *s {
            return Ok(PropertyKey::Index(i));
        }
    }
    Ok(PropertyKey::Interned(agent.intern(&s)))
}

fn evaluate_unary(agent: &mut Agent, env: EnvironmentRef, u: &ast::UnaryExpression) -> JsResult<Value> {
    if u.operator == UnaryOperator::Delete {
        if let Expression::Member(m) = u.argument.as_ref() {
            let obj_value = evaluate_expression(agent, env, &m.object)?;
            let key = member_key(agent, env, m)?;
            if let Value::Object(o) = obj_value {
                let strict = agent.is_strict_mode();
                return Ok(Value::Boolean(agent.delete_property(o, key, strict)?));
            }
            return Ok(Value::Boolean(true));
        }
        return Ok(Value::Boolean(true));
    }
    if u.operator == UnaryOperator::TypeOf {
        if let Expression::Identifier(_, name) = u.argument.as_ref() {
            let id = agent.intern(name);
            if !has_binding_in_chain(agent, env, id) {
                return Ok(Value::from_str("undefined"));
            }
        }
    }
    let value = evaluate_expression(agent, env, &u.argument)?;
    match u.operator {
        UnaryOperator::Minus => match value {
            Value::BigInt(b) => Ok(Value::BigInt(-b)),
            _ => Ok(Value::Number(-value.to_number(agent)?)),
        },
        UnaryOperator::Plus => Ok(Value::Number(value.to_number(agent)?)),
        UnaryOperator::Not => Ok(Value::Boolean(!value.to_boolean())),
        UnaryOperator::BitNot => match value {
            Value::BigInt(b) => Ok(Value::BigInt(!b)),
            _ => Ok(Value::Number(!(value.to_int32(agent)?) as f64)),
        },
        UnaryOperator::Void => Ok(Value::Undefined),
        UnaryOperator::TypeOf => Ok(Value::from_str(value.type_of().as_str())),
        UnaryOperator::Delete => unreachable!("handled above"),
    }
}

fn evaluate_update(agent: &mut Agent, env: EnvironmentRef, u: &ast::UpdateExpression) -> JsResult<Value> {
    let old = evaluate_expression(agent, env, &u.argument)?.to_number(agent)?;
    let new = match u.operator {
        UpdateOperator::Increment => old + 1.0,
        UpdateOperator::Decrement => old - 1.0,
    };
    assign_to_expression_target(agent, env, &u.argument, Value::Number(new))?;
    Ok(Value::Number(if u.prefix { new } else { old }))
}

/// Writes `value` to whatever simple reference `target` names: an
/// identifier or a member expression (used by `++`/`--`/compound
/// assignment, which all read-modify-write a single reference).
fn assign_to_expression_target(agent: &mut Agent, env: EnvironmentRef, target: &Expression, value: Value) -> JsResult<()> {
    match target {
        Expression::Identifier(_, name) => {
            let id = agent.intern(name);
            let strict = agent.is_strict_mode();
            agent.set_binding(env, id, value, strict)
        }
        Expression::Member(m) => {
            let (obj_value, key) = evaluate_member_target(agent, env, m)?;
            match obj_value {
                Value::Object(o) => {
                    if agent.array_length_set(o, key, value.clone())?.is_some() {
                        return Ok(());
                    }
                    let strict = agent.is_strict_mode();
                    agent.set_property(o, key, value, Value::Object(o), strict)?;
                    Ok(())
                }
                _ => Err(agent.throw(ErrorKind::Type, "cannot assign to property of non-object")),
            }
        }
        Expression::Paren(_, inner) => assign_to_expression_target(agent, env, inner, value),
        _ => Err(agent.throw(ErrorKind::Syntax, "invalid assignment target")),
    }
}

fn evaluate_member_target(agent: &mut Agent, env: EnvironmentRef, m: &MemberExpression) -> JsResult<(Value, PropertyKey)> {
    let obj_value = evaluate_expression(agent, env, &m.object)?;
    let key = member_key(agent, env, m)?;
    Ok((obj_value, key))
}

fn member_key(agent: &mut Agent, env: EnvironmentRef, m: &MemberExpression) -> JsResult<PropertyKey> {
    match &m.property {
        MemberProperty::Identifier(name) => Ok(PropertyKey::Interned(agent.intern(name))),
        MemberProperty::Computed(expr) => {
            let v = evaluate_expression(agent, env, expr)?;
            value_to_property_key(agent, &v)
        }
    }
}

/// Evaluates a member expression, returning both its value and the
/// receiver it was read off of (the receiver is what a following `Call`
/// node uses as `this`, "Member/Call" coupling).
fn evaluate_member(agent: &mut Agent, env: EnvironmentRef, m: &MemberExpression) -> JsResult<(Value, Value)> {
    let obj_value = evaluate_expression(agent, env, &m.object)?;
    if m.optional && obj_value.is_nullish() {
        return Ok((Value::Undefined, Value::Undefined));
    }
    let key = member_key(agent, env, m)?;
    let value = read_property_value(agent, &obj_value, key)?;
    Ok((value, obj_value))
}

/// Evaluates a binary expression. Once the profiler has promoted this
/// node past the interpreter tier, each operand's runtime type is also fed
/// into `Profiler::feedback_mut` — the same monomorphic-Number signal a
/// compiled tier's type guard depends on staying populated. Recording is
/// skipped below the threshold so a one-shot expression never pays for it.
fn evaluate_binary(agent: &mut Agent, env: EnvironmentRef, b: &BinaryExpression, tier: Tier) -> JsResult<Value> {
    let left = evaluate_expression(agent, env, &b.left)?;
    let right = evaluate_expression(agent, env, &b.right)?;
    if tier > Tier::Interpreter {
        record_type_feedback(agent, b.node_id, &left);
        record_type_feedback(agent, b.node_id, &right);
    }
    apply_binary_operator(agent, b.operator, left, right)
}

fn record_type_feedback(agent: &mut Agent, node_id: ast::NodeId, value: &Value) {
    let feedback = agent.profiler.feedback_mut(node_id);
    match value {
        Value::Number(_) => feedback.record_number(),
        Value::String(_) => feedback.record_string(),
        Value::Boolean(_) => feedback.record_boolean(),
        Value::BigInt(_) | Value::Object(_) | Value::Function(_) | Value::Symbol(_) | Value::Undefined | Value::Null => feedback.record_object(),
    }
}

fn apply_binary_operator(agent: &mut Agent, op: BinaryOperator, left: Value, right: Value) -> JsResult<Value> {
    if matches!(op, BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod) {
        match (&left, &right) {
            // Both BigInt: arithmetic stays in arbitrary-precision integers,
            // never silently widening to f64 (ECMA-262 disallows mixing the
            // two numeric types in one operation).
            (Value::BigInt(_), Value::BigInt(_)) => return apply_bigint_binary_operator(agent, op, left, right),
            (Value::BigInt(_), Value::Number(_)) | (Value::Number(_), Value::BigInt(_)) => {
                return Err(agent.throw(ErrorKind::Type, "cannot mix BigInt and other types, use explicit conversions"));
            }
            _ => {}
        }
    }
    match op {
        BinaryOperator::Add => {
            let l = left.to_primitive(agent, PrimitiveHint::Default)?;
            let r = right.to_primitive(agent, PrimitiveHint::Default)?;
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                let mut s = l.to_string(agent)?.to_string();
                s.push_str(&r.to_string(agent)?);
                Ok(Value::from_str(s))
            } else {
                Ok(Value::Number(l.to_number(agent)? + r.to_number(agent)?))
            }
        }
        BinaryOperator::Sub => Ok(Value::Number(left.to_number(agent)? - right.to_number(agent)?)),
        BinaryOperator::Mul => Ok(Value::Number(left.to_number(agent)? * right.to_number(agent)?)),
        BinaryOperator::Div => Ok(Value::Number(left.to_number(agent)? / right.to_number(agent)?)),
        BinaryOperator::Mod => Ok(Value::Number(left.to_number(agent)? % right.to_number(agent)?)),
        BinaryOperator::Exponent => Ok(Value::Number(left.to_number(agent)?.powf(right.to_number(agent)?))),
        BinaryOperator::BitAnd => Ok(Value::Number((left.to_int32(agent)? & right.to_int32(agent)?) as f64)),
        BinaryOperator::BitOr => Ok(Value::Number((left.to_int32(agent)? | right.to_int32(agent)?) as f64)),
        BinaryOperator::BitXor => Ok(Value::Number((left.to_int32(agent)? ^ right.to_int32(agent)?) as f64)),
        BinaryOperator::Shl => Ok(Value::Number(((left.to_int32(agent)?) << (right.to_uint32(agent)? & 31)) as f64)),
        BinaryOperator::Shr => Ok(Value::Number(((left.to_int32(agent)?) >> (right.to_uint32(agent)? & 31)) as f64)),
        BinaryOperator::UShr => Ok(Value::Number(((left.to_uint32(agent)?) >> (right.to_uint32(agent)? & 31)) as f64)),
        BinaryOperator::Equal => Ok(Value::Boolean(left.loose_equals(&right, agent)?)),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!left.loose_equals(&right, agent)?)),
        BinaryOperator::StrictEqual => Ok(Value::Boolean(left.strict_equals(&right))),
        BinaryOperator::StrictNotEqual => Ok(Value::Boolean(!left.strict_equals(&right))),
        BinaryOperator::Less => compare(agent, left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOperator::LessEqual => compare(agent, left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOperator::Greater => compare(agent, left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOperator::GreaterEqual => compare(agent, left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOperator::In => match right {
            Value::Object(o) => {
                let key = value_to_property_key(agent, &left)?;
                Ok(Value::Boolean(agent.has_property(o, key)))
            }
            _ => Err(agent.throw(ErrorKind::Type, "cannot use 'in' operator on a non-object")),
        },
        BinaryOperator::InstanceOf => evaluate_instanceof(agent, left, right),
    }
}

/// `+`/`-`/`*`/`/`/`%` over two BigInt operands. Division and modulo by
/// zero throw RangeError, matching ECMA-262's BigInt division algorithm
/// (unlike Number division, which produces `Infinity`/`NaN`).
fn apply_bigint_binary_operator(agent: &mut Agent, op: BinaryOperator, left: Value, right: Value) -> JsResult<Value> {
    let (Value::BigInt(a), Value::BigInt(b)) = (left, right) else { unreachable!("checked by caller") };
    match op {
        BinaryOperator::Add => Ok(Value::BigInt(a + b)),
        BinaryOperator::Sub => Ok(Value::BigInt(a - b)),
        BinaryOperator::Mul => Ok(Value::BigInt(a * b)),
        BinaryOperator::Div if b.is_zero() => Err(agent.throw(ErrorKind::Range, "division by zero")),
        BinaryOperator::Div => Ok(Value::BigInt(a / b)),
        BinaryOperator::Mod if b.is_zero() => Err(agent.throw(ErrorKind::Range, "division by zero")),
        BinaryOperator::Mod => Ok(Value::BigInt(a % b)),
        _ => unreachable!("checked by caller"),
    }
}

fn compare(agent: &mut Agent, left: Value, right: Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> JsResult<Value> {
    let l = left.to_primitive(agent, PrimitiveHint::Number)?;
    let r = right.to_primitive(agent, PrimitiveHint::Number)?;
    if let (Value::String(a), Value::String(b)) = (&l, &r) {
        return Ok(Value::Boolean(accept(a.cmp(b))));
    }
    let a = l.to_number(agent)?;
    let b = r.to_number(agent)?;
    match a.partial_cmp(&b) {
        Some(o) => Ok(Value::Boolean(accept(o))),
        None => Ok(Value::Boolean(false)), // either side is NaN
    }
}

fn evaluate_instanceof(agent: &mut Agent, left: Value, right: Value) -> JsResult<Value> {
    let Value::Function(ctor) = right else {
        return Err(agent.throw(ErrorKind::Type, "right-hand side of 'instanceof' is not callable"));
    };
    let Value::Object(obj) = left else { return Ok(Value::Boolean(false)) };
    let properties = function_properties(agent, ctor);
    let proto_key = PropertyKey::Interned(agent.intern("prototype"));
    let proto_value = agent.get_property(properties, proto_key, Value::Object(properties))?;
    let Value::Object(target_proto) = proto_value else { return Ok(Value::Boolean(false)) };
    let mut current = prototype_of(agent, obj);
    while let Some(p) = current {
        if p == target_proto {
            return Ok(Value::Boolean(true));
        }
        current = prototype_of(agent, p);
    }
    Ok(Value::Boolean(false))
}

fn evaluate_logical(agent: &mut Agent, env: EnvironmentRef, l: &ast::LogicalExpression) -> JsResult<Value> {
    let left = evaluate_expression(agent, env, &l.left)?;
    match l.operator {
        LogicalOperator::And => {
            if left.to_boolean() {
                evaluate_expression(agent, env, &l.right)
            } else {
                Ok(left)
            }
        }
        LogicalOperator::Or => {
            if left.to_boolean() {
                Ok(left)
            } else {
                evaluate_expression(agent, env, &l.right)
            }
        }
        LogicalOperator::NullishCoalescing => {
            if left.is_nullish() {
                evaluate_expression(agent, env, &l.right)
            } else {
                Ok(left)
            }
        }
    }
}

fn evaluate_assignment(agent: &mut Agent, env: EnvironmentRef, a: &AssignmentExpression) -> JsResult<Value> {
    if a.operator == AssignmentOperator::Assign {
        let value = evaluate_expression(agent, env, &a.right)?;
        match &a.left {
            AssignmentTarget::Identifier(name) => {
                let id = agent.intern(name);
                let strict = agent.is_strict_mode();
                agent.set_binding(env, id, value.clone(), strict)?;
            }
            AssignmentTarget::Member(m) => {
                let (obj_value, key) = evaluate_member_target(agent, env, m)?;
                match obj_value {
                    Value::Object(o) => {
                        if agent.array_length_set(o, key, value.clone())?.is_none() {
                            let strict = agent.is_strict_mode();
                            agent.set_property(o, key, value.clone(), Value::Object(o), strict)?;
                        }
                    }
                    _ => return Err(agent.throw(ErrorKind::Type, "cannot assign to property of non-object")),
                }
            }
            AssignmentTarget::Pattern(pattern) => assign_to_pattern(agent, env, pattern, value.clone())?,
        }
        return Ok(value);
    }

    // Compound/logical assignment all reduce to "read current, combine,
    // write back" against the same simple target.
    let target_expr = assignment_target_as_expression(&a.left);
    let current = evaluate_expression(agent, env, &target_expr)?;
    let new_value = match a.operator {
        AssignmentOperator::LogicalAndAssign => {
            if !current.to_boolean() {
                return Ok(current);
            }
            evaluate_expression(agent, env, &a.right)?
        }
        AssignmentOperator::LogicalOrAssign => {
            if current.to_boolean() {
                return Ok(current);
            }
            evaluate_expression(agent, env, &a.right)?
        }
        AssignmentOperator::NullishAssign => {
            if !current.is_nullish() {
                return Ok(current);
            }
            evaluate_expression(agent, env, &a.right)?
        }
        _ => {
            let rhs = evaluate_expression(agent, env, &a.right)?;
            let op = compound_to_binary(a.operator);
            apply_binary_operator(agent, op, current, rhs)?
        }
    };
    assign_to_expression_target(agent, env, &target_expr, new_value.clone())?;
    Ok(new_value)
}

fn assignment_target_as_expression(target: &AssignmentTarget) -> Expression {
    match target {
        AssignmentTarget::Identifier(name) => Expression::Identifier(0, name.clone()),
        AssignmentTarget::Member(m) => Expression::Member(m.clone()),
        AssignmentTarget::Pattern(_) => unreachable!("compound assignment never targets a destructuring pattern"),
    }
}

fn compound_to_binary(op: AssignmentOperator) -> BinaryOperator {
    match op {
        AssignmentOperator::AddAssign => BinaryOperator::Add,
        AssignmentOperator::SubAssign => BinaryOperator::Sub,
        AssignmentOperator::MulAssign => BinaryOperator::Mul,
        AssignmentOperator::DivAssign => BinaryOperator::Div,
        AssignmentOperator::ModAssign => BinaryOperator::Mod,
        AssignmentOperator::BitAndAssign => BinaryOperator::BitAnd,
        AssignmentOperator::BitOrAssign => BinaryOperator::BitOr,
        AssignmentOperator::BitXorAssign => BinaryOperator::BitXor,
        AssignmentOperator::ShlAssign => BinaryOperator::Shl,
        AssignmentOperator::ShrAssign => BinaryOperator::Shr,
        AssignmentOperator::UShrAssign => BinaryOperator::UShr,
        AssignmentOperator::Assign | AssignmentOperator::LogicalAndAssign | AssignmentOperator::LogicalOrAssign | AssignmentOperator::NullishAssign => {
            unreachable!("handled separately")
        }
    }
}

fn evaluate_call(agent: &mut Agent, env: EnvironmentRef, c: &ast::CallExpression) -> JsResult<Value> {
    if matches!(c.callee.as_ref(), Expression::Super(_)) {
        // `super(...)`: resolved through the hidden `__super__` binding a
        // derived class's defining environment carries (see
        // `evaluate_class_expression`), called against the already-allocated
        // `this`.
        let super_id = agent.intern("__super__");
        let super_fn = agent.get_binding_sloppy(env, super_id)?;
        let args = evaluate_arguments(agent, env, &c.arguments)?;
        let this = agent.get_this_binding();
        return agent.call(&super_fn, this, &args);
    }
    let (callee, this_value) = match c.callee.as_ref() {
        Expression::Member(m) => {
            let (value, receiver) = evaluate_member(agent, env, m)?;
            if c.optional && value.is_nullish() {
                return Ok(Value::Undefined);
            }
            (value, receiver)
        }
        other => (evaluate_expression(agent, env, other)?, Value::Undefined),
    };
    if c.optional && callee.is_nullish() {
        return Ok(Value::Undefined);
    }
    let args = evaluate_arguments(agent, env, &c.arguments)?;
    agent.call(&callee, this_value, &args)
}

fn evaluate_new(agent: &mut Agent, env: EnvironmentRef, n: &ast::NewExpression) -> JsResult<Value> {
    let callee = evaluate_expression(agent, env, &n.callee)?;
    let Value::Function(f) = callee else {
        return Err(agent.throw(ErrorKind::Type, "value is not a constructor"));
    };
    let args = evaluate_arguments(agent, env, &n.arguments)?;
    agent.construct(f, &args, Value::Function(f))
}

fn evaluate_arguments(agent: &mut Agent, env: EnvironmentRef, args: &[ast::Argument]) -> JsResult<Vec<Value>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            ast::Argument::Expression(e) => out.push(evaluate_expression(agent, env, e)?),
            ast::Argument::Spread(e) => {
                let v = evaluate_expression(agent, env, e)?;
                out.extend(iterate_to_vec(agent, v)?);
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------

fn evaluate_function_expression(agent: &mut Agent, env: EnvironmentRef, func: &Function) -> JsResult<Value> {
    let f = make_function_ref(agent, env, func)?;
    Ok(Value::Function(f))
}

fn make_function_ref(agent: &mut Agent, env: EnvironmentRef, func: &Function) -> JsResult<FunctionRef> {
    let mut declared = Vec::new();
    for p in &func.params {
        collect_pattern_names(&p.pattern, &mut declared);
    }
    if let Some(name) = &func.name {
        declared.push(name.clone());
    }
    let declared: HashSet<String> = declared.into_iter().collect();
    let free = free_variable_names(func, &declared);
    let closed_over: Vec<u32> = free.iter().map(|n| agent.intern(n)).collect();

    let flags = FunctionFlags {
        is_constructor: !func.is_arrow,
        is_arrow: func.is_arrow,
        is_class_constructor: false,
        is_strict: func.is_strict,
        is_generator: func.is_generator,
        is_async: func.is_async,
    };
    let name = func.name.as_ref().map(|n| n.as_str().into());
    Ok(agent.new_script_function(name, func.params.clone(), func.body.clone(), env, closed_over, flags, func.node_id))
}

/// Conservative over-approximation of a function body's free variables: every
/// identifier read anywhere in the body that isn't a parameter, the
/// function's own name, or locally declared somewhere in the body. A name captured this way that actually
/// resolves to a global simply seeds/writes back a shadow property that's
/// never read — harmless, just not maximally precise (see DESIGN.md).
fn free_variable_names(func: &Function, declared: &HashSet<String>) -> Vec<String> {
    let mut locals = declared.clone();
    let mut reads = HashSet::new();
    match &func.body {
        FunctionBody::Expression(expr) => walk_expression(expr, &mut locals, &mut reads),
        FunctionBody::Block(stmts) => {
            collect_all_locals(stmts, &mut locals);
            for stmt in stmts {
                walk_statement(stmt, &mut locals, &mut reads);
            }
        }
    }
    reads.retain(|name| !locals.contains(name));
    let mut out: Vec<String> = reads.into_iter().collect();
    out.sort();
    out
}

fn collect_all_locals(stmts: &[Statement], locals: &mut HashSet<String>) {
    let mut names = Vec::new();
    collect_var_names(stmts, &mut names);
    locals.extend(names);
    for stmt in stmts {
        if let Statement::VariableDeclaration(decl) = stmt {
            for d in &decl.declarations {
                let mut names = Vec::new();
                collect_pattern_names(&d.id, &mut names);
                locals.extend(names);
            }
        }
        if let Statement::FunctionDeclaration(f) = stmt {
            if let Some(name) = &f.name {
                locals.insert(name.clone());
            }
        }
        if let Statement::ClassDeclaration(c) = stmt {
            if let Some(name) = &c.name {
                locals.insert(name.clone());
            }
        }
    }
}

fn walk_statement(stmt: &Statement, locals: &mut HashSet<String>, reads: &mut HashSet<String>) {
    match stmt {
        Statement::ExpressionStatement(s) => walk_expression(&s.expression, locals, reads),
        Statement::Block(b) => {
            for s in &b.body {
                walk_statement(s, locals, reads);
            }
        }
        Statement::VariableDeclaration(d) => {
            for decl in &d.declarations {
                if let Some(init) = &decl.init {
                    walk_expression(init, locals, reads);
                }
            }
        }
        Statement::If(s) => {
            walk_expression(&s.test, locals, reads);
            walk_statement(&s.consequent, locals, reads);
            if let Some(alt) = &s.alternate {
                walk_statement(alt, locals, reads);
            }
        }
        Statement::While(s) | Statement::DoWhile(s) => {
            walk_expression(&s.test, locals, reads);
            walk_statement(&s.body, locals, reads);
        }
        Statement::For(s) => {
            if let Some(ForInit::Expression(e)) = &s.init {
                walk_expression(e, locals, reads);
            }
            if let Some(ForInit::VariableDeclaration(d)) = &s.init {
                for decl in &d.declarations {
                    if let Some(init) = &decl.init {
                        walk_expression(init, locals, reads);
                    }
                }
            }
            if let Some(test) = &s.test {
                walk_expression(test, locals, reads);
            }
            if let Some(update) = &s.update {
                walk_expression(update, locals, reads);
            }
            walk_statement(&s.body, locals, reads);
        }
        Statement::ForIn(s) => {
            walk_expression(&s.right, locals, reads);
            walk_statement(&s.body, locals, reads);
        }
        Statement::ForOf(s) => {
            walk_expression(&s.right, locals, reads);
            walk_statement(&s.body, locals, reads);
        }
        Statement::Return(s) => {
            if let Some(e) = &s.argument {
                walk_expression(e, locals, reads);
            }
        }
        Statement::Throw(s) => walk_expression(&s.argument, locals, reads),
        Statement::Try(s) => {
            for st in &s.block.body {
                walk_statement(st, locals, reads);
            }
            if let Some(h) = &s.handler {
                for st in &h.body.body {
                    walk_statement(st, locals, reads);
                }
            }
            if let Some(f) = &s.finalizer {
                for st in &f.body {
                    walk_statement(st, locals, reads);
                }
            }
        }
        Statement::Switch(s) => {
            walk_expression(&s.discriminant, locals, reads);
            for case in &s.cases {
                if let Some(test) = &case.test {
                    walk_expression(test, locals, reads);
                }
                for st in &case.consequent {
                    walk_statement(st, locals, reads);
                }
            }
        }
        Statement::Labeled(s) => walk_statement(&s.body, locals, reads),
        Statement::ClassDeclaration(_) | Statement::FunctionDeclaration(_) => {
            // Nested function/class bodies resolve their own captures when
            // they themselves are evaluated; only their declared name
            // matters here (already added to `locals` by the caller).
        }
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty(_) | Statement::Debugger(_) => {}
    }
}

fn walk_expression(expr: &Expression, locals: &mut HashSet<String>, reads: &mut HashSet<String>) {
    match expr {
        Expression::Identifier(_, name) => {
            reads.insert(name.clone());
        }
        Expression::TemplateLiteral(t) => {
            for e in &t.expressions {
                walk_expression(e, locals, reads);
            }
        }
        Expression::TaggedTemplate(t) => {
            walk_expression(&t.tag, locals, reads);
            for e in &t.quasi.expressions {
                walk_expression(e, locals, reads);
            }
        }
        Expression::Array(a) => {
            for e in a.elements.iter().flatten() {
                walk_expression(e, locals, reads);
            }
        }
        Expression::Object(o) => {
            for p in &o.properties {
                match p {
                    ObjectProperty::KeyValue { value, .. } => walk_expression(value, locals, reads),
                    ObjectProperty::Spread(e) => walk_expression(e, locals, reads),
                    ObjectProperty::Getter { .. } | ObjectProperty::Setter { .. } => {}
                }
            }
        }
        Expression::Function(_) | Expression::Class(_) => {}
        Expression::Unary(u) => walk_expression(&u.argument, locals, reads),
        Expression::Update(u) => walk_expression(&u.argument, locals, reads),
        Expression::Binary(b) => {
            walk_expression(&b.left, locals, reads);
            walk_expression(&b.right, locals, reads);
        }
        Expression::Logical(l) => {
            walk_expression(&l.left, locals, reads);
            walk_expression(&l.right, locals, reads);
        }
        Expression::Assignment(a) => {
            if let AssignmentTarget::Identifier(name) = &a.left {
                reads.insert(name.clone());
            }
            if let AssignmentTarget::Member(m) = &a.left {
                walk_expression(&m.object, locals, reads);
            }
            walk_expression(&a.right, locals, reads);
        }
        Expression::Conditional(c) => {
            walk_expression(&c.test, locals, reads);
            walk_expression(&c.consequent, locals, reads);
            walk_expression(&c.alternate, locals, reads);
        }
        Expression::Sequence(s) => {
            for e in &s.expressions {
                walk_expression(e, locals, reads);
            }
        }
        Expression::Member(m) => {
            walk_expression(&m.object, locals, reads);
            if let MemberProperty::Computed(e) = &m.property {
                walk_expression(e, locals, reads);
            }
        }
        Expression::Call(c) => {
            walk_expression(&c.callee, locals, reads);
            for a in &c.arguments {
                match a {
                    ast::Argument::Expression(e) | ast::Argument::Spread(e) => walk_expression(e, locals, reads),
                }
            }
        }
        Expression::New(n) => {
            walk_expression(&n.callee, locals, reads);
            for a in &n.arguments {
                match a {
                    ast::Argument::Expression(e) | ast::Argument::Spread(e) => walk_expression(e, locals, reads),
                }
            }
        }
        Expression::Spread(_, e) | Expression::Paren(_, e) => walk_expression(e, locals, reads),
        Expression::Yield(y) => {
            if let Some(e) = &y.argument {
                walk_expression(e, locals, reads);
            }
        }
        Expression::Await(a) => walk_expression(&a.argument, locals, reads),
        Expression::Undefined(_)
        | Expression::Null(_)
        | Expression::Boolean(_, _)
        | Expression::Number(_, _)
        | Expression::String(_, _)
        | Expression::BigInt(_, _)
        | Expression::RegExp(_, _, _)
        | Expression::This(_)
        | Expression::Super(_) => {}
    }
}

/// Builds a `this.<name> = <init>;` statement, used to splice field
/// initializers into a class constructor body.
fn field_init_statement(key: PropertyKeyExpr, init: Option<Expression>) -> Statement {
    let property = match key {
        PropertyKeyExpr::Identifier(name) => MemberProperty::Identifier(name),
        PropertyKeyExpr::Computed(expr) => MemberProperty::Computed(expr),
    };
    let value = init.unwrap_or(Expression::Undefined(0));
    Statement::ExpressionStatement(ast::ExpressionStatement {
        node_id: 0,
        expression: Expression::Assignment(AssignmentExpression {
            node_id: 0,
            operator: AssignmentOperator::Assign,
            left: AssignmentTarget::Member(MemberExpression { node_id: 0, object: Box::new(Expression::This(0)), property, optional: false }),
            right: Box::new(value),
        }),
    })
}

fn is_super_call_statement(stmt: &Statement) -> bool {
    matches!(stmt, Statement::ExpressionStatement(s) if matches!(&s.expression, Expression::Call(c) if matches!(c.callee.as_ref(), Expression::Super(_))))
}

/// `super(...arguments)`, spliced in for a derived class with no explicit
/// constructor.
fn implicit_super_call_statement(node_id: ast::NodeId) -> Statement {
    Statement::ExpressionStatement(ast::ExpressionStatement {
        node_id,
        expression: Expression::Call(ast::CallExpression {
            node_id,
            callee: Box::new(Expression::Super(node_id)),
            arguments: vec![ast::Argument::Spread(Expression::Identifier(node_id, "arguments".to_string()))],
            optional: false,
        }),
    })
}

fn evaluate_class_expression(agent: &mut Agent, env: EnvironmentRef, class: &Class) -> JsResult<Value> {
    // A fresh environment carries the hidden `__super__` binding that a
    // `super(...)` call inside the constructor (or a method) body resolves
    // through, so the constructor and every method close over it like any
    // other free variable (see `evaluate_call`'s `Expression::Super` case).
    let class_env = agent.new_environment(Some(env), false);

    let super_ctor = match &class.super_class {
        Some(expr) => match evaluate_expression(agent, env, expr)? {
            Value::Function(f) => Some(f),
            _ => return Err(agent.throw(ErrorKind::Type, "class extends value is not a constructor")),
        },
        None => None,
    };
    if let Some(super_ctor) = super_ctor {
        let super_id = agent.intern("__super__");
        agent.create_binding(class_env, super_id, Some(Value::Function(super_ctor)), false, false)?;
    }

    let own_name = class.name.clone();

    let instance_field_statements: Vec<Statement> = class
        .body
        .iter()
        .filter(|m| !m.is_static)
        .filter_map(|m| match &m.kind {
            ClassMemberKind::Field(init) => Some(field_init_statement(m.key.clone(), init.clone())),
            _ => None,
        })
        .collect();

    let constructor_fn = class.body.iter().find_map(|m| match (&m.key, &m.kind) {
        (PropertyKeyExpr::Identifier(name), ClassMemberKind::Method(f)) if name == "constructor" => Some(f.clone()),
        _ => None,
    });

    let ctor_function = match constructor_fn {
        Some(mut f) => {
            if let FunctionBody::Block(stmts) = &mut f.body {
                let insert_at = if super_ctor.is_some() {
                    stmts.iter().position(is_super_call_statement).map(|i| i + 1).unwrap_or(0)
                } else {
                    0
                };
                for (offset, stmt) in instance_field_statements.into_iter().enumerate() {
                    stmts.insert(insert_at + offset, stmt);
                }
            }
            f
        }
        None => {
            let mut body = Vec::new();
            if super_ctor.is_some() {
                body.push(implicit_super_call_statement(class.node_id));
            }
            body.extend(instance_field_statements);
            Function { node_id: class.node_id, name: own_name.clone(), params: Vec::new(), body: FunctionBody::Block(body), is_async: false, is_generator: false, is_arrow: false, is_strict: true }
        }
    };

    let ctor = make_function_ref(agent, class_env, &ctor_function)?;

    let properties = function_properties(agent, ctor);
    let proto_key = PropertyKey::Interned(agent.intern("prototype"));
    let proto_value = agent.get_property(properties, proto_key, Value::Object(properties))?;
    let Value::Object(prototype) = proto_value else {
        return Err(agent.throw(ErrorKind::Internal, "class constructor has no prototype object"));
    };
    if let Some(super_ctor) = super_ctor {
        let super_properties = function_properties(agent, super_ctor);
        let super_proto = agent.get_property(super_properties, proto_key, Value::Object(super_properties))?;
        if let Value::Object(super_proto) = super_proto {
            set_prototype_of(agent, prototype, Some(super_proto));
        }
    }

    for member in &class.body {
        let target = if member.is_static { properties } else { prototype };
        match (&member.key, &member.kind) {
            (key, ClassMemberKind::Method(f)) => {
                if matches!(key, PropertyKeyExpr::Identifier(n) if n == "constructor") {
                    continue;
                }
                let k = evaluate_property_key(agent, class_env, key)?;
                let method = make_function_ref(agent, class_env, f)?;
                agent.define_own_data_property(target, k, Value::Function(method), Attributes { writable: true, enumerable: false, configurable: true, is_accessor: false });
            }
            (key, ClassMemberKind::Getter(f)) => {
                let k = evaluate_property_key(agent, class_env, key)?;
                let getter = make_function_ref(agent, class_env, f)?;
                agent.define_own_accessor_property(target, k, Some(getter), None, false, true);
            }
            (key, ClassMemberKind::Setter(f)) => {
                let k = evaluate_property_key(agent, class_env, key)?;
                let setter = make_function_ref(agent, class_env, f)?;
                agent.define_own_accessor_property(target, k, None, Some(setter), false, true);
            }
            (key, ClassMemberKind::Field(init)) if member.is_static => {
                let k = evaluate_property_key(agent, class_env, key)?;
                let v = match init {
                    Some(e) => evaluate_expression(agent, class_env, e)?,
                    None => Value::Undefined,
                };
                agent.define_own_data_property(properties, k, v, Attributes::USER);
            }
            _ => {} // non-static fields are already spliced into the constructor body above.
        }
    }

    Ok(Value::Function(ctor))
}

// ---------------------------------------------------------------------
// Generator `.next()` protocol object (installed once on the agent's
// shared generator prototype; see `context::Agent::new`)
// ---------------------------------------------------------------------

pub(crate) fn install_generator_next(agent: &mut Agent, prototype: ObjectRef) {
    let next = agent.new_native_function("next", 0, generator_next, FunctionFlags::default());
    let key = PropertyKey::Interned(agent.intern("next"));
    agent.define_own_data_property(prototype, key, Value::Function(next), Attributes { writable: true, enumerable: false, configurable: true, is_accessor: false });
}

fn generator_next(agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    let Value::Object(obj) = this else { return Err(agent.throw(ErrorKind::Type, "next() called on a non-generator")) };
    let values_key = PropertyKey::Interned(agent.intern("__gen_values"));
    let index_key = PropertyKey::Interned(agent.intern("__gen_index"));
    let done_key = PropertyKey::Interned(agent.intern("__gen_done"));
    let return_key = PropertyKey::Interned(agent.intern("__gen_return"));

    let done = matches!(agent.get_property(obj, done_key, Value::Object(obj))?, Value::Boolean(true));
    if done {
        return Ok(make_iter_result(agent, Value::Undefined, true));
    }

    let Value::Object(values) = agent.get_property(obj, values_key, Value::Object(obj))? else {
        return Ok(make_iter_result(agent, Value::Undefined, true));
    };
    let index = match agent.get_property(obj, index_key, Value::Object(obj))? {
        Value::Number(n) => n as u32,
        _ => 0,
    };
    let len = array_length(agent, values);
    if index < len {
        let value = agent.get_property(values, PropertyKey::Index(index), Value::Object(values))?;
        agent.define_own_data_property(obj, index_key, Value::Number((index + 1) as f64), Attributes::USER);
        return Ok(make_iter_result(agent, value, false));
    }
    agent.define_own_data_property(obj, done_key, Value::Boolean(true), Attributes::USER);
    let return_value = agent.get_property(obj, return_key, Value::Object(obj))?;
    Ok(make_iter_result(agent, return_value, true))
}

fn make_iter_result(agent: &mut Agent, value: Value, done: bool) -> Value {
    let obj = agent.new_object(Some(agent.object_prototype()), ObjectKind::Ordinary);
    let value_key = PropertyKey::Interned(agent.intern("value"));
    let done_key = PropertyKey::Interned(agent.intern("done"));
    agent.define_own_data_property(obj, value_key, value, Attributes::USER);
    agent.define_own_data_property(obj, done_key, Value::Boolean(done), Attributes::USER);
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;
    use parser::Parser;

    #[test]
    fn counted_loop_accumulates() {
        let program = Parser::new("var total = 0; for (var i = 0; i < 5; i = i + 1) { total = total + i; } total;").unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        hoist_declarations(&mut agent, env, &program.body, true).unwrap();
        for stmt in &program.body {
            execute_statement(&mut agent, env, stmt).unwrap();
        }
        let total_id = agent.intern("total");
        let total = agent.get_binding(env, total_id).unwrap();
        assert!(matches!(total, Value::Number(n) if n == 10.0));
    }

    #[test]
    fn try_finally_return_override() {
        let source = "function f() { try { return 1; } finally { return 2; } } f();";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        hoist_declarations(&mut agent, env, &program.body, true).unwrap();
        let mut result = Value::Undefined;
        for stmt in &program.body {
            if let Statement::ExpressionStatement(s) = stmt {
                result = evaluate_expression(&mut agent, env, &s.expression).unwrap();
            } else {
                execute_statement(&mut agent, env, stmt).unwrap();
            }
        }
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn closures_capture_outer_variables_without_a_live_environment() {
        let source = "function makeCounter() { var count = 0; function increment() { count = count + 1; return count; } return increment; } var inc = makeCounter(); inc(); inc();";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        hoist_declarations(&mut agent, env, &program.body, true).unwrap();
        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let Statement::ExpressionStatement(s) = stmt {
                last = evaluate_expression(&mut agent, env, &s.expression).unwrap();
            } else {
                execute_statement(&mut agent, env, stmt).unwrap();
            }
        }
        assert!(matches!(last, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn classes_support_fields_inheritance_and_super_calls() {
        let source = "class Animal { constructor(name) { this.name = name; } speak() { return this.name; } } \
                      class Dog extends Animal { sound = 'woof'; constructor(name) { super(name); } bark() { return this.sound; } } \
                      var d = new Dog('Rex'); d.speak() + ' ' + d.bark();";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        hoist_declarations(&mut agent, env, &program.body, true).unwrap();
        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let Statement::ExpressionStatement(s) = stmt {
                last = evaluate_expression(&mut agent, env, &s.expression).unwrap();
            } else {
                execute_statement(&mut agent, env, stmt).unwrap();
            }
        }
        assert!(matches!(last, Value::String(s) if &*s == "Rex woof"));
    }

    #[test]
    fn bigint_arithmetic_stays_arbitrary_precision() {
        let source = "9007199254740993n + 1n;"; // one past Number.MAX_SAFE_INTEGER
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        let Statement::ExpressionStatement(s) = &program.body[0] else { panic!("expected an expression statement") };
        let result = evaluate_expression(&mut agent, env, &s.expression).unwrap();
        match result {
            Value::BigInt(n) => assert_eq!(n, num_bigint::BigInt::parse_bytes(b"9007199254740994", 10).unwrap()),
            other => panic!("expected a BigInt, got {other:?}"),
        }
    }

    #[test]
    fn bigint_cannot_mix_with_number() {
        let source = "1n + 1;";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut agent = Agent::new(EngineOptions::default());
        let env = agent.new_environment(None, true);
        let Statement::ExpressionStatement(s) = &program.body[0] else { panic!("expected an expression statement") };
        assert!(evaluate_expression(&mut agent, env, &s.expression).is_err());
    }
}
