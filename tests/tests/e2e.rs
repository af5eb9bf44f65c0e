// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Literal end-to-end scenarios driving `parser` and `engine` together
//! exactly as a host embedding this crate would: parse source text, run
//! it through `engine::interpreter::run_program`, then read back
//! whatever globals the script assigned.
//!
//! Scenarios that need a built-in library (`parseInt`, `Promise.then`)
//! are out of scope here — this repository does not implement one — and
//! are covered at the `Agent` API level instead, in
//! `engine/tests/integration.rs`.

use engine::context::{Agent, EngineOptions};
use engine::profiler::Thresholds;
use engine::value::Value;
use parser::parser::Parser;

fn run(source: &str) -> Agent {
    run_with_options(source, EngineOptions::default())
}

fn run_with_options(source: &str, options: EngineOptions) -> Agent {
    let mut parser = Parser::new(source).expect("lexing should not fail on these fixtures");
    let program = parser.parse_program().expect("parsing should not fail on these fixtures");
    let mut agent = Agent::new(options);
    engine::interpreter::run_program(&mut agent, &program).expect("these fixtures do not throw");
    agent
}

fn global_number(agent: &mut Agent, name: &str) -> f64 {
    let env = agent.global_environment();
    let id = agent.intern(name);
    match agent.get_binding(env, id).unwrap() {
        Value::Number(n) => n,
        other => panic!("expected {name} to be a Number, got {other:?}"),
    }
}

fn global_bool(agent: &mut Agent, name: &str) -> bool {
    let env = agent.global_environment();
    let id = agent.intern(name);
    match agent.get_binding(env, id).unwrap() {
        Value::Boolean(b) => b,
        other => panic!("expected {name} to be a Boolean, got {other:?}"),
    }
}

#[test]
fn counted_loop_reaches_32_under_the_interpreter() {
    let mut agent = run("var x = 0; for (let i = 0; i < 32; i++) { x = x + 1; }");
    assert_eq!(global_number(&mut agent, "x"), 32.0);
}

#[test]
fn counted_loop_reaches_32_once_promoted_to_real_compiled_bytecode() {
    // Eager promotion thresholds push `count` past `Thresholds::bytecode`
    // on its very first call, so this isn't a hand-built `Program` fed
    // straight to `bytecode::run` the way `engine::bytecode`'s own unit
    // tests do it — it's the engine's own parse of this exact source,
    // compiled by `function.rs::call_script_function` and dispatched for
    // real. `machine_code` is pinned out of reach so the loop (which
    // `jit::compile` always declines, having a jump) stays on the
    // bytecode tier rather than silently falling back to the interpreter.
    let source = "function count(n) { var x = 0; for (var i = 0; i < n; i = i + 1) { x = x + 1; } return x; } var result = count(32);";
    let eager = EngineOptions { profiler_thresholds: Thresholds { bytecode: 1, optimized: 2, machine_code: 1_000_000, max_deopts: 3 }, ..EngineOptions::default() };
    let mut agent = run_with_options(source, eager);
    assert_eq!(global_number(&mut agent, "result"), 32.0);
}

#[test]
fn straight_line_arithmetic_reaches_the_same_answer_once_the_jit_takes_over() {
    // Eager thresholds promote `addOne` to bytecode on its first call and
    // to real x86-64 machine code — compiled by `jit::compile` from the
    // engine's own `bytecode::Program`, not a hand-assembled one — by its
    // third. Every call here must answer 43 regardless of which tier
    // actually executed it, demonstrating genuine interpreter/bytecode/JIT
    // equivalence through the engine's own lowering of one script.
    let source = "function addOne(n) { var r = n + 1; return r; }
                  var r1 = addOne(42);
                  var r2 = addOne(42);
                  var r3 = addOne(42);
                  var r4 = addOne(42);";
    let eager = EngineOptions { profiler_thresholds: Thresholds { bytecode: 1, optimized: 2, machine_code: 3, max_deopts: 3 }, ..EngineOptions::default() };
    let mut agent = run_with_options(source, eager);
    for name in ["r1", "r2", "r3", "r4"] {
        assert_eq!(global_number(&mut agent, name), 43.0);
    }
}

#[test]
fn a_guard_failure_mid_tier_falls_back_without_losing_correctness() {
    // `addEither` runs numeric for its first three calls (crossing into
    // bytecode, then machine code), then gets called with a string —
    // tripping the locals guard at whichever compiled tier is live and
    // forcing a real deopt back down, instead of a tier silently
    // miscomputing or double-running the body.
    let source = "function addEither(n) { var r = n + 1; return r; }
                  var r1 = addEither(1);
                  var r2 = addEither(1);
                  var r3 = addEither(1);
                  var r4 = addEither('x');";
    let eager = EngineOptions { profiler_thresholds: Thresholds { bytecode: 1, optimized: 2, machine_code: 3, max_deopts: 3 }, ..EngineOptions::default() };
    let mut agent = run_with_options(source, eager);
    let env = agent.global_environment();
    let r4_id = agent.intern("r4");
    match agent.get_binding(env, r4_id).unwrap() {
        Value::String(s) => assert_eq!(s.to_string(), "x1"),
        other => panic!("expected r4 to be a String, got {other:?}"),
    }
}

#[test]
fn array_length_write_truncates_and_reads_back() {
    let mut agent = run(
        r#"
        var a = [1, 2, 3];
        a.length = 1;
        var len = a.length;
        var first = a[0];
        var second = a[1];
        "#,
    );
    assert_eq!(global_number(&mut agent, "len"), 1.0);
    assert_eq!(global_number(&mut agent, "first"), 1.0);
    let env = agent.global_environment();
    let second_id = agent.intern("second");
    assert!(matches!(agent.get_binding(env, second_id).unwrap(), Value::Undefined), "element 1 should have been truncated away");
}

#[test]
fn array_index_write_past_length_grows_it() {
    let mut agent = run(
        r#"
        var a = [1, 2];
        a[4] = 9;
        var len = a.length;
        var hole = a[3];
        var tail = a[4];
        "#,
    );
    assert_eq!(global_number(&mut agent, "len"), 5.0);
    assert_eq!(global_number(&mut agent, "tail"), 9.0);
    let env = agent.global_environment();
    let hole_id = agent.intern("hole");
    assert!(matches!(agent.get_binding(env, hole_id).unwrap(), Value::Undefined));
}

#[test]
fn try_finally_override_wins() {
    // A `return` in a `finally` block overrides a `return` from the `try` block.
    let mut agent = run("function t(){ try { return 1 } finally { return 2 } } var result = t();");
    assert_eq!(global_number(&mut agent, "result"), 2.0);
}

#[test]
fn closures_observe_the_latest_write() {
    // A closure reads the binding, not a snapshot of its value at capture time.
    let mut agent = run("let x = 1; let g = () => x; x = 2; var result = g();");
    assert_eq!(global_number(&mut agent, "result"), 2.0);
}

#[test]
fn generator_yields_then_returns_in_order() {
    // Three `.next()` calls against a generator that yields twice and
    // then returns should report the yielded values first, undone, then
    // the return value with `done: true`.
    let mut agent = run(
        r#"
        function* g(){ yield 1; yield 2; return 3 }
        var it = g();
        var r1 = it.next();
        var r2 = it.next();
        var r3 = it.next();
        var v1 = r1.value, d1 = r1.done;
        var v2 = r2.value, d2 = r2.done;
        var v3 = r3.value, d3 = r3.done;
        "#,
    );
    assert_eq!(global_number(&mut agent, "v1"), 1.0);
    assert!(!global_bool(&mut agent, "d1"));
    assert_eq!(global_number(&mut agent, "v2"), 2.0);
    assert!(!global_bool(&mut agent, "d2"));
    assert_eq!(global_number(&mut agent, "v3"), 3.0);
    assert!(global_bool(&mut agent, "d3"));
}

#[test]
fn strict_equals_treats_signed_zero_as_equal_and_nan_as_unequal() {
    // Strict-equals follows ECMAScript `===` (±0 equal, NaN never equal),
    // not SameValue. `0/0` stands in for a `NaN` literal since no
    // built-in `NaN` global binding is registered.
    let mut agent = run(
        r#"
        var posZeroEqNegZero = (0 === -0);
        var nanEqNan = ((0/0) === (0/0));
        "#,
    );
    assert!(global_bool(&mut agent, "posZeroEqNegZero"));
    assert!(!global_bool(&mut agent, "nanEqNan"));
}

#[test]
fn bigint_literal_arithmetic_stays_exact_past_f64_precision() {
    // 2^60 + 1 is not exactly representable as an f64; a BigInt literal
    // must carry it through addition without losing the low bit.
    let mut agent = run(
        r#"
        var big = 1152921504606846977n + 1n;
        var same = big === 1152921504606846978n;
        "#,
    );
    assert!(global_bool(&mut agent, "same"));
}

#[test]
fn variable_hoisting_predeclares_var_before_its_declarator_runs() {
    let mut agent = run(
        r#"
        function f() {
            var seenBeforeDeclaration = typeof hoisted === "undefined";
            var hoisted = 5;
            return hoisted;
        }
        var result = f();
        "#,
    );
    assert_eq!(global_number(&mut agent, "result"), 5.0);
}
