// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hand-rolled x86-64 machine-code tier.
//!
//! A function only reaches this tier once its call count crosses
//! `Thresholds::machine_code` *and* the bytecode tier's compiled form turns
//! out to be a single straight-line arithmetic basic block — no jumps, a
//! lone trailing `Return` (see `bytecode::Program`). `function.rs::call_script_function`
//! attempts this compilation once per function, right after the bytecode
//! `Program` itself is cached, and caches the resulting `MachineCodeFunction`
//! alongside it; every call from then on dispatches straight to
//! `MachineCodeFunction::call` over the locals it guarded as numbers, with a
//! guard failure reported back to the profiler as a deopt and retried one
//! tier down. Anything with control
//! flow (loops, `if`) stays on the bytecode tier: lowering jumps/comparisons
//! to machine code doesn't pay for itself at the "one hot basic block"
//! granularity this engine profiles at (see DESIGN.md's Open Question on
//! JIT scope). `compile` returns `None` the moment it meets an opcode
//! outside that subset, and the caller falls back one tier down.
//!
//! Calling convention: the emitted code is `extern "C" fn(*mut f64) -> f64`
//! — the System V AMD64 ABI passes the first integer argument (the locals
//! array pointer) in `rdi` and expects the `f64` result back in `xmm0`,
//! which is exactly what falling out of a SysV-compatible `call` gives us
//! without any shim.

use crate::bytecode::{Opcode, Program};

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

/// An executable page holding one compiled function, and the signature to
/// call it through. Freed via `munmap` on drop.
pub struct MachineCodeFunction {
    page: *mut libc::c_void,
    len: usize,
    entry: extern "C" fn(*mut f64) -> f64,
}

impl MachineCodeFunction {
    pub fn call(&self, locals: *mut f64) -> f64 {
        (self.entry)(locals)
    }
}

impl Drop for MachineCodeFunction {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.page, self.len);
        }
    }
}

/// Attempts to compile a bytecode program straight to machine code. Only
/// succeeds for a control-flow-free arithmetic block: `LoadConst`,
/// `LoadLocal`, `StoreLocal`, `Add`, `Sub`, `Mul`, `Div`, `Neg`, reaching a
/// `Return` with no jump ever seen first. `bytecode::compile` always tacks
/// a `LoadConst(NaN); Return;` fallback onto the end of every program it
/// emits, whether or not the function's own last statement already
/// returned — so a `Return` partway through is ordinary, reachable code,
/// and whatever sits after it is dead and simply never gets emitted.
pub fn compile(program: &Program) -> Option<MachineCodeFunction> {
    let mut code: Vec<u8> = Vec::new();
    for op in &program.ops {
        match op {
            Opcode::LoadConst(n) => emit_load_const(&mut code, *n),
            Opcode::LoadLocal(slot) => emit_load_local(&mut code, *slot),
            Opcode::StoreLocal(slot) => emit_store_local(&mut code, *slot),
            Opcode::Add => emit_binop(&mut code, 0x58),
            Opcode::Sub => emit_binop(&mut code, 0x5C),
            Opcode::Mul => emit_binop(&mut code, 0x59),
            Opcode::Div => emit_binop(&mut code, 0x5E),
            Opcode::Neg => emit_neg(&mut code),
            Opcode::Pop => emit_pop(&mut code),
            Opcode::Return => {
                emit_return(&mut code);
                return Some(allocate_executable(&code));
            }
            // Control flow, modulo, and comparisons all fall outside this
            // tier's scope.
            _ => return None,
        }
    }
    // `bytecode::compile` always ends a program in a `Return`; one that
    // doesn't isn't bytecode this tier produced.
    None
}

fn emit_push_xmm0(code: &mut Vec<u8>) {
    code.extend_from_slice(&[0x48, 0x83, 0xEC, 0x08]); // sub rsp, 8
    code.extend_from_slice(&[0xF2, 0x0F, 0x11, 0x04, 0x24]); // movsd [rsp], xmm0
}

fn emit_pop_into_xmm(code: &mut Vec<u8>, xmm1: bool) {
    if xmm1 {
        code.extend_from_slice(&[0xF2, 0x0F, 0x10, 0x0C, 0x24]); // movsd xmm1, [rsp]
    } else {
        code.extend_from_slice(&[0xF2, 0x0F, 0x10, 0x04, 0x24]); // movsd xmm0, [rsp]
    }
    code.extend_from_slice(&[0x48, 0x83, 0xC4, 0x08]); // add rsp, 8
}

fn emit_load_const(code: &mut Vec<u8>, n: f64) {
    code.extend_from_slice(&[0x48, 0xB8]); // movabs rax, imm64
    code.extend_from_slice(&n.to_bits().to_le_bytes());
    code.extend_from_slice(&[0x66, 0x48, 0x0F, 0x6E, 0xC0]); // movq xmm0, rax
    emit_push_xmm0(code);
}

/// `[rdi + slot*8]` addressed with a disp32 ModRM (mod=10, rm=111/rdi) — a
/// few bytes wasted when the offset fits in a disp8, traded for one code
/// path instead of two.
fn disp32_rdi(code: &mut Vec<u8>, slot: u32) {
    let offset = (slot as i64) * 8;
    code.push(0x87); // ModRM: mod=10, reg=xmm0(000), rm=rdi(111)
    code.extend_from_slice(&(offset as i32).to_le_bytes());
}

fn emit_load_local(code: &mut Vec<u8>, slot: u32) {
    code.extend_from_slice(&[0xF2, 0x0F, 0x10]); // movsd xmm0, ...
    disp32_rdi(code, slot);
    emit_push_xmm0(code);
}

fn emit_store_local(code: &mut Vec<u8>, slot: u32) {
    code.extend_from_slice(&[0xF2, 0x0F, 0x10, 0x04, 0x24]); // movsd xmm0, [rsp] (peek, no pop)
    code.extend_from_slice(&[0xF2, 0x0F, 0x11]); // movsd [rdi + slot*8], xmm0
    disp32_rdi(code, slot);
}

fn emit_binop(code: &mut Vec<u8>, opcode_byte: u8) {
    emit_pop_into_xmm(code, true); // xmm1 = b
    emit_pop_into_xmm(code, false); // xmm0 = a
    code.extend_from_slice(&[0xF2, 0x0F, opcode_byte, 0xC1]); // <op>sd xmm0, xmm1
    emit_push_xmm0(code);
}

fn emit_neg(code: &mut Vec<u8>) {
    emit_pop_into_xmm(code, false); // xmm0 = a
    code.extend_from_slice(&[0x66, 0x48, 0x0F, 0x7E, 0xC0]); // movq rax, xmm0
    code.extend_from_slice(&[0x48, 0xB9]); // movabs rcx, SIGN_BIT
    code.extend_from_slice(&SIGN_BIT.to_le_bytes());
    code.extend_from_slice(&[0x48, 0x31, 0xC8]); // xor rax, rcx
    code.extend_from_slice(&[0x66, 0x48, 0x0F, 0x6E, 0xC0]); // movq xmm0, rax
    emit_push_xmm0(code);
}

fn emit_pop(code: &mut Vec<u8>) {
    code.extend_from_slice(&[0x48, 0x83, 0xC4, 0x08]); // add rsp, 8
}

fn emit_return(code: &mut Vec<u8>) {
    emit_pop_into_xmm(code, false); // xmm0 = result
    code.push(0xC3); // ret
}

/// Maps a fresh page, copies `code` in, then flips it from writable to
/// executable — never both at once.
fn allocate_executable(code: &[u8]) -> MachineCodeFunction {
    let page_size = 4096usize;
    let len = code.len().div_ceil(page_size).max(1) * page_size;
    unsafe {
        let page = libc::mmap(std::ptr::null_mut(), len, libc::PROT_READ | libc::PROT_WRITE, libc::MAP_PRIVATE | libc::MAP_ANONYMOUS, -1, 0);
        assert_ne!(page, libc::MAP_FAILED, "mmap failed while allocating a JIT code page");
        std::ptr::copy_nonoverlapping(code.as_ptr(), page as *mut u8, code.len());
        let ok = libc::mprotect(page, len, libc::PROT_READ | libc::PROT_EXEC);
        assert_eq!(ok, 0, "mprotect failed while finalizing a JIT code page");
        let entry: extern "C" fn(*mut f64) -> f64 = std::mem::transmute::<*mut libc::c_void, extern "C" fn(*mut f64) -> f64>(page);
        MachineCodeFunction { page, len, entry }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Program;

    #[test]
    fn compiles_and_runs_straight_line_arithmetic() {
        // (a + b) * 2.0, with a, b as locals 0 and 1.
        let ops = vec![Opcode::LoadLocal(0), Opcode::LoadLocal(1), Opcode::Add, Opcode::LoadConst(2.0), Opcode::Mul, Opcode::Return];
        let program = Program { ops, locals: vec![0, 1] };
        let compiled = compile(&program).expect("straight-line arithmetic should compile");
        let mut locals = [3.0f64, 4.0];
        let result = compiled.call(locals.as_mut_ptr());
        assert_eq!(result, 14.0);
    }

    #[test]
    fn refuses_to_compile_a_loop() {
        let ops = vec![Opcode::LoadConst(1.0), Opcode::JumpIfFalse(3), Opcode::Return];
        let program = Program { ops, locals: vec![] };
        assert!(compile(&program).is_none());
    }

    #[test]
    fn negation_flips_the_sign_bit() {
        let ops = vec![Opcode::LoadLocal(0), Opcode::Neg, Opcode::Return];
        let program = Program { ops, locals: vec![0] };
        let compiled = compile(&program).unwrap();
        let mut locals = [5.0f64];
        assert_eq!(compiled.call(locals.as_mut_ptr()), -5.0);
    }

    #[test]
    fn stops_emitting_at_the_first_reachable_return() {
        // Mirrors what `bytecode::compile` actually produces for a function
        // whose own last statement is already a `return`: an explicit
        // `Return` followed by the unconditional `LoadConst(NaN); Return;`
        // fallback tail. That tail is unreachable and must be ignored, not
        // treated as a reason to decline compilation.
        let ops = vec![Opcode::LoadLocal(0), Opcode::Return, Opcode::LoadConst(f64::NAN), Opcode::Return];
        let program = Program { ops, locals: vec![0] };
        let compiled = compile(&program).expect("dead code after a reachable Return shouldn't block compilation");
        let mut locals = [7.0f64];
        assert_eq!(compiled.call(locals.as_mut_ptr()), 7.0);
    }
}
