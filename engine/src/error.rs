// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error kinds and the Context's exception channel.
//!
//! User-observable failures never unwind the host language's panic/exception
//! facility; they
//! are `JsError` values threaded through `JsResult<T>`. A handful of
//! tier-internal conditions (an unsupported bytecode pattern, a JIT pattern
//! outside the emitter's table) are represented separately by
//! [`EngineError`] because they are never script-observable — they just
//! cause a tier to decline and the profiler to keep a node at a lower tier.

use crate::value::{JsString, Value};

/// The error kinds the core recognizes and can construct from script code,
/// each distinguishable via `instanceof` once bound to a prototype by the
/// built-ins layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Reference,
    Type,
    Range,
    Generic,
    Internal,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Generic => "Error",
            ErrorKind::Internal => "InternalError",
        }
    }
}

/// One frame of a captured call stack, rendered as `at <fn> (<file>:<line>:<column>)`.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: Option<JsString>,
    pub file: Option<JsString>,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        match &self.file {
            Some(file) => write!(f, "at {name} ({file}:{}:{})", self.line, self.column),
            None => write!(f, "at {name}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StackTrace(pub Vec<StackFrame>);

impl std::fmt::Display for StackTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for frame in &self.0 {
            writeln!(f, "    {frame}")?;
        }
        Ok(())
    }
}

/// The value installed on a Context's exception slot. Carries the thrown value plus the call stack
/// captured at throw time for the "uncaught exception" surface.
#[derive(Debug, Clone)]
pub struct JsError {
    pub value: Value,
    pub stack: StackTrace,
}

impl JsError {
    pub fn new(value: Value, stack: StackTrace) -> Self {
        JsError { value, stack }
    }
}

pub type JsResult<T> = Result<T, JsError>;

/// Tier-internal, non-script-observable failures.
/// These never become a `JsError`; the caller just falls back a tier.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("bytecode lowering does not support this node shape")]
    UnsupportedBytecodePattern,
    #[error("constant fold declined: {0}")]
    FoldDeclined(&'static str),
    #[error("JIT pattern not recognized for this node")]
    UnsupportedJitPattern,
    #[error("JIT guard speculation violated: {0}")]
    GuardFailed(&'static str),
    #[error("call stack size exceeded")]
    StackOverflow,
}
