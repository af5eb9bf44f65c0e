// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tagged runtime value.
//!
//! `Value` is the union every operand, binding, and property slot in the
//! engine passes around. Object- and function-valued variants are
//! non-owning handles into the [`Agent`](crate::context::Agent)'s arenas;
//! everything else is by-copy.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::context::{Agent, JsError, JsResult};
use crate::error::ErrorKind;
use crate::object::ObjectRef;
use crate::function::FunctionRef;

/// A interned/ref-counted UTF-16-agnostic string. The engine treats source
/// text as UTF-8 Rust strings throughout; this is a deliberate simplification
/// relative to ECMAScript's UTF-16 `String` (see DESIGN.md).
pub type JsString = Rc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef(pub(crate) u32);

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    BigInt(BigInt),
    Symbol(SymbolRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

/// The ECMAScript `typeof` result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Undefined,
    Object,
    Boolean,
    Number,
    String,
    BigInt,
    Symbol,
    Function,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Object => "object",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::BigInt => "bigint",
            TypeTag::Symbol => "symbol",
            TypeTag::Function => "function",
        }
    }
}

/// Hint passed to `to_primitive` (ECMA-262 `OrdinaryToPrimitive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    Default,
    Number,
    String,
}

impl Value {
    pub fn from_str(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    /// `typeof` never throws; `Null` reports "object" (a long-standing
    /// ECMAScript wart we preserve because scripts depend on it).
    pub fn type_of(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Object,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::BigInt(_) => TypeTag::BigInt,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::Object(_) => TypeTag::Object,
            Value::Function(_) => TypeTag::Function,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Function(_))
    }

    /// ToBoolean (ECMA-262 §7.1.2). Infallible.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::BigInt(b) => !b.is_zero(),
            Value::Symbol(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// ToNumber (ECMA-262 §7.1.4). Symbols and BigInts are a TypeError
    ///; objects go through `to_primitive` first
    /// so this only ever sees primitives once the interpreter has coerced.
    pub fn to_number(&self, agent: &mut Agent) -> JsResult<f64> {
        match self {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(s)),
            Value::BigInt(_) => Err(agent.throw(ErrorKind::Type, "cannot convert a BigInt to a number")),
            Value::Symbol(_) => Err(agent.throw(ErrorKind::Type, "cannot convert a Symbol to a number")),
            Value::Object(_) | Value::Function(_) => {
                let prim = self.to_primitive(agent, PrimitiveHint::Number)?;
                prim.to_number(agent)
            }
        }
    }

    pub fn to_int32(&self, agent: &mut Agent) -> JsResult<i32> {
        let n = self.to_number(agent)?;
        Ok(to_int32_bits(n))
    }

    pub fn to_uint32(&self, agent: &mut Agent) -> JsResult<u32> {
        let n = self.to_number(agent)?;
        Ok(to_int32_bits(n) as u32)
    }

    /// ToString (ECMA-262 §7.1.17). Symbols are a TypeError; everything
    /// else has a defined textual form.
    pub fn to_string(&self, agent: &mut Agent) -> JsResult<JsString> {
        match self {
            Value::Undefined => Ok("undefined".into()),
            Value::Null => Ok("null".into()),
            Value::Boolean(b) => Ok(if *b { "true".into() } else { "false".into() }),
            Value::Number(n) => Ok(number_to_string(*n).into()),
            Value::String(s) => Ok(s.clone()),
            Value::BigInt(b) => Ok(b.to_string().into()),
            Value::Symbol(_) => Err(agent.throw(ErrorKind::Type, "cannot convert a Symbol to a string")),
            Value::Object(_) | Value::Function(_) => {
                let prim = self.to_primitive(agent, PrimitiveHint::String)?;
                prim.to_string(agent)
            }
        }
    }

    /// OrdinaryToPrimitive, folding in a `Symbol.toPrimitive` lookup. If a
    /// user-installed `Symbol.toPrimitive` returns an object the conversion
    /// fails with TypeError.
    pub fn to_primitive(&self, agent: &mut Agent, hint: PrimitiveHint) -> JsResult<Value> {
        if !self.is_object_like() {
            return Ok(self.clone());
        }
        let method_names: [&str; 2] = match hint {
            PrimitiveHint::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        if let Some(exotic) = agent.get_to_primitive_override(self)? {
            let result = agent.call(&exotic, self.clone(), &[])?;
            if result.is_object_like() {
                return Err(agent.throw(ErrorKind::Type, "Symbol.toPrimitive returned an object"));
            }
            return Ok(result);
        }
        for name in method_names {
            if let Some(method) = agent.get_method(self, name)? {
                let result = agent.call(&method, self.clone(), &[])?;
                if !result.is_object_like() {
                    return Ok(result);
                }
            }
        }
        Err(agent.throw(ErrorKind::Type, "cannot convert object to primitive value"))
    }

    /// Strict equality (`===`): same tag, bitwise-equivalent payload,
    /// `NaN != NaN`, `+0 === -0`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }

    /// SameValueZero: like strict equality but `NaN` equals itself. Used as
    /// the Map/Set key equivalence.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        if let (Value::Number(a), Value::Number(b)) = (self, other) {
            return (a.is_nan() && b.is_nan()) || a == b;
        }
        self.strict_equals(other)
    }

    /// Loose equality (`==`) per the ECMA-262 coercion table.
    pub fn loose_equals(&self, other: &Value, agent: &mut Agent) -> JsResult<bool> {
        use Value::*;
        if std::mem::discriminant(self) == std::mem::discriminant(other) {
            return Ok(self.strict_equals(other));
        }
        match (self, other) {
            (Null, Undefined) | (Undefined, Null) => Ok(true),
            (Number(_), String(_)) => {
                let rhs = Number(other.to_number(agent)?);
                self.loose_equals(&rhs, agent)
            }
            (String(_), Number(_)) => {
                let lhs = Number(self.to_number(agent)?);
                lhs.loose_equals(other, agent)
            }
            (Boolean(_), _) => {
                let lhs = Number(self.to_number(agent)?);
                lhs.loose_equals(other, agent)
            }
            (_, Boolean(_)) => {
                let rhs = Number(other.to_number(agent)?);
                self.loose_equals(&rhs, agent)
            }
            (BigInt(a), Number(n)) | (Number(n), BigInt(a)) => {
                Ok(n.is_finite() && n.fract() == 0.0 && BigInt::from(*n as i128) == *a)
            }
            (BigInt(a), String(s)) => Ok(s.parse::<BigInt>().map(|b| b == *a).unwrap_or(false)),
            (String(s), BigInt(a)) => Ok(s.parse::<BigInt>().map(|b| b == *a).unwrap_or(false)),
            (Number(_) | String(_) | BigInt(_), Object(_) | Function(_)) => {
                let rhs = other.to_primitive(agent, PrimitiveHint::Default)?;
                self.loose_equals(&rhs, agent)
            }
            (Object(_) | Function(_), Number(_) | String(_) | BigInt(_)) => {
                let lhs = self.to_primitive(agent, PrimitiveHint::Default)?;
                lhs.loose_equals(other, agent)
            }
            _ => Ok(false),
        }
    }

    /// Programmer-error accessor: callers must coerce first.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            _ => panic!("as_number called on a non-Number value; coerce with to_number first"),
        }
    }
}

/// `ToInt32` bit-truncation shared by `to_int32`/`to_uint32` (ECMA-262 §7.1.6/7).
pub fn to_int32_bits(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let n = n.trunc();
    let modulo = n.rem_euclid(4294967296.0);
    if modulo >= 2147483648.0 {
        (modulo - 4294967296.0) as i32
    } else {
        modulo as i32
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    ryu_js::Buffer::new().format(n).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equals_treats_pos_and_neg_zero_as_equal() {
        assert!(Value::Number(0.0).strict_equals(&Value::Number(-0.0)));
    }

    #[test]
    fn strict_equals_nan_is_never_equal() {
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn same_value_zero_treats_nan_as_equal_to_itself() {
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
    }

    #[test]
    fn to_boolean_matches_ecmascript_falsy_set() {
        assert!(!Value::Number(0.0).to_boolean());
        assert!(!Value::from_str("").to_boolean());
        assert!(Value::from_str("0").to_boolean());
        assert!(!Value::Undefined.to_boolean());
        assert!(!Value::Null.to_boolean());
    }

    #[test]
    fn string_to_number_handles_hex_and_empty() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x2A"), 42.0);
        assert!(string_to_number("abc").is_nan());
    }

    #[test]
    fn bigint_strict_equals_compares_by_value_not_by_number() {
        assert!(Value::BigInt(BigInt::from(10)).strict_equals(&Value::BigInt(BigInt::from(10))));
        assert!(!Value::BigInt(BigInt::from(10)).strict_equals(&Value::Number(10.0)));
    }

    #[test]
    fn bigint_loose_equals_number_by_mathematical_value() {
        let mut agent = Agent::new(crate::context::EngineOptions::default());
        assert!(Value::BigInt(BigInt::from(10)).loose_equals(&Value::Number(10.0), &mut agent).unwrap());
        assert!(!Value::BigInt(BigInt::from(10)).loose_equals(&Value::Number(10.5), &mut agent).unwrap());
    }

    #[test]
    fn bigint_to_boolean_is_falsy_only_at_zero() {
        assert!(!Value::BigInt(BigInt::from(0)).to_boolean());
        assert!(Value::BigInt(BigInt::from(-1)).to_boolean());
    }

    #[test]
    fn to_int32_wraps_per_spec() {
        assert_eq!(to_int32_bits(4294967296.0), 0);
        assert_eq!(to_int32_bits(2147483648.0), -2147483648);
        assert_eq!(to_int32_bits(f64::NAN), 0);
    }
}
