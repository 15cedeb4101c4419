//! Runtime values: the tagged value type, heap strings and numeric rules.

use std::fmt;
use std::rc::Rc;

/// An immutable heap string with its hash computed once at allocation.
#[derive(Debug)]
pub struct HeapString {
    chars: Box<str>,
    hash: u32,
}

impl HeapString {
    pub fn new(chars: impl Into<Box<str>>) -> Self {
        let chars = chars.into();
        let hash = hash_str(&chars);
        Self { chars, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl fmt::Display for HeapString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chars)
    }
}

/// Shared handle to a heap string. Interned handles compare by address.
pub type ObjectRef = Rc<HeapString>;

/// FNV-1a, 32-bit.
pub fn hash_str(s: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in s.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Byte(i8),
    Int(i32),
    Float(f32),
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Object(_) => "string",
        }
    }

    /// Only `nil` and `false` are falsey.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Value::Byte(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Byte(b) => Some(Number::Byte(*b)),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }

    /// Tagged form used by the execution tracer: `<int|5>`.
    pub fn tagged(&self) -> String {
        format!("<{}|{}>", self.type_name(), self)
    }
}

/// Strict tag equality: different variants are never equal, objects compare
/// by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Object(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i8> for Value {
    fn from(b: i8) -> Self {
        Value::Byte(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Byte(b) => Value::Byte(b),
            Number::Int(n) => Value::Int(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}

/// The number-like subset of `Value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Byte(i8),
    Int(i32),
    Float(f32),
}

/// Width a mixed-variant operation is computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Width {
    Byte,
    Int,
    Float,
}

impl Number {
    fn width(self) -> Width {
        match self {
            Number::Byte(_) => Width::Byte,
            Number::Int(_) => Width::Int,
            Number::Float(_) => Width::Float,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Byte(b) => b as f64,
            Number::Int(n) => n as f64,
            Number::Float(n) => n as f64,
        }
    }

    fn to_f32(self) -> f32 {
        match self {
            Number::Byte(b) => b as f32,
            Number::Int(n) => n as f32,
            Number::Float(n) => n,
        }
    }

    fn to_i32(self) -> i32 {
        match self {
            Number::Byte(b) => b as i32,
            Number::Int(n) => n,
            Number::Float(n) => n as i32,
        }
    }

    fn to_i8(self) -> i8 {
        match self {
            Number::Byte(b) => b,
            Number::Int(n) => n as i8,
            Number::Float(n) => n as i8,
        }
    }

    /// Convert into the variant of `like`.
    fn retag(self, like: Number) -> Number {
        match like.width() {
            Width::Byte => Number::Byte(self.to_i8()),
            Width::Int => Number::Int(self.to_i32()),
            Width::Float => Number::Float(self.to_f32()),
        }
    }

    pub fn negate(self) -> Number {
        match self {
            Number::Byte(b) => Number::Byte(b.wrapping_neg()),
            Number::Int(n) => Number::Int(n.wrapping_neg()),
            Number::Float(n) => Number::Float(-n),
        }
    }

    /// Add `delta` (+1 / -1) without changing the variant.
    pub fn step(self, delta: i8) -> Number {
        match self {
            Number::Byte(b) => Number::Byte(b.wrapping_add(delta)),
            Number::Int(n) => Number::Int(n.wrapping_add(delta as i32)),
            Number::Float(n) => Number::Float(n + delta as f32),
        }
    }
}

/// Binary operators sharing the numeric promotion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Greater,
    Less,
}

/// Failure of a numeric operation, mapped to a runtime error by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    DivisionByZero,
}

enum Outcome {
    Number(Number),
    Bool(bool),
}

macro_rules! integer_op {
    ($op:expr, $a:expr, $b:expr, $wrap:ident) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Add => Outcome::Number($wrap(a.wrapping_add(b))),
            BinaryOp::Subtract => Outcome::Number($wrap(a.wrapping_sub(b))),
            BinaryOp::Multiply => Outcome::Number($wrap(a.wrapping_mul(b))),
            BinaryOp::Divide => {
                if b == 0 {
                    return Err(ArithError::DivisionByZero);
                }
                Outcome::Number($wrap(a.wrapping_div(b)))
            }
            BinaryOp::Modulo => {
                if b == 0 {
                    return Err(ArithError::DivisionByZero);
                }
                Outcome::Number($wrap(a.wrapping_rem(b)))
            }
            BinaryOp::Greater => Outcome::Bool(a > b),
            BinaryOp::Less => Outcome::Bool(a < b),
        }
    }};
}

/// Apply `op` to two numbers.
///
/// The computation happens in the widest of the two operand widths
/// (float > int > byte). Arithmetic results are then tagged with the variant
/// of the left operand `a`; relational results are always `Bool`.
pub fn binary_op(op: BinaryOp, a: Number, b: Number) -> Result<Value, ArithError> {
    let width = a.width().max(b.width());
    let outcome = match width {
        Width::Float => {
            let (x, y) = (a.to_f32(), b.to_f32());
            match op {
                BinaryOp::Add => Outcome::Number(Number::Float(x + y)),
                BinaryOp::Subtract => Outcome::Number(Number::Float(x - y)),
                BinaryOp::Multiply => Outcome::Number(Number::Float(x * y)),
                BinaryOp::Divide => Outcome::Number(Number::Float(x / y)),
                BinaryOp::Modulo => Outcome::Number(Number::Float(x % y)),
                BinaryOp::Greater => Outcome::Bool(x > y),
                BinaryOp::Less => Outcome::Bool(x < y),
            }
        }
        Width::Int => integer_op!(op, a.to_i32(), b.to_i32(), int),
        Width::Byte => integer_op!(op, a.to_i8(), b.to_i8(), byte),
    };

    Ok(match outcome {
        Outcome::Bool(result) => Value::Bool(result),
        Outcome::Number(result) => result.retag(a).into(),
    })
}

#[inline]
fn int(n: i32) -> Number {
    Number::Int(n)
}

#[inline]
fn byte(b: i8) -> Number {
    Number::Byte(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(op: BinaryOp, a: Value, b: Value) -> Value {
        binary_op(op, a.as_number().unwrap(), b.as_number().unwrap()).unwrap()
    }

    #[test]
    fn test_result_follows_left_operand() {
        assert_eq!(
            apply(BinaryOp::Add, Value::Byte(2), Value::Int(3)),
            Value::Byte(5)
        );
        assert_eq!(
            apply(BinaryOp::Add, Value::Int(3), Value::Byte(2)),
            Value::Int(5)
        );
    }

    #[test]
    fn test_float_promotion_then_retag() {
        // computed as 3.5f32, tagged back to int
        assert_eq!(
            apply(BinaryOp::Multiply, Value::Int(7), Value::Float(0.5)),
            Value::Int(3)
        );
        assert_eq!(
            apply(BinaryOp::Add, Value::Float(0.5), Value::Int(2)),
            Value::Float(2.5)
        );
        // int / float is computed in float, so no truncation before retagging
        assert_eq!(
            apply(BinaryOp::Divide, Value::Int(5), Value::Float(0.5)),
            Value::Int(10)
        );
    }

    #[test]
    fn test_comparison_always_bool() {
        assert_eq!(
            apply(BinaryOp::Greater, Value::Byte(3), Value::Float(2.5)),
            Value::Bool(true)
        );
        assert_eq!(
            apply(BinaryOp::Less, Value::Int(300), Value::Byte(100)),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_byte_arithmetic_wraps() {
        assert_eq!(
            apply(BinaryOp::Add, Value::Byte(127), Value::Byte(1)),
            Value::Byte(-128)
        );
        assert_eq!(
            apply(BinaryOp::Add, Value::Byte(100), Value::Int(100)),
            Value::Byte(-56)
        );
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = binary_op(BinaryOp::Divide, Number::Int(1), Number::Byte(0));
        assert_eq!(err, Err(ArithError::DivisionByZero));
        let err = binary_op(BinaryOp::Modulo, Number::Byte(1), Number::Byte(0));
        assert_eq!(err, Err(ArithError::DivisionByZero));
        let inf = binary_op(BinaryOp::Divide, Number::Float(1.0), Number::Int(0)).unwrap();
        assert_eq!(inf, Value::Float(f32::INFINITY));
    }

    #[test]
    fn test_modulo() {
        assert_eq!(
            apply(BinaryOp::Modulo, Value::Int(17), Value::Int(5)),
            Value::Int(2)
        );
        assert_eq!(
            apply(BinaryOp::Modulo, Value::Float(7.5), Value::Int(2)),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_strict_equality() {
        assert_ne!(Value::Byte(5), Value::Int(5));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Float(2.5), Value::Float(2.5));
        let a = Rc::new(HeapString::new("x"));
        let b = Rc::new(HeapString::new("x"));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        // same content, different allocation: only interning makes these equal
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Nil.is_falsey());
        assert!(Value::Bool(false).is_falsey());
        assert!(!Value::Int(0).is_falsey());
        assert!(!Value::Object(Rc::new(HeapString::new(""))).is_falsey());
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        assert_eq!(Value::Int(4).as_int(), Some(4));
        assert_eq!(Value::Int(4).as_byte(), None);
        assert_eq!(Value::Byte(4).as_int(), None);
        assert_eq!(Value::Float(1.0).as_bool(), None);
        assert!(Value::Nil.as_object().is_none());
    }

    #[test]
    fn test_negate_and_step_preserve_variant() {
        assert_eq!(Value::from(Number::Byte(3).negate()), Value::Byte(-3));
        assert_eq!(Value::from(Number::Float(1.5).negate()), Value::Float(-1.5));
        assert_eq!(Value::from(Number::Int(i32::MAX).step(1)), Value::Int(i32::MIN));
        assert_eq!(Value::from(Number::Byte(0).step(-1)), Value::Byte(-1));
    }

    #[test]
    fn test_hash_matches_fnv1a() {
        assert_eq!(hash_str(""), 2166136261);
        assert_eq!(hash_str("a"), 0xe40c292c);
        assert_eq!(HeapString::new("a").hash(), hash_str("a"));
    }

    #[test]
    fn test_tagged_display() {
        assert_eq!(Value::Int(5).tagged(), "<int|5>");
        assert_eq!(Value::Nil.tagged(), "<nil|nil>");
        assert_eq!(Value::Byte(-2).to_string(), "-2");
    }
}
