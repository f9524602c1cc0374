/*
 * ops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Operator semantics.

use super::builtins::leading_number;
use crate::artifact::ast::{BinaryOp, UnaryOp};
use crate::value::{Number, Value};
use std::cmp::Ordering;

/// Apply a non-short-circuit binary operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
        BinaryOp::Concat => Ok(Value::String(format!(
            "{}{}",
            left.to_output_string(),
            right.to_output_string()
        ))),
        BinaryOp::Eq => Ok(Value::Bool(left.loose_eq(right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.loose_eq(right))),
        BinaryOp::Identical => Ok(Value::Bool(identical(left, right))),
        BinaryOp::NotIdentical => Ok(Value::Bool(!identical(left, right))),
        BinaryOp::Lt => Ok(compare(left, right, Ordering::is_lt)),
        BinaryOp::Le => Ok(compare(left, right, Ordering::is_le)),
        BinaryOp::Gt => Ok(compare(left, right, Ordering::is_gt)),
        BinaryOp::Ge => Ok(compare(left, right, Ordering::is_ge)),
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, String> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Plus => Ok(operand_number(operand, "+")?.into_value()),
        UnaryOp::Neg => Ok(match operand_number(operand, "-")? {
            Number::Int(i) => i
                .checked_neg()
                .map_or(Value::Float(-(i as f64)), Value::Int),
            Number::Float(f) => Value::Float(-f),
        }),
    }
}

/// Strict equality (`===`): same type and same value.
pub fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| identical(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && identical(va, vb))
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> Value {
    Value::Bool(left.loose_cmp(right).is_some_and(test))
}

fn operand_number(value: &Value, op: &str) -> Result<Number, String> {
    match value {
        Value::String(s) => leading_number(s).ok_or_else(|| unsupported(value, op)),
        other => other.as_number().ok_or_else(|| unsupported(other, op)),
    }
}

fn unsupported(value: &Value, op: &str) -> String {
    format!("Unsupported operand type for {op}: {}", value.type_name())
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let symbol = op.symbol();
    let a = operand_number(left, symbol)?;
    let b = operand_number(right, symbol)?;

    if op == BinaryOp::Mod {
        let (x, y) = (as_int(a), as_int(b));
        if y == 0 {
            return Err("Modulo by zero".to_string());
        }
        return Ok(Value::Int(x.wrapping_rem(y)));
    }

    if op == BinaryOp::Div {
        if b.as_f64() == 0.0 {
            return Err("Division by zero".to_string());
        }
        if let (Number::Int(x), Number::Int(y)) = (a, b) {
            if x.checked_rem(y) == Some(0) {
                if let Some(q) = x.checked_div(y) {
                    return Ok(Value::Int(q));
                }
            }
        }
        return Ok(Value::Float(a.as_f64() / b.as_f64()));
    }

    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            _ => x.checked_mul(y),
        };
        if let Some(n) = exact {
            return Ok(Value::Int(n));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    Ok(Value::Float(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        _ => x * y,
    }))
}

fn as_int(n: Number) -> i64 {
    match n {
        Number::Int(i) => i,
        Number::Float(f) => f as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(op: BinaryOp, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, String> {
        binary(op, &a.into(), &b.into())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(op(BinaryOp::Add, 1i64, 2i64), Ok(Value::Int(3)));
        assert_eq!(op(BinaryOp::Add, "2", 1.5), Ok(Value::Float(3.5)));
        assert_eq!(op(BinaryOp::Div, 6i64, 3i64), Ok(Value::Int(2)));
        assert_eq!(op(BinaryOp::Div, 7i64, 2i64), Ok(Value::Float(3.5)));
        assert_eq!(op(BinaryOp::Mod, 7i64, 3i64), Ok(Value::Int(1)));
        assert_eq!(op(BinaryOp::Mul, i64::MAX, 2i64), Ok(Value::Float(i64::MAX as f64 * 2.0)));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(op(BinaryOp::Div, 1i64, 0i64).is_err());
        assert!(op(BinaryOp::Mod, 1i64, 0i64).is_err());
        assert!(op(BinaryOp::Add, "abc", 1i64).is_err());
        assert!(binary(BinaryOp::Add, &Value::List(vec![]), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(op(BinaryOp::Gt, 2i64, 1i64), Ok(Value::Bool(true)));
        assert_eq!(op(BinaryOp::Eq, "1", 1i64), Ok(Value::Bool(true)));
        assert_eq!(op(BinaryOp::Identical, "1", 1i64), Ok(Value::Bool(false)));
        assert_eq!(op(BinaryOp::Le, "a", "b"), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_concat_and_unary() {
        assert_eq!(op(BinaryOp::Concat, "n=", 1.5), Ok(Value::from("n=1.5")));
        assert_eq!(unary(UnaryOp::Neg, &Value::from("3")), Ok(Value::Int(-3)));
        assert_eq!(unary(UnaryOp::Not, &Value::from("0")), Ok(Value::Bool(true)));
    }
}
