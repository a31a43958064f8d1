//! Operator semantics.
//!
//! Template expressions follow the loose typing web templates are written
//! against: `+` concatenates as soon as a string is involved, comparisons
//! coerce, `&&`/`||` return the deciding operand. Short-circuiting and the
//! conditional operator are handled by the parser, which only evaluates the
//! operands it needs; everything else lands here.

use super::token::Operator;
use crate::value::{format_number, Value};

/// Apply a prefix operator.
pub fn unary(op: Operator, operand: &Value) -> Value {
    match op {
        Operator::Not => Value::Bool(!operand.truthy()),
        Operator::BitNot => Value::Number(f64::from(!to_int32(operand))),
        Operator::UnaryPlus => Value::Number(operand.to_number()),
        Operator::UnaryMinus => Value::Number(-operand.to_number()),
        _ => Value::Undefined,
    }
}

/// Apply a strict binary operator. `&&`, `||` and `?:` never reach this.
pub fn binary(op: Operator, left: &Value, right: &Value) -> Value {
    match op {
        Operator::Add => add(left, right),
        Operator::Sub => Value::Number(left.to_number() - right.to_number()),
        Operator::Mul => Value::Number(left.to_number() * right.to_number()),
        Operator::Div => Value::Number(left.to_number() / right.to_number()),
        Operator::Rem => Value::Number(left.to_number() % right.to_number()),
        Operator::Shl => Value::Number(f64::from(
            to_int32(left).wrapping_shl(to_uint32(right) & 31),
        )),
        Operator::Shr => Value::Number(f64::from(to_int32(left) >> (to_uint32(right) & 31))),
        Operator::UShr => Value::Number(f64::from(to_uint32(left) >> (to_uint32(right) & 31))),
        Operator::BitAnd => Value::Number(f64::from(to_int32(left) & to_int32(right))),
        Operator::BitXor => Value::Number(f64::from(to_int32(left) ^ to_int32(right))),
        Operator::BitOr => Value::Number(f64::from(to_int32(left) | to_int32(right))),
        Operator::Lt => compare(left, right, |o| o.is_lt()),
        Operator::Le => compare(left, right, |o| o.is_le()),
        Operator::Gt => compare(left, right, |o| o.is_gt()),
        Operator::Ge => compare(left, right, |o| o.is_ge()),
        Operator::Eq => Value::Bool(loose_eq(left, right)),
        Operator::Ne => Value::Bool(!loose_eq(left, right)),
        Operator::StrictEq => Value::Bool(left.same(right)),
        Operator::StrictNe => Value::Bool(!left.same(right)),
        Operator::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        Operator::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        Operator::Not
        | Operator::BitNot
        | Operator::UnaryPlus
        | Operator::UnaryMinus
        | Operator::Conditional => Value::Undefined,
    }
}

fn add(left: &Value, right: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(left) || stringy(right) {
        Value::from(format!("{}{}", left, right))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(left: &Value, right: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.map(test).unwrap_or(false))
}

/// `==`: `null` equals `undefined`, numbers, strings and booleans coerce to
/// numbers, everything else compares by identity.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => left.to_number() == right.to_number(),
        _ => left.same(right),
    }
}

/// The property name a computed index resolves to.
pub fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

fn to_uint32(value: &Value) -> u32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn to_int32(value: &Value) -> i32 {
    to_uint32(value) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn addition_concatenates_strings() {
        assert_eq!(binary(Operator::Add, &num(1.0), &num(2.0)), num(3.0));
        assert_eq!(binary(Operator::Add, &Value::from("a"), &num(1.0)), Value::from("a1"));
        assert_eq!(binary(Operator::Add, &num(1.5), &Value::from("")), Value::from("1.5"));
        assert!(binary(Operator::Add, &num(1.0), &Value::Undefined).to_number().is_nan());
    }

    #[test]
    fn arithmetic_coerces() {
        assert_eq!(binary(Operator::Mul, &Value::from("3"), &num(2.0)), num(6.0));
        assert_eq!(binary(Operator::Rem, &num(-7.0), &num(3.0)), num(-1.0));
        assert_eq!(binary(Operator::Div, &num(1.0), &num(0.0)), num(f64::INFINITY));
    }

    #[test]
    fn bitwise_wraps_to_32_bits() {
        assert_eq!(binary(Operator::BitOr, &num(4_294_967_297.0), &num(0.0)), num(1.0));
        assert_eq!(binary(Operator::UShr, &num(-1.0), &num(0.0)), num(4_294_967_295.0));
        assert_eq!(binary(Operator::Shr, &num(-8.0), &num(1.0)), num(-4.0));
        assert_eq!(binary(Operator::Shl, &num(1.0), &num(33.0)), num(2.0));
        assert_eq!(unary(Operator::BitNot, &num(0.0)), num(-1.0));
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(Operator::Lt, &Value::from("a"), &Value::from("b")), Value::Bool(true));
        assert_eq!(binary(Operator::Lt, &Value::from("10"), &num(9.0)), Value::Bool(false));
        assert_eq!(binary(Operator::Ge, &Value::Undefined, &num(0.0)), Value::Bool(false));
    }

    #[test]
    fn loose_and_strict_equality() {
        assert!(loose_eq(&Value::Null, &Value::Undefined));
        assert!(loose_eq(&Value::from("1"), &num(1.0)));
        assert!(loose_eq(&Value::Bool(true), &num(1.0)));
        assert!(!loose_eq(&Value::Null, &num(0.0)));
        assert_eq!(binary(Operator::StrictEq, &Value::from("1"), &num(1.0)), Value::Bool(false));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(binary(Operator::Or, &Value::from(""), &Value::from("x")), Value::from("x"));
        assert_eq!(binary(Operator::And, &num(0.0), &Value::from("x")), num(0.0));
        assert_eq!(unary(Operator::Not, &Value::from("")), Value::Bool(true));
    }

    #[test]
    fn property_keys() {
        assert_eq!(property_key(&num(2.0)), "2");
        assert_eq!(property_key(&Value::from("name")), "name");
        assert_eq!(property_key(&Value::Bool(true)), "true");
    }
}
