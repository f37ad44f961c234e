//! Operator semantics shared by the evaluator and the builtins.

use std::cmp::Ordering;

use crate::eval::{Exec, Unwind};
use crate::tree::{ArithmeticOp, ComparisonOp};
use crate::value::{range_len, ExceptionKind, Value};

/// Longest sequence a program may build before it gets a `MemoryError`.
pub const MAX_SEQUENCE: i64 = 10_000_000;

fn overflow() -> Unwind {
    Unwind::raise(ExceptionKind::OverflowError, "integer result out of range")
}

fn zero_division() -> Unwind {
    Unwind::raise(ExceptionKind::ZeroDivisionError, "integer division or modulo by zero")
}

/// `a // b`, rounding toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Exec<i64> {
    if b == 0 {
        return Err(zero_division());
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// `a % b`, taking the sign of the divisor.
pub fn floor_mod(a: i64, b: i64) -> Exec<i64> {
    if b == 0 {
        return Err(zero_division());
    }
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn int_pow(base: i64, exp: i64) -> Exec<i64> {
    if exp < 0 {
        return Err(Unwind::raise(ExceptionKind::ValueError, "negative exponents are not supported"));
    }
    let exp = u32::try_from(exp).map_err(|_| overflow())?;
    base.checked_pow(exp).ok_or_else(overflow)
}

fn repeat(items: &[Value], n: i64) -> Exec<Vec<Value>> {
    if n <= 0 || items.is_empty() {
        return Ok(Vec::new());
    }
    if (items.len() as i64).saturating_mul(n) > MAX_SEQUENCE {
        return Err(Unwind::raise(ExceptionKind::MemoryError, ""));
    }
    let mut out = Vec::with_capacity(items.len() * n as usize);
    for _ in 0..n {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn unsupported(op: &str, l: &Value, r: &Value) -> Unwind {
    Unwind::raise(
        ExceptionKind::TypeError,
        format!(
            "unsupported operand type(s) for {op}: '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ),
    )
}

pub fn binary(op: ArithmeticOp, l: &Value, r: &Value) -> Exec<Value> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        let n = match op {
            ArithmeticOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            ArithmeticOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
            ArithmeticOp::Mult => a.checked_mul(b).ok_or_else(overflow)?,
            ArithmeticOp::FloorDiv => floor_div(a, b)?,
            ArithmeticOp::Mod => floor_mod(a, b)?,
            ArithmeticOp::Pow => int_pow(a, b)?,
        };
        return Ok(Value::Int(n));
    }
    match (op, l, r) {
        (ArithmeticOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (ArithmeticOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (ArithmeticOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (ArithmeticOp::Mult, seq, n) | (ArithmeticOp::Mult, n, seq) if n.as_int().is_some() => {
            let count = n.as_int().unwrap_or(0);
            match seq {
                Value::Str(s) => {
                    let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                    let repeated = repeat(&chars, count)?;
                    Ok(Value::Str(repeated.iter().map(|c| c.to_string()).collect()))
                }
                Value::List(items) => Ok(Value::list(repeat(&items.borrow(), count)?)),
                Value::Tuple(items) => Ok(Value::Tuple(repeat(items, count)?)),
                _ => Err(unsupported(op.symbol(), l, r)),
            }
        }
        _ => Err(unsupported(op.symbol(), l, r)),
    }
}

pub fn negate(v: &Value) -> Exec<Value> {
    match v.as_int() {
        Some(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        None => Err(Unwind::raise(
            ExceptionKind::TypeError,
            format!("bad operand type for unary -: '{}'", v.type_name()),
        )),
    }
}

pub fn positive(v: &Value) -> Exec<Value> {
    match v.as_int() {
        Some(n) => Ok(Value::Int(n)),
        None => Err(Unwind::raise(
            ExceptionKind::TypeError,
            format!("bad operand type for unary +: '{}'", v.type_name()),
        )),
    }
}

pub fn order(op: &str, l: &Value, r: &Value) -> Exec<Ordering> {
    l.partial_order(r).ok_or_else(|| {
        Unwind::raise(
            ExceptionKind::TypeError,
            format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
        )
    })
}

pub fn compare(op: ComparisonOp, l: &Value, r: &Value) -> Exec<bool> {
    Ok(match op {
        ComparisonOp::Eq => l == r,
        ComparisonOp::NotEq => l != r,
        ComparisonOp::Lt => order(op.symbol(), l, r)? == Ordering::Less,
        ComparisonOp::LtE => order(op.symbol(), l, r)? != Ordering::Greater,
        ComparisonOp::Gt => order(op.symbol(), l, r)? == Ordering::Greater,
        ComparisonOp::GtE => order(op.symbol(), l, r)? != Ordering::Less,
        ComparisonOp::In => contains(r, l)?,
        ComparisonOp::NotIn => !contains(r, l)?,
        ComparisonOp::Is => l.is(r),
        ComparisonOp::IsNot => !l.is(r),
    })
}

pub fn contains(container: &Value, item: &Value) -> Exec<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v == item)),
        Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(Unwind::raise(
                ExceptionKind::TypeError,
                format!("'in <string>' requires string as left operand, not {}", other.type_name()),
            )),
        },
        Value::Range { start, step, .. } => Ok(match item.as_int() {
            Some(n) => {
                let offset = n as i128 - *start as i128;
                offset % *step as i128 == 0 && {
                    let k = offset / *step as i128;
                    k >= 0 && k < range_len(container) as i128
                }
            }
            None => false,
        }),
        other => Err(not_iterable(other)),
    }
}

fn not_iterable(v: &Value) -> Unwind {
    Unwind::raise(
        ExceptionKind::TypeError,
        format!("'{}' object is not iterable", v.type_name()),
    )
}

/// Iterator over the elements of an iterable value. Lists are iterated over
/// a snapshot taken when iteration starts.
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(it) => it.next(),
            ValueIter::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let v = *next;
                *next = match next.checked_add(*step) {
                    Some(n) => n,
                    None => *stop,
                };
                Some(Value::Int(v))
            }
        }
    }
}

pub fn iterate(v: &Value) -> Exec<ValueIter> {
    Ok(match v {
        Value::List(items) => ValueIter::Items(items.borrow().clone().into_iter()),
        Value::Tuple(items) => ValueIter::Items(items.clone().into_iter()),
        Value::Str(s) => ValueIter::Items(
            s.chars()
                .map(|c| Value::Str(c.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        Value::Range { start, stop, step } => ValueIter::Range { next: *start, stop: *stop, step: *step },
        other => return Err(not_iterable(other)),
    })
}

/// Materialize an iterable.
pub fn collect(v: &Value) -> Exec<Vec<Value>> {
    if range_len(v) > MAX_SEQUENCE {
        return Err(Unwind::raise(ExceptionKind::MemoryError, ""));
    }
    Ok(iterate(v)?.collect())
}

fn index_of(index: &Value, len: usize, what: &str) -> Exec<usize> {
    let i = index.as_int().ok_or_else(|| {
        Unwind::raise(
            ExceptionKind::TypeError,
            format!("{what} indices must be integers, not {}", index.type_name()),
        )
    })?;
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    if (0..len).contains(&i) {
        Ok(i as usize)
    } else {
        Err(Unwind::raise(ExceptionKind::IndexError, format!("{what} index out of range")))
    }
}

pub fn get_item(container: &Value, index: &Value) -> Exec<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = index_of(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => Ok(items[index_of(index, items.len(), "tuple")?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = index_of(index, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Range { start, step, .. } => {
            let i = index_of(index, range_len(container) as usize, "range object")?;
            Ok(Value::Int(start + step * i as i64))
        }
        other => Err(Unwind::raise(
            ExceptionKind::TypeError,
            format!("'{}' object is not subscriptable", other.type_name()),
        )),
    }
}

pub fn set_item(container: &Value, index: &Value, value: Value) -> Exec<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = index_of(index, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }
        other => Err(Unwind::raise(
            ExceptionKind::TypeError,
            format!("'{}' object does not support item assignment", other.type_name()),
        )),
    }
}
