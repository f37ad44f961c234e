use std::cmp::Ordering;

use crate::eval::{Exec, Unwind};
use crate::ops;
use crate::tree::ArithmeticOp;
use crate::value::{range_len, Builtin, Exception, ExceptionKind, Value};

/// Names resolvable after module globals.
pub fn lookup_builtin(name: &str) -> Option<Value> {
    if let Some(b) = Builtin::from_name(name) {
        return Some(Value::Builtin(b));
    }
    ExceptionKind::from_name(name).map(Value::ExceptionType)
}

fn type_error(message: impl Into<String>) -> Unwind {
    Unwind::raise(ExceptionKind::TypeError, message)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Exec<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max { format!("{min}") } else { format!("{min} to {max}") };
        return Err(type_error(format!(
            "{name}() takes {expected} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, v: &Value) -> Exec<i64> {
    v.as_int().ok_or_else(|| {
        type_error(format!("'{}' object cannot be interpreted as an integer in {name}()", v.type_name()))
    })
}

pub fn call_builtin(builtin: Builtin, args: Vec<Value>, stdout: &mut String) -> Exec<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            let n = match &args[0] {
                Value::List(items) => items.borrow().len() as i64,
                Value::Tuple(items) => items.len() as i64,
                Value::Str(s) => s.chars().count() as i64,
                r @ Value::Range { .. } => range_len(r),
                other => {
                    return Err(type_error(format!("object of type '{}' has no len()", other.type_name())))
                }
            };
            Ok(Value::Int(n))
        }
        Builtin::Range => {
            arity(name, &args, 1, 3)?;
            let ints = args.iter().map(|a| int_arg(name, a)).collect::<Exec<Vec<i64>>>()?;
            let (start, stop, step) = match *ints.as_slice() {
                [] => (0, 0, 1),
                [stop] => (0, stop, 1),
                [start, stop] => (start, stop, 1),
                [start, stop, step, ..] => (start, stop, step),
            };
            if step == 0 {
                return Err(Unwind::raise(ExceptionKind::ValueError, "range() arg 3 must not be zero"));
            }
            Ok(Value::Range { start, stop, step })
        }
        Builtin::Min => extreme(name, args, Ordering::Less),
        Builtin::Max => extreme(name, args, Ordering::Greater),
        Builtin::Abs => {
            arity(name, &args, 1, 1)?;
            match args[0].as_int() {
                Some(n) => n
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| Unwind::raise(ExceptionKind::OverflowError, "integer result out of range")),
                None => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    args[0].type_name()
                ))),
            }
        }
        Builtin::Sum => {
            arity(name, &args, 1, 2)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            if let Value::Str(_) = total {
                return Err(type_error("sum() can't sum strings [use ''.join(seq) instead]"));
            }
            for item in ops::iterate(&args[0])? {
                total = ops::binary(ArithmeticOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::List => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                Some(v) => Ok(Value::list(ops::collect(v)?)),
                None => Ok(Value::list(Vec::new())),
            }
        }
        Builtin::Int => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Str(s)) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
                    Unwind::raise(
                        ExceptionKind::ValueError,
                        format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()),
                    )
                }),
                Some(v) => v.as_int().map(Value::Int).ok_or_else(|| {
                    type_error(format!(
                        "int() argument must be a string or a number, not '{}'",
                        v.type_name()
                    ))
                }),
            }
        }
        Builtin::Bool => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }
        Builtin::Str => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(|v| v.to_string()).unwrap_or_default()))
        }
        Builtin::Print => {
            let line: Vec<String> = args.iter().map(|v| v.to_string()).collect();
            stdout.push_str(&line.join(" "));
            stdout.push('\n');
            Ok(Value::None)
        }
    }
}

/// `min`/`max`: the first element that no later element beats in direction `want`.
fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> Exec<Value> {
    let items = match args.len() {
        0 => return Err(type_error(format!("{name} expected at least 1 argument, got 0"))),
        1 => ops::collect(&args[0])?,
        _ => args,
    };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return Err(Unwind::raise(
            ExceptionKind::ValueError,
            format!("{name}() arg is an empty sequence"),
        ));
    };
    let symbol = if want == Ordering::Less { "<" } else { ">" };
    for item in items {
        if ops::order(symbol, &item, &best)? == want {
            best = item;
        }
    }
    Ok(best)
}

/// Calling an exception class builds an instance; the first argument is the message.
pub fn instantiate(kind: ExceptionKind, args: &[Value]) -> Value {
    let message = match args {
        [] => String::new(),
        [one] => one.to_string(),
        many => Value::Tuple(many.to_vec()).to_string(),
    };
    Value::Exception(Exception::new(kind, message))
}
