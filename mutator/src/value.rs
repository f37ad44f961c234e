//! Runtime values of the subject language.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::tree::StmtId;

/// Handle to a top-level function of a loaded program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(pub(crate) StmtId);

/// Built-in exception classes, with their single-inheritance parent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    LookupError,
    IndexError,
    TypeError,
    ValueError,
    RuntimeError,
    RecursionError,
    NameError,
    UnboundLocalError,
    MemoryError,
    SyntaxError,
}

impl ExceptionKind {
    const ALL: [ExceptionKind; 14] = [
        Self::Exception,
        Self::ArithmeticError,
        Self::ZeroDivisionError,
        Self::OverflowError,
        Self::LookupError,
        Self::IndexError,
        Self::TypeError,
        Self::ValueError,
        Self::RuntimeError,
        Self::RecursionError,
        Self::NameError,
        Self::UnboundLocalError,
        Self::MemoryError,
        Self::SyntaxError,
    ];

    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Exception => None,
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            Self::IndexError => Some(Self::LookupError),
            Self::RecursionError => Some(Self::RuntimeError),
            Self::UnboundLocalError => Some(Self::NameError),
            _ => Some(Self::Exception),
        }
    }

    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut k = Some(self);
        while let Some(cur) = k {
            if cur == other {
                return true;
            }
            k = cur.parent();
        }
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::ArithmeticError => "ArithmeticError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::RuntimeError => "RuntimeError",
            Self::RecursionError => "RecursionError",
            Self::NameError => "NameError",
            Self::UnboundLocalError => "UnboundLocalError",
            Self::MemoryError => "MemoryError",
            Self::SyntaxError => "SyntaxError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A raised (or constructed) exception instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Range,
    Min,
    Max,
    Abs,
    Sum,
    List,
    Int,
    Bool,
    Str,
    Print,
}

impl Builtin {
    const ALL: [Builtin; 11] = [
        Self::Len,
        Self::Range,
        Self::Min,
        Self::Max,
        Self::Abs,
        Self::Sum,
        Self::List,
        Self::Int,
        Self::Bool,
        Self::Str,
        Self::Print,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Range => "range",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Sum => "sum",
            Self::List => "list",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Print => "print",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Lists are shared and mutable, like their Python counterparts.
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Vec<Value>),
    Range { start: i64, stop: i64, step: i64 },
    Function(FunctionId),
    Builtin(Builtin),
    ExceptionType(ExceptionKind),
    Exception(Exception),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::ExceptionType(_) => "type",
            Value::Exception(e) => e.kind.name(),
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Range { .. } => range_len(self) > 0,
            _ => true,
        }
    }

    /// `is` comparison. Lists compare by identity, immutable values by content.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            _ => false,
        }
    }

    /// Python `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => repr_str(s),
            Value::Exception(e) if e.message.is_empty() => format!("{}()", e.kind.name()),
            Value::Exception(e) => format!("{}({})", e.kind.name(), repr_str(&e.message)),
            other => other.to_string(),
        }
    }

    /// Lexicographic or numeric ordering, when the two values are orderable.
    pub fn partial_order(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_int(), other.as_int()) {
            return Some(a.cmp(&b));
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => seq_order(&a.borrow(), &b.borrow()),
            (Value::Tuple(a), Value::Tuple(b)) => seq_order(a, b),
            _ => None,
        }
    }
}

fn seq_order(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return x.partial_order(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

pub(crate) fn range_len(value: &Value) -> i64 {
    match *value {
        Value::Range { start, stop, step } => {
            let (lo, hi, step) = if step > 0 { (start, stop, step) } else { (stop, start, -step) };
            if lo >= hi {
                0
            } else {
                ((hi as i128 - lo as i128 - 1) / step as i128 + 1) as i64
            }
        }
        _ => 0,
    }
}

fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Structural equality: lists compare by contents, bools equal their integer values.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_int(), other.as_int()) {
            return a == b;
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (
                Value::Range { start: s1, step: t1, .. },
                Value::Range { start: s2, step: t2, .. },
            ) => {
                // ranges are equal when they produce the same sequence
                let len = range_len(self);
                len == range_len(other) && (len == 0 || (s1 == s2 && (len == 1 || t1 == t2)))
            }
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }
}

/// Python `str()`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, &items.borrow())?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    write!(f, "range({start}, {stop})")
                } else {
                    write!(f, "range({start}, {stop}, {step})")
                }
            }
            Value::Function(_) => f.write_str("<function>"),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::ExceptionType(k) => write!(f, "<class '{}'>", k.name()),
            Value::Exception(e) => f.write_str(&e.message),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&item.repr())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_hierarchy() {
        assert!(ExceptionKind::ZeroDivisionError.is_subclass_of(ExceptionKind::ArithmeticError));
        assert!(ExceptionKind::ZeroDivisionError.is_subclass_of(ExceptionKind::Exception));
        assert!(ExceptionKind::RecursionError.is_subclass_of(ExceptionKind::RuntimeError));
        assert!(!ExceptionKind::ValueError.is_subclass_of(ExceptionKind::TypeError));
        assert_eq!(ExceptionKind::from_name("IndexError"), Some(ExceptionKind::IndexError));
        assert_eq!(ExceptionKind::from_name("Foo"), None);
    }

    #[test]
    fn test_structural_list_equality() {
        let a = Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])]);
        let b = Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])]);
        assert_eq!(a, b);
        assert!(!a.is(&b));
        assert!(a.is(&a.clone()));
        assert_ne!(a, Value::Tuple(vec![Value::Int(1)]));
    }

    #[test]
    fn test_bools_are_ints() {
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::Bool(false).partial_order(&Value::Int(1)), Some(Ordering::Less));
        assert_ne!(Value::Str("1".into()), Value::Int(1));
    }

    #[test]
    fn test_display_and_repr() {
        let v = Value::list(vec![Value::Int(8), Value::Str("a'b".into()), Value::None]);
        assert_eq!(v.to_string(), "[8, \"a'b\", None]");
        assert_eq!(Value::Str("x".into()).repr(), "'x'");
        assert_eq!(Value::Str("x".into()).to_string(), "x");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        let e = Exception::new(ExceptionKind::ValueError, "bad");
        assert_eq!(e.to_string(), "ValueError: bad");
        assert_eq!(Value::Exception(e).repr(), "ValueError('bad')");
    }

    #[test]
    fn test_range_len() {
        assert_eq!(range_len(&Value::Range { start: 0, stop: 10, step: 3 }), 4);
        assert_eq!(range_len(&Value::Range { start: 10, stop: 0, step: -1 }), 10);
        assert_eq!(range_len(&Value::Range { start: 5, stop: 5, step: 1 }), 0);
        assert_eq!(
            Value::Range { start: 0, stop: 3, step: 1 },
            Value::Range { start: 0, stop: 3, step: 1 }
        );
    }

    #[test]
    fn test_lexicographic_order() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a.partial_order(&b), Some(Ordering::Less));
        assert_eq!(Value::Str("b".into()).partial_order(&Value::Str("a".into())), Some(Ordering::Greater));
        assert_eq!(Value::Str("b".into()).partial_order(&Value::Int(1)), None);
    }
}
