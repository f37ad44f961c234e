//! Rendering a `Program` back to source text.

use crate::tree::*;

const INDENT: &str = "    ";

// Binding strength, loosest first.
const PREC_TUPLE: u8 = 0;
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ARITH: u8 = 5;
const PREC_TERM: u8 = 6;
const PREC_UNARY: u8 = 7;
const PREC_POW: u8 = 8;
const PREC_POSTFIX: u8 = 9;
const PREC_ATOM: u8 = 10;

pub struct Emitter {
    indent: usize,
    output: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::new(),
        }
    }

    fn emit_inline(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// Start a new line at the current indentation.
    fn emit_block(&mut self, s: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        for _ in 0..self.indent {
            self.output.push_str(INDENT);
        }
        self.output.push_str(s);
    }

    fn blank_line(&mut self) {
        self.output.push('\n');
    }

    fn enter_block(&mut self) {
        self.indent += 1
    }

    fn exit_block(&mut self) {
        self.indent -= 1
    }

    pub fn emit(mut self) -> String {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emittable {
    fn emit(&self, e: &mut Emitter, program: &Program);
}

impl Emittable for StmtId {
    fn emit(&self, e: &mut Emitter, program: &Program) {
        emit_stmt(e, program, *self);
    }
}

impl Emittable for Program {
    fn emit(&self, e: &mut Emitter, program: &Program) {
        let mut prev_def = false;
        for (i, &id) in self.body.iter().enumerate() {
            let is_def = matches!(self.stmt(id).kind, StmtKind::FunctionDef { .. });
            if i > 0 && (is_def || prev_def) {
                e.blank_line();
            }
            id.emit(e, program);
            prev_def = is_def;
        }
    }
}

impl Program {
    /// Canonical source text for the whole program.
    pub fn emit(&self) -> String {
        let mut e = Emitter::new();
        Emittable::emit(self, &mut e, self);
        e.emit()
    }

    /// First line of a statement's source, without indentation.
    pub fn stmt_source(&self, id: StmtId) -> String {
        let mut e = Emitter::new();
        emit_stmt(&mut e, self, id);
        e.output.lines().next().unwrap_or_default().trim().to_string()
    }

    /// Source text of a single expression.
    pub fn expr_source(&self, id: ExprId) -> String {
        let mut out = String::new();
        write_expr(&mut out, self, id, PREC_TUPLE);
        out
    }
}

fn emit_body(e: &mut Emitter, program: &Program, body: &[StmtId]) {
    e.enter_block();
    if body.is_empty() {
        e.emit_block("pass");
    }
    for id in body {
        id.emit(e, program);
    }
    e.exit_block();
}

fn emit_else(e: &mut Emitter, program: &Program, orelse: &[StmtId]) {
    if !orelse.is_empty() {
        e.emit_block("else:");
        emit_body(e, program, orelse);
    }
}

fn emit_stmt(e: &mut Emitter, program: &Program, id: StmtId) {
    let src = |expr: ExprId| program.expr_source(expr);
    match &program.stmt(id).kind {
        StmtKind::FunctionDef { name, params, body } => {
            let params: Vec<&str> = params.iter().map(|p| program.from_sym(*p)).collect();
            e.emit_block(&format!("def {}({}):", program.from_sym(*name), params.join(", ")));
            emit_body(e, program, body);
        }
        StmtKind::Return(value) => match value {
            Some(v) => e.emit_block(&format!("return {}", src(*v))),
            None => e.emit_block("return"),
        },
        StmtKind::Raise(value) => match value {
            Some(v) => e.emit_block(&format!("raise {}", src(*v))),
            None => e.emit_block("raise"),
        },
        StmtKind::Assign { targets, value } => {
            e.emit_block("");
            for t in targets {
                e.emit_inline(&src(*t));
                e.emit_inline(" = ");
            }
            e.emit_inline(&src(*value));
        }
        StmtKind::AnnAssign { target, annotation, value } => {
            e.emit_block(&format!("{}: {}", src(*target), src(*annotation)));
            if let Some(v) = value {
                e.emit_inline(&format!(" = {}", src(*v)));
            }
        }
        StmtKind::AugAssign { target, op, value } => {
            e.emit_block(&format!("{} {}= {}", src(*target), op.symbol(), src(*value)));
        }
        StmtKind::Expr(value) => e.emit_block(&src(*value)),
        StmtKind::If { test, body, orelse } => {
            e.emit_block(&format!("if {}:", src(*test)));
            emit_body(e, program, body);
            emit_elif_chain(e, program, orelse);
        }
        StmtKind::While { test, body, orelse } => {
            e.emit_block(&format!("while {}:", src(*test)));
            emit_body(e, program, body);
            emit_else(e, program, orelse);
        }
        StmtKind::For { target, iter, body, orelse } => {
            e.emit_block(&format!("for {} in {}:", src(*target), src(*iter)));
            emit_body(e, program, body);
            emit_else(e, program, orelse);
        }
        StmtKind::Try { body, handlers, orelse, finalbody } => {
            e.emit_block("try:");
            emit_body(e, program, body);
            for h in handlers {
                let mut header = String::from("except");
                if let Some(t) = h.type_ {
                    header.push(' ');
                    header.push_str(&src(t));
                }
                if let Some(n) = h.name {
                    header.push_str(" as ");
                    header.push_str(program.from_sym(n));
                }
                header.push(':');
                e.emit_block(&header);
                emit_body(e, program, &h.body);
            }
            emit_else(e, program, orelse);
            if !finalbody.is_empty() {
                e.emit_block("finally:");
                emit_body(e, program, finalbody);
            }
        }
        StmtKind::Pass => e.emit_block("pass"),
        StmtKind::Break => e.emit_block("break"),
        StmtKind::Continue => e.emit_block("continue"),
    }
}

/// `else:` holding a lone `if` is written back as `elif`.
fn emit_elif_chain(e: &mut Emitter, program: &Program, orelse: &[StmtId]) {
    if let [only] = orelse {
        if let StmtKind::If { test, body, orelse } = &program.stmt(*only).kind {
            e.emit_block(&format!("elif {}:", program.expr_source(*test)));
            emit_body(e, program, body);
            emit_elif_chain(e, program, orelse);
            return;
        }
    }
    emit_else(e, program, orelse);
}

fn precedence(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Tuple(elts) if !elts.is_empty() => PREC_TUPLE,
        ExprKind::Logical { op: LogicalOp::Or, .. } => PREC_OR,
        ExprKind::Logical { op: LogicalOp::And, .. } => PREC_AND,
        ExprKind::Unary { op: UnaryOp::Not, .. } => PREC_NOT,
        ExprKind::Comparison { .. } => PREC_CMP,
        ExprKind::Arithmetic { op, .. } => arithmetic_precedence(*op),
        ExprKind::Unary { .. } => PREC_UNARY,
        ExprKind::Call { .. } | ExprKind::Subscript { .. } => PREC_POSTFIX,
        ExprKind::Constant(Constant::Int(i)) if *i < 0 => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

fn arithmetic_precedence(op: ArithmeticOp) -> u8 {
    match op {
        ArithmeticOp::Add | ArithmeticOp::Sub => PREC_ARITH,
        ArithmeticOp::Mult | ArithmeticOp::FloorDiv | ArithmeticOp::Mod => PREC_TERM,
        ArithmeticOp::Pow => PREC_POW,
    }
}

fn write_expr(out: &mut String, program: &Program, id: ExprId, min_prec: u8) {
    let kind = &program.expr(id).kind;
    let parens = precedence(kind) < min_prec;
    if parens {
        out.push('(');
    }
    match kind {
        ExprKind::Name(sym) => out.push_str(program.from_sym(*sym)),
        ExprKind::Constant(c) => write_constant(out, c),
        ExprKind::Arithmetic { op, lhs, rhs } => {
            let prec = arithmetic_precedence(*op);
            let (lhs_prec, rhs_prec) = match op {
                ArithmeticOp::Pow => (PREC_POSTFIX, PREC_UNARY),
                _ => (prec, prec + 1),
            };
            write_expr(out, program, *lhs, lhs_prec);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_expr(out, program, *rhs, rhs_prec);
        }
        ExprKind::Unary { op, operand } => {
            let (text, prec) = match op {
                UnaryOp::Not => ("not ", PREC_NOT),
                UnaryOp::Neg => ("-", PREC_UNARY),
                UnaryOp::Pos => ("+", PREC_UNARY),
            };
            out.push_str(text);
            write_expr(out, program, *operand, prec);
        }
        ExprKind::Logical { op, values } => {
            let (sep, prec) = match op {
                LogicalOp::Or => (" or ", PREC_OR),
                LogicalOp::And => (" and ", PREC_AND),
            };
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(sep);
                }
                write_expr(out, program, *v, prec + 1);
            }
        }
        ExprKind::Comparison { lhs, ops, comparators } => {
            write_expr(out, program, *lhs, PREC_CMP + 1);
            for (op, rhs) in ops.iter().zip(comparators) {
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                write_expr(out, program, *rhs, PREC_CMP + 1);
            }
        }
        ExprKind::Call { func, args } => {
            write_expr(out, program, *func, PREC_POSTFIX);
            out.push('(');
            write_list(out, program, args);
            out.push(')');
        }
        ExprKind::Subscript { value, index } => {
            write_expr(out, program, *value, PREC_POSTFIX);
            out.push('[');
            write_expr(out, program, *index, PREC_TUPLE);
            out.push(']');
        }
        ExprKind::List(elts) => {
            out.push('[');
            write_list(out, program, elts);
            out.push(']');
        }
        ExprKind::Tuple(elts) => {
            if elts.is_empty() {
                out.push_str("()");
            } else {
                write_list(out, program, elts);
                if elts.len() == 1 {
                    out.push(',');
                }
            }
        }
    }
    if parens {
        out.push(')');
    }
}

fn write_list(out: &mut String, program: &Program, items: &[ExprId]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, program, *item, PREC_OR);
    }
}

fn write_constant(out: &mut String, c: &Constant) {
    match c {
        Constant::None => out.push_str("None"),
        Constant::Bool(true) => out.push_str("True"),
        Constant::Bool(false) => out.push_str("False"),
        Constant::Int(i) => out.push_str(&i.to_string()),
        Constant::Str(s) => {
            out.push('\'');
            for ch in s.chars() {
                match ch {
                    '\\' => out.push_str("\\\\"),
                    '\'' => out.push_str("\\'"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    '\0' => out.push_str("\\0"),
                    c => out.push(c),
                }
            }
            out.push('\'');
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    fn roundtrip(src: &str) -> String {
        parse(src).unwrap().emit()
    }

    #[test]
    fn test_emits_canonical_indentation() {
        let out = roundtrip("def f02(c,d):\n        if c <= d:\n                return 123\n        else:\n                return 456\n");
        assert_eq!(
            out,
            "def f02(c, d):\n    if c <= d:\n        return 123\n    else:\n        return 456\n"
        );
    }

    #[test]
    fn test_blank_line_between_functions() {
        let out = roundtrip("def a():\n    return 1\ndef b():\n    return 2\n");
        assert_eq!(out, "def a():\n    return 1\n\ndef b():\n    return 2\n");
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        assert_eq!(roundtrip("x = (result * 2) + 1\n"), "x = result * 2 + 1\n");
        assert_eq!(roundtrip("x = a - (b - c)\n"), "x = a - (b - c)\n");
        assert_eq!(roundtrip("x = (a + b) * c\n"), "x = (a + b) * c\n");
        assert_eq!(roundtrip("x = 2 ** 3 ** 2\n"), "x = 2 ** 3 ** 2\n");
        assert_eq!(roundtrip("x = (-2) ** 2\n"), "x = (-2) ** 2\n");
        assert_eq!(roundtrip("x = not (a and b)\n"), "x = not (a and b)\n");
        assert_eq!(roundtrip("x = (a < b) == c\n"), "x = (a < b) == c\n");
    }

    #[test]
    fn test_tuples_and_subscripts() {
        let src = "arr[j], arr[j + 1] = arr[j + 1], arr[j]\n";
        assert_eq!(roundtrip(src), src);
        assert_eq!(roundtrip("t = (1,)\n"), "t = 1,\n");
        assert_eq!(roundtrip("f((1, 2))\n"), "f((1, 2))\n");
    }

    #[test]
    fn test_elif_chain_is_refolded() {
        let src = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        assert_eq!(roundtrip(src), src);
    }

    #[test]
    fn test_try_and_loops() {
        let src = "def f08(o, p):\n    result = 1\n    try:\n        raise Exception()\n    except Exception as e:\n        result = result * 4 + 3\n    return result\n";
        assert_eq!(roundtrip(src), src);
        let src = "for i in range(n - 1):\n    if not swapped:\n        break\nelse:\n    pass\n";
        assert_eq!(roundtrip(src), src);
    }

    #[test]
    fn test_strings_are_escaped() {
        assert_eq!(roundtrip("s = \"it's\\n\"\n"), "s = 'it\\'s\\n'\n");
    }

    #[test]
    fn test_emit_is_a_fixed_point() {
        let src = "def f(a,b):\n  x: int = a//b%3\n  while True:\n    x -= 1\n    if x in [1,2] or a is not None: break\n  return min(x, -a)\n";
        let once = roundtrip(src);
        assert_eq!(roundtrip(&once), once);
    }
}
