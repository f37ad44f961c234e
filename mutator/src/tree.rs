use la_arena::{Arena, Idx};

use crate::symbol::{Symbol, SymbolTable};

pub type StmtId = Idx<Stmt>;
pub type ExprId = Idx<Expr>;

/// Position of a node's first token. Line 0 marks a node with no known position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub const MISSING: Span = Span { line: 0, col: 0 };

    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    pub fn is_missing(&self) -> bool {
        self.line == 0
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mult,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithmeticOp {
    /// The operator a binary-operator mutation replaces this one with, if any.
    pub fn swapped(self) -> Option<Self> {
        match self {
            Self::Add => Some(Self::Sub),
            Self::Sub => Some(Self::Add),
            Self::Mult => Some(Self::FloorDiv),
            Self::FloorDiv => Some(Self::Mult),
            Self::Mod | Self::Pow => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl ComparisonOp {
    /// Logical negation of a relational operator. Membership and identity
    /// tests have none and are never mutated.
    pub fn negated(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::NotEq),
            Self::NotEq => Some(Self::Eq),
            Self::Lt => Some(Self::GtE),
            Self::LtE => Some(Self::Gt),
            Self::Gt => Some(Self::LtE),
            Self::GtE => Some(Self::Lt),
            Self::In | Self::NotIn | Self::Is | Self::IsNot => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExprKind {
    Name(Symbol),
    Constant(Constant),
    Arithmetic {
        op: ArithmeticOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Logical {
        op: LogicalOp,
        values: Vec<ExprId>,
    },
    /// Chained comparison: `lhs ops[0] comparators[0] ops[1] comparators[1] ...`
    Comparison {
        lhs: ExprId,
        ops: Vec<ComparisonOp>,
        comparators: Vec<ExprId>,
    },
    Call {
        func: ExprId,
        args: Vec<ExprId>,
    },
    Subscript {
        value: ExprId,
        index: ExprId,
    },
    List(Vec<ExprId>),
    Tuple(Vec<ExprId>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Handler {
    pub type_: Option<ExprId>,
    pub name: Option<Symbol>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StmtKind {
    FunctionDef {
        name: Symbol,
        params: Vec<Symbol>,
        body: Vec<StmtId>,
    },
    Return(Option<ExprId>),
    Assign {
        targets: Vec<ExprId>,
        value: ExprId,
    },
    AnnAssign {
        target: ExprId,
        annotation: ExprId,
        value: Option<ExprId>,
    },
    AugAssign {
        target: ExprId,
        op: ArithmeticOp,
        value: ExprId,
    },
    Expr(ExprId),
    If {
        test: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    While {
        test: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    For {
        target: ExprId,
        iter: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    Try {
        body: Vec<StmtId>,
        handlers: Vec<Handler>,
        orelse: Vec<StmtId>,
        finalbody: Vec<StmtId>,
    },
    Raise(Option<ExprId>),
    Pass,
    Break,
    Continue,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// A child reference, in the order traversals visit them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Stmt(StmtId),
    Expr(ExprId),
}

/// A whole subject module. Nodes live in two arenas and refer to each other
/// by index, so a clone is a deep copy that keeps every id valid.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub body: Vec<StmtId>,
    pub symbols: SymbolTable,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_sym(&mut self, name: &str) -> Symbol {
        self.symbols.to_sym(name)
    }

    pub fn from_sym(&self, sym: Symbol) -> &str {
        self.symbols.from_sym(sym)
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.stmts.alloc(Stmt { kind, span })
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.alloc(Expr { kind, span })
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id]
    }

    /// Top-level function definitions in source order.
    pub fn functions(&self) -> impl Iterator<Item = (Symbol, StmtId)> + '_ {
        self.body.iter().filter_map(|&id| match &self.stmts[id].kind {
            StmtKind::FunctionDef { name, .. } => Some((*name, id)),
            _ => None,
        })
    }

    pub fn lookup_function(&self, name: &str) -> Option<StmtId> {
        let sym = self.symbols.lookup(name)?;
        self.functions().find(|(n, _)| *n == sym).map(|(_, id)| id)
    }

    /// Children of a statement in traversal order.
    pub fn stmt_children(&self, id: StmtId) -> Vec<Node> {
        fn block(out: &mut Vec<Node>, stmts: &[StmtId]) {
            out.extend(stmts.iter().map(|&s| Node::Stmt(s)));
        }

        let mut out = Vec::new();
        match &self.stmts[id].kind {
            StmtKind::FunctionDef { body, .. } => block(&mut out, body),
            StmtKind::Return(value) | StmtKind::Raise(value) => {
                out.extend(value.map(Node::Expr));
            }
            StmtKind::Assign { targets, value } => {
                out.extend(targets.iter().map(|&t| Node::Expr(t)));
                out.push(Node::Expr(*value));
            }
            StmtKind::AnnAssign { target, annotation, value } => {
                out.push(Node::Expr(*target));
                out.push(Node::Expr(*annotation));
                out.extend(value.map(Node::Expr));
            }
            StmtKind::AugAssign { target, value, .. } => {
                out.push(Node::Expr(*target));
                out.push(Node::Expr(*value));
            }
            StmtKind::Expr(value) => out.push(Node::Expr(*value)),
            StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
                out.push(Node::Expr(*test));
                block(&mut out, body);
                block(&mut out, orelse);
            }
            StmtKind::For { target, iter, body, orelse } => {
                out.push(Node::Expr(*target));
                out.push(Node::Expr(*iter));
                block(&mut out, body);
                block(&mut out, orelse);
            }
            StmtKind::Try { body, handlers, orelse, finalbody } => {
                block(&mut out, body);
                for h in handlers {
                    out.extend(h.type_.map(Node::Expr));
                    block(&mut out, &h.body);
                }
                block(&mut out, orelse);
                block(&mut out, finalbody);
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
        out
    }

    /// Children of an expression in traversal order.
    pub fn expr_children(&self, id: ExprId) -> Vec<ExprId> {
        match &self.exprs[id].kind {
            ExprKind::Name(_) | ExprKind::Constant(_) => vec![],
            ExprKind::Arithmetic { lhs, rhs, .. } => vec![*lhs, *rhs],
            ExprKind::Unary { operand, .. } => vec![*operand],
            ExprKind::Logical { values, .. } => values.clone(),
            ExprKind::Comparison { lhs, comparators, .. } => {
                let mut out = vec![*lhs];
                out.extend_from_slice(comparators);
                out
            }
            ExprKind::Call { func, args } => {
                let mut out = vec![*func];
                out.extend_from_slice(args);
                out
            }
            ExprKind::Subscript { value, index } => vec![*value, *index],
            ExprKind::List(elts) | ExprKind::Tuple(elts) => elts.clone(),
        }
    }

    /// Give every node without a position the position of its parent.
    /// Top-level statements without one get line 1.
    pub fn fix_missing_locations(&mut self) {
        let body = self.body.clone();
        for id in body {
            self.fix_stmt_location(id, Span::new(1, 0));
        }
    }

    fn fix_stmt_location(&mut self, id: StmtId, parent: Span) {
        let span = {
            let stmt = &mut self.stmts[id];
            if stmt.span.is_missing() {
                stmt.span = parent;
            }
            stmt.span
        };
        if let StmtKind::Try { handlers, .. } = &mut self.stmts[id].kind {
            for h in handlers.iter_mut() {
                if h.span.is_missing() {
                    h.span = span;
                }
            }
        }
        for child in self.stmt_children(id) {
            match child {
                Node::Stmt(s) => self.fix_stmt_location(s, span),
                Node::Expr(e) => self.fix_expr_location(e, span),
            }
        }
    }

    fn fix_expr_location(&mut self, id: ExprId, parent: Span) {
        let span = {
            let expr = &mut self.exprs[id];
            if expr.span.is_missing() {
                expr.span = parent;
            }
            expr.span
        };
        for child in self.expr_children(id) {
            self.fix_expr_location(child, span);
        }
    }

    /// Names bound by an assignment target: bare names, recursively through
    /// tuple and list targets. Subscripts bind nothing.
    pub fn target_names(&self, target: ExprId, out: &mut Vec<Symbol>) {
        match &self.exprs[target].kind {
            ExprKind::Name(sym) => out.push(*sym),
            ExprKind::Tuple(elts) | ExprKind::List(elts) => {
                for &e in elts {
                    self.target_names(e, out);
                }
            }
            _ => {}
        }
    }

    /// Names defined by an assignment-like statement, in target order.
    pub fn defined_names(&self, id: StmtId) -> Vec<Symbol> {
        let mut out = Vec::new();
        match &self.stmts[id].kind {
            StmtKind::Assign { targets, .. } => {
                for &t in targets {
                    self.target_names(t, &mut out);
                }
            }
            StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => {
                self.target_names(*target, &mut out);
            }
            _ => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(p: &mut Program, s: &str) -> ExprId {
        let sym = p.to_sym(s);
        p.alloc_expr(ExprKind::Name(sym), Span::new(1, 0))
    }

    #[test]
    fn test_swapped_operators() {
        assert_eq!(ArithmeticOp::Add.swapped(), Some(ArithmeticOp::Sub));
        assert_eq!(ArithmeticOp::Sub.swapped(), Some(ArithmeticOp::Add));
        assert_eq!(ArithmeticOp::Mult.swapped(), Some(ArithmeticOp::FloorDiv));
        assert_eq!(ArithmeticOp::FloorDiv.swapped(), Some(ArithmeticOp::Mult));
        assert_eq!(ArithmeticOp::Mod.swapped(), None);
        assert_eq!(ArithmeticOp::Pow.swapped(), None);
    }

    #[test]
    fn test_negated_comparisons() {
        assert_eq!(ComparisonOp::Eq.negated(), Some(ComparisonOp::NotEq));
        assert_eq!(ComparisonOp::NotEq.negated(), Some(ComparisonOp::Eq));
        assert_eq!(ComparisonOp::Lt.negated(), Some(ComparisonOp::GtE));
        assert_eq!(ComparisonOp::LtE.negated(), Some(ComparisonOp::Gt));
        assert_eq!(ComparisonOp::Gt.negated(), Some(ComparisonOp::LtE));
        assert_eq!(ComparisonOp::GtE.negated(), Some(ComparisonOp::Lt));
        assert_eq!(ComparisonOp::In.negated(), None);
        assert_eq!(ComparisonOp::IsNot.negated(), None);
    }

    #[test]
    fn test_defined_names_through_tuples() {
        let mut p = Program::new();
        let a = name(&mut p, "a");
        let b = name(&mut p, "b");
        let arr = name(&mut p, "arr");
        let zero = p.alloc_expr(ExprKind::Constant(Constant::Int(0)), Span::new(1, 0));
        let sub = p.alloc_expr(ExprKind::Subscript { value: arr, index: zero }, Span::new(1, 0));
        let tuple = p.alloc_expr(ExprKind::Tuple(vec![a, sub, b]), Span::new(1, 0));
        let value = p.alloc_expr(ExprKind::Constant(Constant::Int(1)), Span::new(1, 0));
        let stmt = p.alloc_stmt(StmtKind::Assign { targets: vec![tuple], value }, Span::new(1, 0));

        let names: Vec<&str> = p.defined_names(stmt).into_iter().map(|s| p.from_sym(s)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_fix_missing_locations_inherits_parent() {
        let mut p = Program::new();
        let x = name(&mut p, "x");
        let missing = p.alloc_expr(ExprKind::Constant(Constant::Bool(true)), Span::MISSING);
        let ret = p.alloc_stmt(StmtKind::Return(Some(missing)), Span::MISSING);
        let test = p.alloc_expr(ExprKind::Unary { op: UnaryOp::Not, operand: x }, Span::new(3, 4));
        let if_ = p.alloc_stmt(
            StmtKind::If { test, body: vec![ret], orelse: vec![] },
            Span::new(3, 4),
        );
        p.body.push(if_);

        p.fix_missing_locations();

        assert_eq!(p.stmt(ret).span, Span::new(3, 4));
        assert_eq!(p.expr(missing).span, Span::new(3, 4));
        assert_eq!(p.expr(x).span, Span::new(1, 0));
    }

    #[test]
    fn test_clone_keeps_ids_valid() {
        let mut p = Program::new();
        let x = name(&mut p, "x");
        let stmt = p.alloc_stmt(StmtKind::Expr(x), Span::new(1, 0));
        p.body.push(stmt);

        let mut copy = p.clone();
        copy.stmt_mut(stmt).kind = StmtKind::Pass;

        assert_eq!(p.stmt(stmt).kind, StmtKind::Expr(x));
        assert_eq!(copy.stmt(stmt).kind, StmtKind::Pass);
    }
}
