//! First pass: find every mutation site in a program.
//!
//! Sites are recorded in pre-order, left to right. The rewriter relies on
//! visiting them in exactly the same order, so the n-th site of a category
//! here is the node it edits as index n.

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;
use crate::tree::*;
use crate::visit::{walk_expr, walk_stmt, Visitor};

/// The five kinds of single-site edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Comparison,
    BinaryOperator,
    DeletableStatement,
    BooleanLiteralTest,
    CallNameSwap,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Comparison,
        Category::BinaryOperator,
        Category::DeletableStatement,
        Category::BooleanLiteralTest,
        Category::CallNameSwap,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Comparison => "comparison",
            Self::BinaryOperator => "binary-operator",
            Self::DeletableStatement => "deletable-statement",
            Self::BooleanLiteralTest => "boolean-literal-test",
            Self::CallNameSwap => "call-name-swap",
        };
        f.write_str(name)
    }
}

/// A binary-operator site is either an expression or a compound assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinarySite {
    Expr(ExprId),
    Aug(StmtId),
}

/// Names of the callees a call-name swap exchanges.
pub const CALL_SWAPS: [(&str, &str); 2] = [("min", "max"), ("max", "min")];

pub fn swapped_call_name(name: &str) -> Option<&'static str> {
    CALL_SWAPS.iter().find(|(from, _)| *from == name).map(|(_, to)| *to)
}

/// Literal `True`/`False` test of an `if` or `while`.
pub(crate) fn literal_bool_test(program: &Program, id: StmtId) -> Option<(ExprId, bool)> {
    match &program.stmt(id).kind {
        StmtKind::If { test, .. } | StmtKind::While { test, .. } => match program.expr(*test).kind {
            ExprKind::Constant(Constant::Bool(b)) => Some((*test, b)),
            _ => None,
        },
        _ => None,
    }
}

/// Callee name of a `min(...)`/`max(...)` call.
pub(crate) fn swappable_callee(program: &Program, id: ExprId) -> Option<ExprId> {
    match &program.expr(id).kind {
        ExprKind::Call { func, .. } => match program.expr(*func).kind {
            ExprKind::Name(sym) if swapped_call_name(program.from_sym(sym)).is_some() => Some(*func),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn is_deletable(program: &Program, id: StmtId) -> bool {
    match &program.stmt(id).kind {
        StmtKind::Assign { .. } | StmtKind::AnnAssign { .. } | StmtKind::AugAssign { .. } => true,
        StmtKind::Expr(value) => matches!(program.expr(*value).kind, ExprKind::Call { .. }),
        _ => false,
    }
}

#[derive(Debug, Default, Clone)]
pub struct SiteCatalog {
    /// Eligible `(comparison, operator index)` pairs.
    pub comparisons: Vec<(ExprId, usize)>,
    pub eligible_comparisons: HashSet<(ExprId, usize)>,
    pub binary_operators: Vec<BinarySite>,
    pub deletable_statements: Vec<StmtId>,
    pub boolean_tests: Vec<StmtId>,
    pub call_swaps: Vec<ExprId>,
    /// Statements that bind at least one name for the first time in their scope.
    pub first_definition_sites: HashSet<StmtId>,
    /// Names bound so far in each enclosing scope, innermost last.
    scopes: Vec<HashSet<Symbol>>,
    loop_depth: usize,
}

impl SiteCatalog {
    pub fn build(program: &Program) -> Self {
        let mut catalog = Self { scopes: vec![HashSet::new()], ..Self::default() };
        catalog.visit_program(program);
        debug!(
            "catalogued {} sites ({} first definitions)",
            Category::ALL.iter().map(|c| catalog.count(*c)).sum::<usize>(),
            catalog.first_definition_sites.len()
        );
        catalog
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Comparison => self.comparisons.len(),
            Category::BinaryOperator => self.binary_operators.len(),
            Category::DeletableStatement => self.deletable_statements.len(),
            Category::BooleanLiteralTest => self.boolean_tests.len(),
            Category::CallNameSwap => self.call_swaps.len(),
        }
    }

    pub fn counts(&self) -> [(Category, usize); 5] {
        Category::ALL.map(|c| (c, self.count(c)))
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.count(*c) == 0)
    }

    fn record_definitions(&mut self, program: &Program, id: StmtId) {
        let Some(scope) = self.scopes.last_mut() else { return };
        for name in program.defined_names(id) {
            if scope.insert(name) {
                self.first_definition_sites.insert(id);
            }
        }
    }

    /// Whether deleting `id` would remove some name's first definition.
    pub fn defines_first(&self, id: StmtId) -> bool {
        self.first_definition_sites.contains(&id)
    }
}

impl Visitor for SiteCatalog {
    fn visit_stmt(&mut self, program: &Program, id: StmtId) {
        if let StmtKind::AugAssign { op, .. } = &program.stmt(id).kind {
            if op.swapped().is_some() {
                self.binary_operators.push(BinarySite::Aug(id));
            }
        }
        if is_deletable(program, id) {
            self.record_definitions(program, id);
            self.deletable_statements.push(id);
        }
        if literal_bool_test(program, id).is_some() {
            self.boolean_tests.push(id);
        }

        // A function body is its own scope; parameters are bound on entry.
        if let StmtKind::FunctionDef { params, .. } = &program.stmt(id).kind {
            self.scopes.push(params.iter().copied().collect());
            walk_stmt(self, program, id);
            self.scopes.pop();
            return;
        }

        let is_loop = matches!(program.stmt(id).kind, StmtKind::While { .. } | StmtKind::For { .. });
        if is_loop {
            self.loop_depth += 1;
        }
        walk_stmt(self, program, id);
        if is_loop {
            self.loop_depth -= 1;
        }
    }

    fn visit_expr(&mut self, program: &Program, id: ExprId) {
        match &program.expr(id).kind {
            ExprKind::Comparison { ops, .. } if self.loop_depth == 0 => {
                for (i, op) in ops.iter().enumerate() {
                    if op.negated().is_some() {
                        self.comparisons.push((id, i));
                        self.eligible_comparisons.insert((id, i));
                    }
                }
            }
            ExprKind::Arithmetic { op, .. } if op.swapped().is_some() => {
                self.binary_operators.push(BinarySite::Expr(id));
            }
            _ => {}
        }
        if swappable_callee(program, id).is_some() {
            self.call_swaps.push(id);
        }
        walk_expr(self, program, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn first_definitions(program: &Program, catalog: &SiteCatalog) -> Vec<String> {
        catalog
            .deletable_statements
            .iter()
            .filter(|id| catalog.defines_first(**id))
            .map(|id| program.stmt_source(*id))
            .collect()
    }

    #[test]
    fn test_counts_each_category() {
        let src = "\
def f(a, b):
    x = a + b * 2
    if a <= b < 3:
        x -= 1
    if True:
        print(x)
    return min(x, max(a, b))
";
        let p = parse(src).unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(c.count(Category::Comparison), 2);
        // a + b, b * 2, x -= 1
        assert_eq!(c.count(Category::BinaryOperator), 3);
        // x = ..., x -= 1, print(x)
        assert_eq!(c.count(Category::DeletableStatement), 3);
        assert_eq!(c.count(Category::BooleanLiteralTest), 1);
        assert_eq!(c.count(Category::CallNameSwap), 2);
    }

    #[test]
    fn test_comparisons_inside_loops_are_not_eligible() {
        let src = "\
def f(k, l):
    while l > k:
        if k == 3:
            k += 1
    for i in range(3):
        x = i < 2
    return k != l
";
        let p = parse(src).unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(c.comparisons.len(), 1);
        let (id, idx) = c.comparisons[0];
        assert_eq!(idx, 0);
        assert_eq!(p.expr_source(id), "k != l");
        assert!(c.eligible_comparisons.contains(&(id, 0)));
    }

    #[test]
    fn test_membership_tests_are_skipped_in_chains() {
        let p = parse("x = a in b < c\n").unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(c.comparisons.len(), 1);
        assert_eq!(c.comparisons[0].1, 1);
    }

    #[test]
    fn test_sites_are_in_pre_order() {
        let p = parse("x = (a + b) - (c + d)\n").unwrap();
        let c = SiteCatalog::build(&p);
        let srcs: Vec<String> = c
            .binary_operators
            .iter()
            .map(|s| match s {
                BinarySite::Expr(e) => p.expr_source(*e),
                BinarySite::Aug(_) => unreachable!(),
            })
            .collect();
        assert_eq!(srcs, vec!["a + b - (c + d)", "a + b", "c + d"]);
    }

    #[test]
    fn test_first_definitions_are_per_function() {
        let src = "\
def f03(e, f):
    e = f
    return e

def f05(i, j):
    i += j
    j += i
    return min(i, j)

def f10(s, t):
    arr = s
    for i in range(3):
        arr[i], x = 0, 1
    i = 2
    return arr

def g(a, b):
    arr = a + b
    return arr
";
        let p = parse(src).unwrap();
        let c = SiteCatalog::build(&p);
        // Parameters are bound on entry, so rebinding them is never a first definition.
        assert_eq!(
            first_definitions(&p, &c),
            vec!["arr = s", "arr[i], x = 0, 1", "i = 2", "arr = a + b"]
        );
    }

    #[test]
    fn test_nested_functions_have_their_own_scope() {
        let src = "\
def outer(a):
    total = a
    def inner(b):
        total = b
        return total
    total = 0
    return inner(total)
";
        let p = parse(src).unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(first_definitions(&p, &c), vec!["total = a", "total = b"]);
    }

    #[test]
    fn test_redefinitions_are_not_first_definitions() {
        let p = parse("x = 1
x = 2
y, x = 3, 4
").unwrap();
        let c = SiteCatalog::build(&p);
        assert!(c.defines_first(c.deletable_statements[0]));
        assert!(!c.defines_first(c.deletable_statements[1]));
        // introduces y
        assert!(c.defines_first(c.deletable_statements[2]));
    }

    #[test]
    fn test_mod_and_pow_are_not_binary_sites() {
        let p = parse("x = a % b ** 2\ny %= 3\n").unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(c.count(Category::BinaryOperator), 0);
        assert_eq!(c.count(Category::DeletableStatement), 2);
    }

    #[test]
    fn test_bare_non_call_expressions_are_not_deletable() {
        let p = parse("x\nf(x)\n").unwrap();
        let c = SiteCatalog::build(&p);
        assert_eq!(c.deletable_statements.len(), 1);
    }

    #[test]
    fn test_empty_program_has_no_sites() {
        let p = parse("def f():\n    return 1\n").unwrap();
        assert!(SiteCatalog::build(&p).is_empty());
    }
}
