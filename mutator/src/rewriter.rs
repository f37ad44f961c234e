//! Second pass: apply the planned edit.
//!
//! Visits nodes in the same order as `SiteCatalog`, keeping one running
//! counter per category. Every site advances its counter whether or not it
//! is edited, so plan index n always lands on the catalog's n-th site.

use std::collections::HashSet;

use log::debug;

use crate::catalog::{
    is_deletable, literal_bool_test, swappable_callee, swapped_call_name, Category, SiteCatalog,
};
use crate::planner::MutationPlan;
use crate::tree::*;
use crate::visit::{walk_expr_mut, walk_stmt_mut, VisitMut};

/// What the rewriter did for the planned site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub category: Category,
    pub index: usize,
    pub span: Span,
    pub description: String,
    /// False when the deletion guardrail kept the statement.
    pub applied: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    comparison: usize,
    binary_operator: usize,
    deletable_statement: usize,
    boolean_literal_test: usize,
    call_name_swap: usize,
}

impl Counters {
    /// Current ordinal for `category`, then advance it.
    fn next(&mut self, category: Category) -> usize {
        let slot = match category {
            Category::Comparison => &mut self.comparison,
            Category::BinaryOperator => &mut self.binary_operator,
            Category::DeletableStatement => &mut self.deletable_statement,
            Category::BooleanLiteralTest => &mut self.boolean_literal_test,
            Category::CallNameSwap => &mut self.call_name_swap,
        };
        let n = *slot;
        *slot += 1;
        n
    }
}

pub struct Rewriter<'a> {
    plan: &'a MutationPlan,
    eligible_comparisons: &'a HashSet<(ExprId, usize)>,
    first_definition_sites: &'a HashSet<StmtId>,
    seen: Counters,
    mutations: Vec<Mutation>,
}

impl<'a> Rewriter<'a> {
    pub fn new(plan: &'a MutationPlan, catalog: &'a SiteCatalog) -> Self {
        Self {
            plan,
            eligible_comparisons: &catalog.eligible_comparisons,
            first_definition_sites: &catalog.first_definition_sites,
            seen: Counters::default(),
            mutations: Vec::new(),
        }
    }

    /// Rewrite `program` in place and report every planned site visited.
    pub fn rewrite(mut self, program: &mut Program) -> Vec<Mutation> {
        if self.plan.is_empty() {
            return vec![];
        }
        self.visit_program_mut(program);
        program.fix_missing_locations();
        self.mutations
    }

    /// Advance the counter for `category`, yielding the ordinal if this site is planned.
    fn hit(&mut self, category: Category) -> Option<usize> {
        let n = self.seen.next(category);
        self.plan.selects(category, n).then_some(n)
    }

    fn record(&mut self, category: Category, index: usize, span: Span, description: String, applied: bool) {
        debug!("{category} #{index} at {}:{}: {description}", span.line, span.col);
        self.mutations.push(Mutation { category, index, span, description, applied });
    }

    fn swap_aug_assign(&mut self, program: &mut Program, id: StmtId) {
        let stmt = program.stmt_mut(id);
        let span = stmt.span;
        if let StmtKind::AugAssign { op, .. } = &mut stmt.kind {
            let Some(new_op) = op.swapped() else { return };
            let Some(index) = self.hit(Category::BinaryOperator) else { return };
            let description = format!("{}= -> {}=", op.symbol(), new_op.symbol());
            *op = new_op;
            self.record(Category::BinaryOperator, index, span, description, true);
        }
    }

    /// Returns true when the statement should be spliced out after its
    /// children have been visited.
    fn plan_deletion(&mut self, program: &Program, id: StmtId) -> bool {
        if !is_deletable(program, id) {
            return false;
        }
        let Some(index) = self.hit(Category::DeletableStatement) else {
            return false;
        };
        let span = program.stmt(id).span;
        let text = program.stmt_source(id);
        if self.first_definition_sites.contains(&id) {
            self.record(
                Category::DeletableStatement,
                index,
                span,
                format!("kept `{text}`: it is a first definition"),
                false,
            );
            return false;
        }
        self.record(Category::DeletableStatement, index, span, format!("deleted `{text}`"), true);
        true
    }

    fn flip_bool_test(&mut self, program: &mut Program, id: StmtId) {
        let Some((test, value)) = literal_bool_test(program, id) else { return };
        let Some(index) = self.hit(Category::BooleanLiteralTest) else { return };
        let span = program.expr(test).span;
        // Splice a fresh literal into the test slot.
        let flipped = program.alloc_expr(ExprKind::Constant(Constant::Bool(!value)), span);
        if let StmtKind::If { test, .. } | StmtKind::While { test, .. } = &mut program.stmt_mut(id).kind {
            *test = flipped;
        }
        let description = format!("{} -> {}", py_bool(value), py_bool(!value));
        self.record(Category::BooleanLiteralTest, index, span, description, true);
    }

    fn negate_comparisons(&mut self, program: &mut Program, id: ExprId) {
        let span = program.expr(id).span;
        let ExprKind::Comparison { ops, .. } = &program.expr(id).kind else { return };
        let ops = ops.clone();
        for (i, op) in ops.iter().enumerate() {
            if op.negated().is_none() || !self.eligible_comparisons.contains(&(id, i)) {
                continue;
            }
            let Some(index) = self.hit(Category::Comparison) else { continue };
            let negated = op.negated().unwrap_or(*op);
            if let ExprKind::Comparison { ops, .. } = &mut program.expr_mut(id).kind {
                ops[i] = negated;
            }
            let description = format!("{} -> {}", op.symbol(), negated.symbol());
            self.record(Category::Comparison, index, span, description, true);
        }
    }

    fn swap_arithmetic(&mut self, program: &mut Program, id: ExprId) {
        let expr = program.expr_mut(id);
        let span = expr.span;
        let ExprKind::Arithmetic { op, .. } = &mut expr.kind else { return };
        let Some(new_op) = op.swapped() else { return };
        let Some(index) = self.hit(Category::BinaryOperator) else { return };
        let description = format!("{} -> {}", op.symbol(), new_op.symbol());
        *op = new_op;
        self.record(Category::BinaryOperator, index, span, description, true);
    }

    fn swap_callee(&mut self, program: &mut Program, id: ExprId) {
        let Some(func) = swappable_callee(program, id) else { return };
        let Some(index) = self.hit(Category::CallNameSwap) else { return };
        let ExprKind::Name(sym) = program.expr(func).kind else { return };
        let old = program.from_sym(sym).to_string();
        let Some(new) = swapped_call_name(&old) else { return };
        let new_sym = program.to_sym(new);
        let span = program.expr(func).span;
        program.expr_mut(func).kind = ExprKind::Name(new_sym);
        self.record(Category::CallNameSwap, index, span, format!("{old}(...) -> {new}(...)"), true);
    }
}

impl VisitMut for Rewriter<'_> {
    fn visit_stmt_mut(&mut self, program: &mut Program, id: StmtId) {
        // Same per-node order as the catalog: compound assignment operator,
        // deletion, literal test, then children.
        self.swap_aug_assign(program, id);
        let delete = self.plan_deletion(program, id);
        self.flip_bool_test(program, id);

        walk_stmt_mut(self, program, id);

        if delete {
            let span = program.stmt(id).span;
            *program.stmt_mut(id) = Stmt { kind: StmtKind::Pass, span };
        }
    }

    fn visit_expr_mut(&mut self, program: &mut Program, id: ExprId) {
        self.negate_comparisons(program, id);
        self.swap_arithmetic(program, id);
        self.swap_callee(program, id);
        walk_expr_mut(self, program, id);
    }
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn apply(src: &str, category: Category, index: usize) -> (String, Vec<Mutation>) {
        let mut p = parse(src).unwrap();
        let catalog = SiteCatalog::build(&p);
        let plan = MutationPlan::single(category, index);
        let mutations = Rewriter::new(&plan, &catalog).rewrite(&mut p);
        (p.emit(), mutations)
    }

    #[test]
    fn test_negates_selected_comparison_operator() {
        let (out, m) = apply("x = a < b <= c\n", Category::Comparison, 1);
        assert_eq!(out, "x = a < b > c\n");
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].description, "<= -> >");
    }

    #[test]
    fn test_comparison_index_skips_loop_comparisons() {
        let src = "\
def f(k, l):
    while l > k:
        k += 1
    if k == l:
        return 1
    return 0
";
        let (out, _) = apply(src, Category::Comparison, 0);
        assert!(out.contains("while l > k:"));
        assert!(out.contains("if k != l:"));
    }

    #[test]
    fn test_binary_counter_is_shared_with_compound_assignment() {
        let src = "def f(i, j):\n    i += j * 2\n    return i - j\n";
        // pre-order: `i += ...` (0), `j * 2` (1), `i - j` (2)
        assert!(apply(src, Category::BinaryOperator, 0).0.contains("i -= j * 2"));
        assert!(apply(src, Category::BinaryOperator, 1).0.contains("i += j // 2"));
        assert!(apply(src, Category::BinaryOperator, 2).0.contains("return i + j"));
    }

    #[test]
    fn test_nested_binary_operators_in_pre_order() {
        let (out, _) = apply("def f(a, b):\n    return a + b + 0\n", Category::BinaryOperator, 0);
        assert!(out.contains("return a + b - 0"));
        let (out, _) = apply("def f(a, b):\n    return a + b + 0\n", Category::BinaryOperator, 1);
        assert!(out.contains("return a - b + 0"));
    }

    #[test]
    fn test_deletion_replaces_statement_with_pass() {
        let src = "def f(x):\n    y = 1\n    y = x\n    print(y)\n    return y\n";
        let (out, m) = apply(src, Category::DeletableStatement, 1);
        assert_eq!(out, "def f(x):\n    y = 1\n    pass\n    print(y)\n    return y\n");
        assert!(m[0].applied);
        let (out, _) = apply(src, Category::DeletableStatement, 2);
        assert!(out.contains("    pass\n    return y"));
    }

    #[test]
    fn test_guardrail_keeps_first_definition() {
        let src = "def f(x):\n    y = x\n    return y\n";
        let (out, m) = apply(src, Category::DeletableStatement, 0);
        assert_eq!(out, parse(src).unwrap().emit());
        assert_eq!(m.len(), 1);
        assert!(!m[0].applied);
    }

    #[test]
    fn test_guardrail_is_per_function() {
        let src = "def f(a, b):\n    total = a\n    return total\n\ndef g(a, b):\n    total = a + b\n    return total\n";
        let (out, m) = apply(src, Category::DeletableStatement, 1);
        assert!(out.contains("def g(a, b):\n    total = a + b\n"));
        assert!(!m[0].applied);
    }

    #[test]
    fn test_parameters_can_lose_their_rebinding() {
        let src = "def f(i, j):\n    i += j\n    return i\n";
        let (out, m) = apply(src, Category::DeletableStatement, 0);
        assert_eq!(out, "def f(i, j):\n    pass\n    return i\n");
        assert!(m[0].applied);
    }

    #[test]
    fn test_flips_literal_tests() {
        let src = "def f(g, h):\n    if True:\n        return g\n    while False:\n        pass\n    return h\n";
        let (out, _) = apply(src, Category::BooleanLiteralTest, 0);
        assert!(out.contains("if False:"));
        assert!(out.contains("while False:"));
        let (out, _) = apply(src, Category::BooleanLiteralTest, 1);
        assert!(out.contains("if True:"));
        assert!(out.contains("while True:"));
    }

    #[test]
    fn test_swaps_min_and_max() {
        let src = "def f(i, j):\n    return min(i, max(i, j))\n";
        let (out, _) = apply(src, Category::CallNameSwap, 0);
        assert!(out.contains("return max(i, max(i, j))"));
        let (out, _) = apply(src, Category::CallNameSwap, 1);
        assert!(out.contains("return min(i, min(i, j))"));
    }

    #[test]
    fn test_out_of_range_index_changes_nothing() {
        let src = "def f(a, b):\n    return a + b\n";
        let (out, m) = apply(src, Category::BinaryOperator, 5);
        assert_eq!(out, parse(src).unwrap().emit());
        assert!(m.is_empty());
    }

    #[test]
    fn test_spans_are_kept_on_replacements() {
        let src = "def f(g):\n    if True:\n        print(g)\n";
        let mut p = parse(src).unwrap();
        let catalog = SiteCatalog::build(&p);
        let plan = MutationPlan::single(Category::BooleanLiteralTest, 0);
        let m = Rewriter::new(&plan, &catalog).rewrite(&mut p);
        assert_eq!(m[0].span, Span::new(2, 7));
        let plan = MutationPlan::single(Category::DeletableStatement, 0);
        let catalog = SiteCatalog::build(&p);
        let m = Rewriter::new(&plan, &catalog).rewrite(&mut p);
        assert_eq!(m[0].span, Span::new(3, 8));
    }
}
