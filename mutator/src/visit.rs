//! Pre-order traversal over a `Program`.
//!
//! - `Visitor` walks a shared `&Program` (catalog passes).
//! - `VisitMut` walks a `&mut Program` (rewriting passes).
//!
//! Both take their child lists from `Program::stmt_children` and
//! `Program::expr_children`, so the two traversals visit nodes in exactly the
//! same order. Override a method and call the matching `walk_*` function to
//! keep recursing; skip the call to prune.

use crate::tree::{ExprId, Node, Program, StmtId};

pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_stmt(&mut self, program: &Program, id: StmtId) {
        walk_stmt(self, program, id);
    }

    fn visit_expr(&mut self, program: &Program, id: ExprId) {
        walk_expr(self, program, id);
    }
}

pub fn walk_program<V: Visitor>(v: &mut V, program: &Program) {
    for &id in &program.body {
        v.visit_stmt(program, id);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, program: &Program, id: StmtId) {
    for child in program.stmt_children(id) {
        match child {
            Node::Stmt(s) => v.visit_stmt(program, s),
            Node::Expr(e) => v.visit_expr(program, e),
        }
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, program: &Program, id: ExprId) {
    for child in program.expr_children(id) {
        v.visit_expr(program, child);
    }
}

pub trait VisitMut: Sized {
    fn visit_program_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program);
    }

    fn visit_stmt_mut(&mut self, program: &mut Program, id: StmtId) {
        walk_stmt_mut(self, program, id);
    }

    fn visit_expr_mut(&mut self, program: &mut Program, id: ExprId) {
        walk_expr_mut(self, program, id);
    }
}

pub fn walk_program_mut<V: VisitMut>(v: &mut V, program: &mut Program) {
    let body = program.body.clone();
    for id in body {
        v.visit_stmt_mut(program, id);
    }
}

pub fn walk_stmt_mut<V: VisitMut>(v: &mut V, program: &mut Program, id: StmtId) {
    for child in program.stmt_children(id) {
        match child {
            Node::Stmt(s) => v.visit_stmt_mut(program, s),
            Node::Expr(e) => v.visit_expr_mut(program, e),
        }
    }
}

pub fn walk_expr_mut<V: VisitMut>(v: &mut V, program: &mut Program, id: ExprId) {
    for child in program.expr_children(id) {
        v.visit_expr_mut(program, child);
    }
}
