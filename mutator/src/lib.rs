//! Selective mutation testing for a small Python subset.
//!
//! A subject program is parsed into an arena tree, a single site is edited
//! per mutant (comparison negation, arithmetic swap, statement deletion,
//! boolean-test flip, or `min`/`max` swap), and the result is emitted back
//! as source. The interpreter runs test calls against the original and each
//! mutant so a harness can tell which tests a mutant kills.

mod builtins;
mod catalog;
mod emit;
mod error;
mod eval;
mod lexer;
mod mutator;
mod ops;
mod parser;
mod planner;
mod rewriter;
mod symbol;
mod tree;
mod value;
mod visit;

pub use crate::catalog::{BinarySite, Category, SiteCatalog};
pub use crate::emit::{Emittable, Emitter};
pub use crate::error::{Error, Result};
pub use crate::eval::{Exec, Interpreter, Unwind, INTERPRETER_STACK_SIZE, RECURSION_LIMIT};
pub use crate::lexer::{tokenize, Token, TokenKind};
pub use crate::mutator::{mutate, MutationEngine, Mutator};
pub use crate::parser::{parse, parse_file};
pub use crate::planner::{choose_plan, CategoryWeights, MutationPlan};
pub use crate::rewriter::{Mutation, Rewriter};
pub use crate::symbol::{Symbol, SymbolTable};
pub use crate::tree::{
    ArithmeticOp, ComparisonOp, Constant, Expr, ExprId, ExprKind, Handler, LogicalOp, Node, Program,
    Span, Stmt, StmtId, StmtKind, UnaryOp,
};
pub use crate::value::{Builtin, Exception, ExceptionKind, FunctionId, Value};
pub use crate::visit::{VisitMut, Visitor};
