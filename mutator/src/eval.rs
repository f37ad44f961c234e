//! Tree-walking interpreter used to run test calls against a program and its mutants.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use log::trace;

use crate::builtins::{self, call_builtin, lookup_builtin};
use crate::ops;
use crate::symbol::Symbol;
use crate::tree::*;
use crate::value::{Exception, ExceptionKind, FunctionId, Value};

/// Maximum depth of nested subject-level calls.
pub const RECURSION_LIMIT: usize = 1000;

/// Stack to give a thread that interprets subject programs. A call chain at
/// `RECURSION_LIMIT` needs far more than the default thread stack.
pub const INTERPRETER_STACK_SIZE: usize = 512 * 1024 * 1024;

/// Why evaluation stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Raise(Exception),
    /// The deadline passed. Not catchable by `try`.
    TimedOut,
}

impl Unwind {
    pub fn raise(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Unwind::Raise(Exception::new(kind, message))
    }
}

pub type Exec<T> = std::result::Result<T, Unwind>;

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    locals: HashMap<Symbol, Value>,
    /// Names local to the running function; `None` at module level.
    local_names: Option<Rc<HashSet<Symbol>>>,
}

impl Frame {
    fn module() -> Self {
        Self { locals: HashMap::new(), local_names: None }
    }
}

pub struct Interpreter<'p> {
    program: &'p Program,
    globals: HashMap<Symbol, Value>,
    local_names: HashMap<StmtId, Rc<HashSet<Symbol>>>,
    deadline: Option<Instant>,
    depth: usize,
    /// Exceptions being handled, innermost last, for bare `raise`.
    handling: Vec<Exception>,
    stdout: String,
}

/// Names bound anywhere in `body`, without descending into nested functions.
fn bound_names(program: &Program, body: &[StmtId], out: &mut HashSet<Symbol>) {
    for &id in body {
        let mut targets = Vec::new();
        match &program.stmt(id).kind {
            StmtKind::FunctionDef { name, .. } => {
                out.insert(*name);
            }
            StmtKind::Assign { .. } | StmtKind::AnnAssign { .. } | StmtKind::AugAssign { .. } => {
                out.extend(program.defined_names(id));
            }
            StmtKind::If { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                bound_names(program, body, out);
                bound_names(program, orelse, out);
            }
            StmtKind::For { target, body, orelse, .. } => {
                program.target_names(*target, &mut targets);
                bound_names(program, body, out);
                bound_names(program, orelse, out);
            }
            StmtKind::Try { body, handlers, orelse, finalbody } => {
                bound_names(program, body, out);
                for h in handlers {
                    targets.extend(h.name);
                    bound_names(program, &h.body, out);
                }
                bound_names(program, orelse, out);
                bound_names(program, finalbody, out);
            }
            _ => {}
        }
        out.extend(targets);
    }
}

impl<'p> Interpreter<'p> {
    /// Run the module body of `program`, defining its functions and globals.
    pub fn load(program: &'p Program, deadline: Option<Instant>) -> Exec<Self> {
        let mut local_names = HashMap::new();
        for (id, stmt) in program.stmts.iter() {
            if let StmtKind::FunctionDef { params, body, .. } = &stmt.kind {
                let mut names: HashSet<Symbol> = params.iter().copied().collect();
                bound_names(program, body, &mut names);
                local_names.insert(id, Rc::new(names));
            }
        }

        let mut interp = Self {
            program,
            globals: HashMap::new(),
            local_names,
            deadline,
            depth: 0,
            handling: Vec::new(),
            stdout: String::new(),
        };
        let mut frame = Frame::module();
        interp.exec_block(&mut frame, &program.body)?;
        Ok(interp)
    }

    /// Resolve a module-level function by name.
    pub fn resolve(&self, name: &str) -> Option<FunctionId> {
        let sym = self.program.symbols.lookup(name)?;
        match self.globals.get(&sym) {
            Some(Value::Function(id)) => Some(*id),
            _ => None,
        }
    }

    /// Call `function` with `args`, giving up once `deadline` passes.
    pub fn call(&mut self, function: FunctionId, args: Vec<Value>, deadline: Option<Instant>) -> Exec<Value> {
        self.deadline = deadline;
        self.depth = 0;
        self.handling.clear();
        self.call_function(function, args)
    }

    /// Everything `print` has written so far.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    fn tick(&self) -> Exec<()> {
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(Unwind::TimedOut),
            _ => Ok(()),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Exec<Value> {
        match callee {
            Value::Function(id) => self.call_function(id, args),
            Value::Builtin(b) => {
                self.tick()?;
                call_builtin(b, args, &mut self.stdout)
            }
            Value::ExceptionType(kind) => Ok(builtins::instantiate(kind, &args)),
            other => Err(Unwind::raise(
                ExceptionKind::TypeError,
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn call_function(&mut self, function: FunctionId, args: Vec<Value>) -> Exec<Value> {
        self.tick()?;
        let program = self.program;
        let StmtKind::FunctionDef { name, params, body } = &program.stmt(function.0).kind else {
            return Err(Unwind::raise(ExceptionKind::TypeError, "object is not callable"));
        };
        if args.len() != params.len() {
            return Err(Unwind::raise(
                ExceptionKind::TypeError,
                format!(
                    "{}() takes {} positional arguments but {} were given",
                    program.from_sym(*name),
                    params.len(),
                    args.len()
                ),
            ));
        }
        if self.depth >= RECURSION_LIMIT {
            return Err(Unwind::raise(ExceptionKind::RecursionError, "maximum recursion depth exceeded"));
        }
        trace!("call {}", program.from_sym(*name));

        let mut frame = Frame {
            locals: params.iter().copied().zip(args).collect(),
            local_names: Some(self.local_names.get(&function.0).cloned().unwrap_or_default()),
        };
        self.depth += 1;
        let result = self.exec_block(&mut frame, body);
        self.depth -= 1;
        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::None),
            Flow::Break | Flow::Continue => {
                Err(Unwind::raise(ExceptionKind::SyntaxError, "'break' or 'continue' outside loop"))
            }
        }
    }

    fn read_name(&self, frame: &Frame, name: Symbol) -> Exec<Value> {
        if let Some(locals) = &frame.local_names {
            if locals.contains(&name) {
                return frame.locals.get(&name).cloned().ok_or_else(|| {
                    Unwind::raise(
                        ExceptionKind::UnboundLocalError,
                        format!(
                            "local variable '{}' referenced before assignment",
                            self.program.from_sym(name)
                        ),
                    )
                });
            }
        }
        if let Some(v) = self.globals.get(&name) {
            return Ok(v.clone());
        }
        let text = self.program.from_sym(name);
        lookup_builtin(text).ok_or_else(|| {
            Unwind::raise(ExceptionKind::NameError, format!("name '{text}' is not defined"))
        })
    }

    fn store(&mut self, frame: &mut Frame, name: Symbol, value: Value) {
        if frame.local_names.is_some() {
            frame.locals.insert(name, value);
        } else {
            self.globals.insert(name, value);
        }
    }

    fn unbind(&mut self, frame: &mut Frame, name: Symbol) {
        if frame.local_names.is_some() {
            frame.locals.remove(&name);
        } else {
            self.globals.remove(&name);
        }
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &[StmtId]) -> Exec<Flow> {
        for &id in body {
            match self.exec_stmt(frame, id)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, id: StmtId) -> Exec<Flow> {
        let program = self.program;
        match &program.stmt(id).kind {
            StmtKind::FunctionDef { name, .. } => {
                self.store(frame, *name, Value::Function(FunctionId(id)));
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(frame, *e)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(v));
            }
            StmtKind::Assign { targets, value } => {
                let v = self.eval(frame, *value)?;
                for &t in targets {
                    self.assign(frame, t, v.clone())?;
                }
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let v = self.eval(frame, *value)?;
                    self.assign(frame, *target, v)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(frame, *target, *op, *value)?;
            }
            StmtKind::Expr(e) => {
                self.eval(frame, *e)?;
            }
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(frame, *test)?.truthy() { body } else { orelse };
                return self.exec_block(frame, branch);
            }
            StmtKind::While { test, body, orelse } => {
                loop {
                    self.tick()?;
                    if !self.eval(frame, *test)?.truthy() {
                        return self.exec_block(frame, orelse);
                    }
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For { target, iter, body, orelse } => {
                let iterable = self.eval(frame, *iter)?;
                for item in ops::iterate(&iterable)? {
                    self.tick()?;
                    self.assign(frame, *target, item)?;
                    match self.exec_block(frame, body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(frame, orelse);
            }
            StmtKind::Try { body, handlers, orelse, finalbody } => {
                return self.exec_try(frame, body, handlers, orelse, finalbody);
            }
            StmtKind::Raise(value) => {
                let exc = match value {
                    Some(e) => {
                        let v = self.eval(frame, *e)?;
                        to_exception(v)?
                    }
                    None => self.handling.last().cloned().ok_or_else(|| {
                        Unwind::raise(ExceptionKind::RuntimeError, "No active exception to reraise")
                    })?,
                };
                return Err(Unwind::Raise(exc));
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        frame: &mut Frame,
        body: &[StmtId],
        handlers: &[Handler],
        orelse: &[StmtId],
        finalbody: &[StmtId],
    ) -> Exec<Flow> {
        let outcome = match self.exec_block(frame, body) {
            Ok(Flow::Normal) => self.exec_block(frame, orelse),
            Ok(flow) => Ok(flow),
            Err(Unwind::Raise(exc)) => self.handle(frame, handlers, exc),
            Err(Unwind::TimedOut) => return Err(Unwind::TimedOut),
        };
        if matches!(outcome, Err(Unwind::TimedOut)) || finalbody.is_empty() {
            return outcome;
        }
        // a `finally` that leaves abnormally replaces the pending outcome
        match self.exec_block(frame, finalbody)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn handle(&mut self, frame: &mut Frame, handlers: &[Handler], exc: Exception) -> Exec<Flow> {
        for h in handlers {
            if let Some(t) = h.type_ {
                let ty = self.eval(frame, t)?;
                if !exception_matches(&ty, &exc)? {
                    continue;
                }
            }
            if let Some(name) = h.name {
                self.store(frame, name, Value::Exception(exc.clone()));
            }
            self.handling.push(exc);
            let result = self.exec_block(frame, &h.body);
            self.handling.pop();
            if let Some(name) = h.name {
                self.unbind(frame, name);
            }
            return result;
        }
        Err(Unwind::Raise(exc))
    }

    fn assign(&mut self, frame: &mut Frame, target: ExprId, value: Value) -> Exec<()> {
        let program = self.program;
        match &program.expr(target).kind {
            ExprKind::Name(sym) => {
                self.store(frame, *sym, value);
                Ok(())
            }
            ExprKind::Tuple(elts) | ExprKind::List(elts) => {
                let items = ops::collect(&value)?;
                if items.len() != elts.len() {
                    let message = if items.len() > elts.len() {
                        format!("too many values to unpack (expected {})", elts.len())
                    } else {
                        format!("not enough values to unpack (expected {}, got {})", elts.len(), items.len())
                    };
                    return Err(Unwind::raise(ExceptionKind::ValueError, message));
                }
                for (&e, v) in elts.iter().zip(items) {
                    self.assign(frame, e, v)?;
                }
                Ok(())
            }
            ExprKind::Subscript { value: container, index } => {
                let container = self.eval(frame, *container)?;
                let index = self.eval(frame, *index)?;
                ops::set_item(&container, &index, value)
            }
            _ => Err(Unwind::raise(ExceptionKind::SyntaxError, "cannot assign to expression")),
        }
    }

    fn aug_assign(&mut self, frame: &mut Frame, target: ExprId, op: ArithmeticOp, value: ExprId) -> Exec<()> {
        let program = self.program;
        match &program.expr(target).kind {
            ExprKind::Name(sym) => {
                let current = self.read_name(frame, *sym)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, current, &rhs)?;
                self.store(frame, *sym, updated);
                Ok(())
            }
            ExprKind::Subscript { value: container, index } => {
                let container = self.eval(frame, *container)?;
                let index = self.eval(frame, *index)?;
                let current = ops::get_item(&container, &index)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, current, &rhs)?;
                ops::set_item(&container, &index, updated)
            }
            _ => Err(Unwind::raise(
                ExceptionKind::SyntaxError,
                "illegal expression for augmented assignment",
            )),
        }
    }

    fn eval_all(&mut self, frame: &mut Frame, ids: &[ExprId]) -> Exec<Vec<Value>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            out.push(self.eval(frame, id)?);
        }
        Ok(out)
    }

    fn eval(&mut self, frame: &mut Frame, id: ExprId) -> Exec<Value> {
        let program = self.program;
        match &program.expr(id).kind {
            ExprKind::Name(sym) => self.read_name(frame, *sym),
            ExprKind::Constant(c) => Ok(match c {
                Constant::None => Value::None,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(n) => Value::Int(*n),
                Constant::Str(s) => Value::Str(s.clone()),
            }),
            ExprKind::Arithmetic { op, lhs, rhs } => {
                let l = self.eval(frame, *lhs)?;
                let r = self.eval(frame, *rhs)?;
                ops::binary(*op, &l, &r)
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval(frame, *operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                    UnaryOp::Neg => ops::negate(&v),
                    UnaryOp::Pos => ops::positive(&v),
                }
            }
            ExprKind::Logical { op, values } => {
                let mut last = Value::None;
                for &v in values {
                    last = self.eval(frame, v)?;
                    let decided = match op {
                        LogicalOp::And => !last.truthy(),
                        LogicalOp::Or => last.truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            ExprKind::Comparison { lhs, ops: operators, comparators } => {
                let mut left = self.eval(frame, *lhs)?;
                for (op, &c) in operators.iter().zip(comparators) {
                    let right = self.eval(frame, c)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(frame, *func)?;
                let args = self.eval_all(frame, args)?;
                self.call_value(callee, args)
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(frame, *value)?;
                let index = self.eval(frame, *index)?;
                ops::get_item(&container, &index)
            }
            ExprKind::List(elts) => Ok(Value::list(self.eval_all(frame, elts)?)),
            ExprKind::Tuple(elts) => Ok(Value::Tuple(self.eval_all(frame, elts)?)),
        }
    }
}

/// `x op= y`. Lists extend in place under `+=`.
fn in_place(op: ArithmeticOp, current: Value, rhs: &Value) -> Exec<Value> {
    if let (ArithmeticOp::Add, Value::List(items)) = (op, &current) {
        let extra = ops::collect(rhs)?;
        items.borrow_mut().extend(extra);
        return Ok(current);
    }
    ops::binary(op, &current, rhs)
}

fn to_exception(v: Value) -> Exec<Exception> {
    match v {
        Value::Exception(e) => Ok(e),
        Value::ExceptionType(kind) => Ok(Exception::new(kind, "")),
        _ => Err(Unwind::raise(
            ExceptionKind::TypeError,
            "exceptions must derive from BaseException",
        )),
    }
}

fn exception_matches(handler_type: &Value, exc: &Exception) -> Exec<bool> {
    match handler_type {
        Value::ExceptionType(kind) => Ok(exc.kind.is_subclass_of(*kind)),
        Value::Tuple(types) => {
            for t in types {
                if exception_matches(t, exc)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Unwind::raise(
            ExceptionKind::TypeError,
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}
