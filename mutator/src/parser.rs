//! Recursive-descent parser from tokens to a `Program`.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::symbol::Symbol;
use crate::tree::*;

pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

/// Read and parse a subject file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Program> {
    let source = fs::read_to_string(path)?;
    parse(&source)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    program: Program,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            program: Program::new(),
        }
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Span> {
        if self.peek() == kind {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> Error {
        Error::parse(self.span(), format!("expected {what}, found {:?}", self.peek()))
    }

    fn ident(&mut self, what: &str) -> Result<Symbol> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.program.to_sym(&name))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn parse_program(mut self) -> Result<Program> {
        while *self.peek() != TokenKind::Eof {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let stmts = self.parse_statement()?;
            self.program.body.extend(stmts);
        }
        Ok(self.program)
    }

    // ----- statements -----

    fn parse_statement(&mut self) -> Result<Vec<StmtId>> {
        match self.peek() {
            TokenKind::Def => Ok(vec![self.parse_funcdef()?]),
            TokenKind::If => Ok(vec![self.parse_if()?]),
            TokenKind::While => Ok(vec![self.parse_while()?]),
            TokenKind::For => Ok(vec![self.parse_for()?]),
            TokenKind::Try => Ok(vec![self.parse_try()?]),
            TokenKind::Indent => Err(Error::parse(self.span(), "unexpected indent")),
            _ => self.parse_simple_line(),
        }
    }

    /// One or more `;`-separated simple statements ending the line.
    fn parse_simple_line(&mut self) -> Result<Vec<StmtId>> {
        let mut stmts = vec![self.parse_simple_stmt()?];
        while self.eat(&TokenKind::Semicolon) {
            if *self.peek() == TokenKind::Newline {
                break;
            }
            stmts.push(self.parse_simple_stmt()?);
        }
        self.expect(&TokenKind::Newline, "end of line")?;
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Vec<StmtId>> {
        self.expect(&TokenKind::Colon, "':'")?;
        if !self.eat(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        self.expect(&TokenKind::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if *self.peek() == TokenKind::Eof {
                break;
            }
            body.extend(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_funcdef(&mut self) -> Result<StmtId> {
        let span = self.expect(&TokenKind::Def, "'def'")?;
        let name = self.ident("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while *self.peek() != TokenKind::RParen {
            params.push(self.ident("parameter name")?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        if self.eat(&TokenKind::Arrow) {
            // Return annotations carry no behaviour; they are not kept.
            self.parse_expr()?;
        }
        let body = self.parse_block()?;
        Ok(self.program.alloc_stmt(StmtKind::FunctionDef { name, params, body }, span))
    }

    fn parse_if(&mut self) -> Result<StmtId> {
        let span = self.advance().span;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        let orelse = match self.peek() {
            TokenKind::Elif => vec![self.parse_if()?],
            TokenKind::Else => {
                self.advance();
                self.parse_block()?
            }
            _ => vec![],
        };
        Ok(self.program.alloc_stmt(StmtKind::If { test, body, orelse }, span))
    }

    fn parse_else(&mut self) -> Result<Vec<StmtId>> {
        if self.eat(&TokenKind::Else) {
            self.parse_block()
        } else {
            Ok(vec![])
        }
    }

    fn parse_while(&mut self) -> Result<StmtId> {
        let span = self.advance().span;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else()?;
        Ok(self.program.alloc_stmt(StmtKind::While { test, body, orelse }, span))
    }

    fn parse_for(&mut self) -> Result<StmtId> {
        let span = self.advance().span;
        let target = self.parse_target_list()?;
        self.check_assignable(target)?;
        self.expect(&TokenKind::In, "'in'")?;
        let iter = self.parse_expr_list()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else()?;
        Ok(self.program.alloc_stmt(StmtKind::For { target, iter, body, orelse }, span))
    }

    fn parse_try(&mut self) -> Result<StmtId> {
        let span = self.advance().span;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while *self.peek() == TokenKind::Except {
            let h_span = self.advance().span;
            let (type_, name) = if *self.peek() == TokenKind::Colon {
                (None, None)
            } else {
                let t = self.parse_expr()?;
                let n = if self.eat(&TokenKind::As) {
                    Some(self.ident("exception name")?)
                } else {
                    None
                };
                (Some(t), n)
            };
            let h_body = self.parse_block()?;
            handlers.push(Handler { type_, name, body: h_body, span: h_span });
        }
        let orelse = if handlers.is_empty() { vec![] } else { self.parse_else()? };
        let finalbody = if self.eat(&TokenKind::Finally) {
            self.parse_block()?
        } else {
            vec![]
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(Error::parse(span, "'try' needs an 'except' or 'finally' clause"));
        }
        Ok(self.program.alloc_stmt(StmtKind::Try { body, handlers, orelse, finalbody }, span))
    }

    fn parse_simple_stmt(&mut self) -> Result<StmtId> {
        let span = self.span();
        let kind = match self.peek() {
            TokenKind::Return => {
                self.advance();
                StmtKind::Return(self.parse_optional_value()?)
            }
            TokenKind::Raise => {
                self.advance();
                StmtKind::Raise(self.parse_optional_value()?)
            }
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            _ => return self.parse_expr_stmt(),
        };
        Ok(self.program.alloc_stmt(kind, span))
    }

    fn parse_optional_value(&mut self) -> Result<Option<ExprId>> {
        match self.peek() {
            TokenKind::Newline | TokenKind::Semicolon => Ok(None),
            _ => Ok(Some(self.parse_expr_list()?)),
        }
    }

    fn parse_expr_stmt(&mut self) -> Result<StmtId> {
        let span = self.span();
        let first = self.parse_expr_list()?;

        let aug = match self.peek() {
            TokenKind::PlusAssign => Some(ArithmeticOp::Add),
            TokenKind::MinusAssign => Some(ArithmeticOp::Sub),
            TokenKind::StarAssign => Some(ArithmeticOp::Mult),
            TokenKind::DoubleSlashAssign => Some(ArithmeticOp::FloorDiv),
            TokenKind::PercentAssign => Some(ArithmeticOp::Mod),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            match self.program.expr(first).kind {
                ExprKind::Name(_) | ExprKind::Subscript { .. } => {}
                _ => return Err(Error::parse(span, "illegal target for augmented assignment")),
            }
            let value = self.parse_expr_list()?;
            return Ok(self.program.alloc_stmt(StmtKind::AugAssign { target: first, op, value }, span));
        }

        if self.eat(&TokenKind::Colon) {
            match self.program.expr(first).kind {
                ExprKind::Name(_) | ExprKind::Subscript { .. } => {}
                _ => return Err(Error::parse(span, "illegal target for annotation")),
            }
            let annotation = self.parse_expr()?;
            let value = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr_list()?)
            } else {
                None
            };
            return Ok(self.program.alloc_stmt(
                StmtKind::AnnAssign { target: first, annotation, value },
                span,
            ));
        }

        if *self.peek() != TokenKind::Assign {
            return Ok(self.program.alloc_stmt(StmtKind::Expr(first), span));
        }

        let mut targets = vec![first];
        let mut value = first;
        while self.eat(&TokenKind::Assign) {
            value = self.parse_expr_list()?;
            targets.push(value);
        }
        targets.pop();
        for &t in &targets {
            self.check_assignable(t)?;
        }
        Ok(self.program.alloc_stmt(StmtKind::Assign { targets, value }, span))
    }

    fn check_assignable(&self, target: ExprId) -> Result<()> {
        let expr = self.program.expr(target);
        match &expr.kind {
            ExprKind::Name(_) | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(elts) | ExprKind::List(elts) => {
                elts.iter().try_for_each(|&e| self.check_assignable(e))
            }
            _ => Err(Error::parse(expr.span, "cannot assign to expression")),
        }
    }

    // ----- expressions -----

    fn can_start_expr(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
        )
    }

    /// `expr (',' expr)* [',']`, a tuple when any comma appears.
    fn parse_expr_list(&mut self) -> Result<ExprId> {
        self.parse_sequence(Self::parse_expr)
    }

    /// `for` targets stop below comparisons so `in` is left for the loop header.
    fn parse_target_list(&mut self) -> Result<ExprId> {
        self.parse_sequence(Self::parse_arith)
    }

    fn parse_sequence(&mut self, item: fn(&mut Self) -> Result<ExprId>) -> Result<ExprId> {
        let span = self.span();
        let first = item(self)?;
        if *self.peek() != TokenKind::Comma {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.can_start_expr() {
                break;
            }
            elts.push(item(self)?);
        }
        Ok(self.program.alloc_expr(ExprKind::Tuple(elts), span))
    }

    fn parse_expr(&mut self) -> Result<ExprId> {
        self.parse_logical(LogicalOp::Or)
    }

    fn parse_and(&mut self) -> Result<ExprId> {
        self.parse_logical(LogicalOp::And)
    }

    fn parse_logical(&mut self, op: LogicalOp) -> Result<ExprId> {
        let span = self.span();
        let (token, next) = match op {
            LogicalOp::Or => (TokenKind::Or, Self::parse_and as fn(&mut Self) -> Result<ExprId>),
            LogicalOp::And => (TokenKind::And, Self::parse_not as fn(&mut Self) -> Result<ExprId>),
        };
        let first = next(self)?;
        if *self.peek() != token {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&token) {
            values.push(next(self)?);
        }
        Ok(self.program.alloc_expr(ExprKind::Logical { op, values }, span))
    }

    fn parse_not(&mut self) -> Result<ExprId> {
        if *self.peek() == TokenKind::Not {
            let span = self.advance().span;
            let operand = self.parse_not()?;
            return Ok(self.program.alloc_expr(ExprKind::Unary { op: UnaryOp::Not, operand }, span));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<ComparisonOp> {
        let op = match self.peek() {
            TokenKind::EqEq => ComparisonOp::Eq,
            TokenKind::NotEq => ComparisonOp::NotEq,
            TokenKind::Less => ComparisonOp::Lt,
            TokenKind::LessEq => ComparisonOp::LtE,
            TokenKind::Greater => ComparisonOp::Gt,
            TokenKind::GreaterEq => ComparisonOp::GtE,
            TokenKind::In => ComparisonOp::In,
            TokenKind::Not if *self.peek_at(1) == TokenKind::In => {
                self.advance();
                ComparisonOp::NotIn
            }
            TokenKind::Is if *self.peek_at(1) == TokenKind::Not => {
                self.advance();
                ComparisonOp::IsNot
            }
            TokenKind::Is => ComparisonOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<ExprId> {
        let span = self.span();
        let lhs = self.parse_arith()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.parse_arith()?);
        }
        if ops.is_empty() {
            return Ok(lhs);
        }
        Ok(self.program.alloc_expr(ExprKind::Comparison { lhs, ops, comparators }, span))
    }

    fn parse_arith(&mut self) -> Result<ExprId> {
        let span = self.span();
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => ArithmeticOp::Add,
                TokenKind::Minus => ArithmeticOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = self.program.alloc_expr(ExprKind::Arithmetic { op, lhs, rhs }, span);
        }
    }

    fn parse_term(&mut self) -> Result<ExprId> {
        let span = self.span();
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => ArithmeticOp::Mult,
                TokenKind::DoubleSlash => ArithmeticOp::FloorDiv,
                TokenKind::Percent => ArithmeticOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = self.program.alloc_expr(ExprKind::Arithmetic { op, lhs, rhs }, span);
        }
    }

    fn parse_factor(&mut self) -> Result<ExprId> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let span = self.advance().span;
        let operand = self.parse_factor()?;
        Ok(self.program.alloc_expr(ExprKind::Unary { op, operand }, span))
    }

    fn parse_power(&mut self) -> Result<ExprId> {
        let span = self.span();
        let base = self.parse_postfix()?;
        if !self.eat(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(self.program.alloc_expr(
            ExprKind::Arithmetic { op: ArithmeticOp::Pow, lhs: base, rhs: exponent },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<ExprId> {
        let span = self.span();
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while *self.peek() != TokenKind::RParen {
                        args.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    expr = self.program.alloc_expr(ExprKind::Call { func: expr, args }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr_list()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = self.program.alloc_expr(ExprKind::Subscript { value: expr, index }, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<ExprId> {
        let span = self.span();
        let kind = match self.peek().clone() {
            TokenKind::Ident(name) => ExprKind::Name(self.program.to_sym(&name)),
            TokenKind::Int(i) => ExprKind::Constant(Constant::Int(i)),
            TokenKind::Str(s) => ExprKind::Constant(Constant::Str(s)),
            TokenKind::True => ExprKind::Constant(Constant::Bool(true)),
            TokenKind::False => ExprKind::Constant(Constant::Bool(false)),
            TokenKind::None => ExprKind::Constant(Constant::None),
            TokenKind::LParen => {
                self.advance();
                if self.eat(&TokenKind::RParen) {
                    return Ok(self.program.alloc_expr(ExprKind::Tuple(vec![]), span));
                }
                let inner = self.parse_expr_list()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elts = Vec::new();
                while *self.peek() != TokenKind::RBracket {
                    elts.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                return Ok(self.program.alloc_expr(ExprKind::List(elts), span));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(self.program.alloc_expr(kind, span))
    }
}
