//! Tokenizer for subject source, with INDENT/DEDENT synthesis.

use logos::Logos;

use crate::error::{Error, Result};
use crate::tree::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
enum RawToken {
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("is")]
    Is,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,
    #[token("as")]
    As,
    #[token("raise")]
    Raise,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("->")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("//=")]
    DoubleSlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEq,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("\n")]
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    True,
    False,
    None,
    Pass,
    Break,
    Continue,
    Try,
    Except,
    Finally,
    As,
    Raise,

    Ident(String),
    Int(i64),
    Str(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    DoubleSlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    DoubleSlash,
    Percent,
    DoubleStar,

    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

const TAB_WIDTH: usize = 8;

/// Byte offsets of line starts, for offset -> (line, column) lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn span(&self, offset: usize) -> Span {
        let line = self.starts.partition_point(|&s| s <= offset) - 1;
        Span::new((line + 1) as u32, (offset - self.starts[line]) as u32)
    }

    /// Visual indentation of the text preceding `offset` on its line.
    fn indentation(&self, source: &str, offset: usize) -> usize {
        let line = self.starts.partition_point(|&s| s <= offset) - 1;
        source[self.starts[line]..offset].chars().fold(0, |width, c| match c {
            '\t' => (width / TAB_WIDTH + 1) * TAB_WIDTH,
            _ => width + 1,
        })
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let index = LineIndex::new(source);
    let mut tokens: Vec<Token> = Vec::new();
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut lexer = RawToken::lexer(source);

    while let Some(raw) = lexer.next() {
        let range = lexer.span();
        let span = index.span(range.start);
        let raw = raw.map_err(|_| {
            Error::lex(span, format!("unexpected character {:?}", &source[range.clone()]))
        })?;

        if raw == RawToken::Newline {
            if depth == 0 && !at_line_start {
                tokens.push(Token { kind: TokenKind::Newline, span });
                at_line_start = true;
            }
            continue;
        }

        if at_line_start && depth == 0 {
            let width = index.indentation(source, range.start);
            let current = *indents.last().unwrap_or(&0);
            if width > current {
                indents.push(width);
                tokens.push(Token { kind: TokenKind::Indent, span });
            } else if width < current {
                while indents.last().is_some_and(|&w| w > width) {
                    indents.pop();
                    tokens.push(Token { kind: TokenKind::Dedent, span });
                }
                if indents.last() != Some(&width) {
                    return Err(Error::lex(
                        span,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
        }
        at_line_start = false;

        let text = &source[range];
        let kind = match raw {
            RawToken::Def => TokenKind::Def,
            RawToken::Return => TokenKind::Return,
            RawToken::If => TokenKind::If,
            RawToken::Elif => TokenKind::Elif,
            RawToken::Else => TokenKind::Else,
            RawToken::While => TokenKind::While,
            RawToken::For => TokenKind::For,
            RawToken::In => TokenKind::In,
            RawToken::Not => TokenKind::Not,
            RawToken::And => TokenKind::And,
            RawToken::Or => TokenKind::Or,
            RawToken::Is => TokenKind::Is,
            RawToken::True => TokenKind::True,
            RawToken::False => TokenKind::False,
            RawToken::None => TokenKind::None,
            RawToken::Pass => TokenKind::Pass,
            RawToken::Break => TokenKind::Break,
            RawToken::Continue => TokenKind::Continue,
            RawToken::Try => TokenKind::Try,
            RawToken::Except => TokenKind::Except,
            RawToken::Finally => TokenKind::Finally,
            RawToken::As => TokenKind::As,
            RawToken::Raise => TokenKind::Raise,
            RawToken::Ident => TokenKind::Ident(text.to_string()),
            RawToken::Int => TokenKind::Int(
                text.parse()
                    .map_err(|_| Error::lex(span, format!("integer literal {text} is too large")))?,
            ),
            RawToken::Str => TokenKind::Str(unescape(&text[1..text.len() - 1], span)?),
            RawToken::LParen => {
                depth += 1;
                TokenKind::LParen
            }
            RawToken::RParen => {
                depth = depth.saturating_sub(1);
                TokenKind::RParen
            }
            RawToken::LBracket => {
                depth += 1;
                TokenKind::LBracket
            }
            RawToken::RBracket => {
                depth = depth.saturating_sub(1);
                TokenKind::RBracket
            }
            RawToken::Comma => TokenKind::Comma,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Arrow => TokenKind::Arrow,
            RawToken::Assign => TokenKind::Assign,
            RawToken::PlusAssign => TokenKind::PlusAssign,
            RawToken::MinusAssign => TokenKind::MinusAssign,
            RawToken::StarAssign => TokenKind::StarAssign,
            RawToken::DoubleSlashAssign => TokenKind::DoubleSlashAssign,
            RawToken::PercentAssign => TokenKind::PercentAssign,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::NotEq => TokenKind::NotEq,
            RawToken::Less => TokenKind::Less,
            RawToken::LessEq => TokenKind::LessEq,
            RawToken::Greater => TokenKind::Greater,
            RawToken::GreaterEq => TokenKind::GreaterEq,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::DoubleSlash => TokenKind::DoubleSlash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::DoubleStar => TokenKind::DoubleStar,
            RawToken::Slash => {
                return Err(Error::lex(span, "true division `/` is not supported; use `//`"))
            }
            RawToken::Newline => unreachable!("newlines are handled above"),
        };
        tokens.push(Token { kind, span });
    }

    let eof = index.span(source.len());
    if !at_line_start {
        tokens.push(Token { kind: TokenKind::Newline, span: eof });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token { kind: TokenKind::Dedent, span: eof });
    }
    tokens.push(Token { kind: TokenKind::Eof, span: eof });
    Ok(tokens)
}

fn unescape(body: &str, span: Span) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                return Err(Error::lex(span, format!("unsupported escape sequence \\{other}")))
            }
            None => return Err(Error::lex(span, "dangling backslash in string literal")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_indent_and_dedent() {
        let k = kinds("def f(a):\n    return a\nx = 1\n");
        assert_eq!(
            k,
            vec![
                TokenKind::Def,
                TokenKind::Ident("f".into()),
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::RParen,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Return,
                TokenKind::Ident("a".into()),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let k = kinds("# header\n\nx = 1  # trailing\n\n   # indented comment\ny = 2");
        assert_eq!(k.iter().filter(|t| **t == TokenKind::Newline).count(), 2);
        assert!(!k.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_newlines_inside_brackets_are_joined() {
        let k = kinds("x = [1,\n     2]\n");
        assert_eq!(k.iter().filter(|t| **t == TokenKind::Newline).count(), 1);
        assert!(!k.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_tabs_indent_to_multiples_of_eight() {
        let k = kinds("def f():\n\tx = 1\n        return x\n");
        assert_eq!(k.iter().filter(|t| **t == TokenKind::Indent).count(), 1);
    }

    #[test]
    fn test_multi_char_operators() {
        let k = kinds("a //= b ** 2 <= c != d\n");
        assert!(k.contains(&TokenKind::DoubleSlashAssign));
        assert!(k.contains(&TokenKind::DoubleStar));
        assert!(k.contains(&TokenKind::LessEq));
        assert!(k.contains(&TokenKind::NotEq));
    }

    #[test]
    fn test_string_escapes() {
        let k = kinds(r#"s = 'it\'s' + "a\tb""#);
        assert!(k.contains(&TokenKind::Str("it's".into())));
        assert!(k.contains(&TokenKind::Str("a\tb".into())));
    }

    #[test]
    fn test_bad_dedent_is_an_error() {
        let err = tokenize("if x:\n        y = 1\n    z = 2\n").unwrap_err();
        assert!(err.to_string().contains("unindent"));
    }

    #[test]
    fn test_spans_are_one_based_lines() {
        let toks = tokenize("x = 1\n  \ny = 2\n").unwrap();
        let y = toks.iter().find(|t| t.kind == TokenKind::Ident("y".into())).unwrap();
        assert_eq!(y.span, Span::new(3, 0));
    }
}
