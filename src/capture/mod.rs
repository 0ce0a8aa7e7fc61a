//! Capture scripts: a line-oriented text form of a recorded evaluation.
//!
//! ```text
//! # y = a < b ? 3 : 4
//! a = input parameters[0][0]
//! b = input parameters[0][1]
//! c = a < b
//! if c
//!   r = const 3
//! else
//!   r = const 4
//! endif
//! output residual[0] = r
//! ```
//!
//! Each line replays one capture call on an `ExprGraph`. Assigning to a
//! name that already exists records the new value and then reassigns the
//! existing variable, which is how both branches of an `if` write `r`.
//! A name first defined inside a block is declared by an assignment of
//! its value, so both branches above have the same shape.

mod lexer;

use std::collections::BTreeMap;

use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::ir::{ExprGraph, ExprId, GraphError, ARITHMETIC_OPERATORS, COMPARISON_OPERATORS};
use crate::span::{Span, Spanned};

pub use lexer::{Lexer, Token};

const KEYWORDS: &[&str] = &[
    "if", "else", "endif", "output", "const", "input", "call", "test", "inf", "nan",
];

/// A replayed capture script.
#[derive(Debug, Clone)]
pub struct Capture {
    pub graph: ExprGraph,
    /// Script names and the variables they currently denote.
    pub names: BTreeMap<String, ExprId>,
}

/// Right-hand side of a `name = ...` line, parsed but not yet recorded.
#[derive(Debug, Clone)]
enum Value {
    Constant(f64),
    Input(String),
    Call {
        name: String,
        args: Vec<ExprId>,
        boolean: bool,
    },
    Unary(&'static str, ExprId),
    Not(ExprId),
    Binary(&'static str, ExprId, ExprId),
    Copy(ExprId),
}

/// Parse `source` and replay it into a fresh graph.
pub fn record(source: &str) -> Result<Capture, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    let mut recorder = Recorder::new(&tokens);
    recorder.run();
    recorder.finish()
}

struct Recorder<'t> {
    tokens: &'t [Spanned<Token>],
    pos: usize,
    graph: ExprGraph,
    names: BTreeMap<String, ExprId>,
    /// Span of the line that produced each graph position.
    origins: Vec<Span>,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Recorder<'t> {
    fn new(tokens: &'t [Spanned<Token>]) -> Self {
        Self {
            tokens,
            pos: 0,
            graph: ExprGraph::new(),
            names: BTreeMap::new(),
            origins: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(&mut self) {
        while self.peek() != &Token::Eof {
            let start = self.current_span();
            if let Err(diag) = self.line() {
                self.diagnostics.push(diag);
                // The failing token may already be this line's newline.
                if self.previous_token() != &Token::Newline {
                    self.skip_line();
                }
            }
            let span = start.merge(self.previous_span());
            while self.origins.len() < self.graph.len() {
                self.origins.push(span);
            }
        }
    }

    fn finish(self) -> Result<Capture, Vec<Diagnostic>> {
        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        if let Err(err) = self.graph.validate() {
            let span = self
                .origins
                .get(err.position())
                .copied()
                .unwrap_or_else(|| self.current_span());
            return Err(vec![graph_diagnostic(err, span)]);
        }
        debug!(
            exprs = self.graph.len(),
            names = self.names.len(),
            "recorded capture"
        );
        Ok(Capture {
            graph: self.graph,
            names: self.names,
        })
    }

    // ── Token cursor ──────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn previous_token(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)].node
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn advance(&mut self) -> &'t Spanned<Token> {
        let tokens = self.tokens;
        let tok = &tokens[self.pos];
        if tok.node != Token::Eof {
            self.pos += 1;
        }
        tok
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), Token::Newline | Token::Eof) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, tok: &Spanned<Token>, expected: &str) -> Diagnostic {
        Diagnostic::error(
            format!("expected {}, found {}", expected, tok.node),
            tok.span,
        )
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), Diagnostic> {
        let tok = self.advance();
        if tok.node == token {
            Ok(())
        } else {
            Err(self.unexpected(tok, expected))
        }
    }

    fn end_of_line(&mut self) -> Result<(), Diagnostic> {
        let tok = self.advance();
        match tok.node {
            Token::Newline | Token::Eof => Ok(()),
            _ => Err(self.unexpected(tok, "end of line")),
        }
    }

    fn word(&mut self, expected: &str) -> Result<Spanned<String>, Diagnostic> {
        let tok = self.advance();
        match &tok.node {
            Token::Word(w) => Ok(Spanned::new(w.clone(), tok.span)),
            _ => Err(self.unexpected(tok, expected)),
        }
    }

    /// A name that must already be defined.
    fn name(&mut self) -> Result<ExprId, Diagnostic> {
        let word = self.word("a name")?;
        self.resolve(&word)
    }

    fn resolve(&self, word: &Spanned<String>) -> Result<ExprId, Diagnostic> {
        self.names.get(&word.node).copied().ok_or_else(|| {
            Diagnostic::error(format!("unknown name `{}`", word.node), word.span)
                .with_help(format!("define `{}` before using it", word.node))
        })
    }

    // ── Lines ─────────────────────────────────────────────────────

    fn line(&mut self) -> Result<(), Diagnostic> {
        let start = self.advance();
        let span = start.span;
        match &start.node {
            Token::Newline => Ok(()),
            Token::Comment(text) => {
                self.end_of_line()?;
                self.graph.comment(text);
                Ok(())
            }
            Token::Word(w) if w == "if" => {
                let condition = self.name()?;
                self.end_of_line()?;
                self.graph.if_(condition).map_err(|e| graph_diagnostic(e, span))
            }
            Token::Word(w) if w == "else" => {
                self.end_of_line()?;
                self.graph.else_().map_err(|e| graph_diagnostic(e, span))
            }
            Token::Word(w) if w == "endif" => {
                self.end_of_line()?;
                self.graph.endif().map_err(|e| graph_diagnostic(e, span))
            }
            Token::Word(w) if w == "output" => {
                let target = self.word("an output name")?;
                self.expect(Token::Assign, "`=`")?;
                let source = self.name()?;
                self.end_of_line()?;
                self.graph
                    .output(source, &target.node)
                    .map(|_| ())
                    .map_err(|e| graph_diagnostic(e, span))
            }
            Token::Word(w) => {
                let target = Spanned::new(w.clone(), span);
                if KEYWORDS.contains(&w.as_str()) {
                    return Err(Diagnostic::error(
                        format!("`{}` is a keyword and cannot be assigned", w),
                        span,
                    ));
                }
                self.expect(Token::Assign, "`=`")?;
                let value = self.value()?;
                self.end_of_line()?;
                self.define(&target, value)
                    .map_err(|e| graph_diagnostic(e, span))
            }
            _ => Err(self.unexpected(start, "a statement")),
        }
    }

    fn value(&mut self) -> Result<Value, Diagnostic> {
        let tok = self.advance();
        match &tok.node {
            Token::Word(w) if w == "const" => self.literal().map(Value::Constant),
            Token::Word(w) if w == "input" => {
                let name = self.word("an input name")?;
                Ok(Value::Input(name.node))
            }
            Token::Word(w) if w == "call" || w == "test" => {
                let boolean = w == "test";
                let name = self.word("a function name")?;
                self.expect(Token::LParen, "`(`")?;
                let mut args = Vec::new();
                if self.peek() != &Token::RParen {
                    args.push(self.name()?);
                    while self.peek() == &Token::Comma {
                        self.advance();
                        args.push(self.name()?);
                    }
                }
                self.expect(Token::RParen, "`)` or `,`")?;
                Ok(Value::Call {
                    name: name.node,
                    args,
                    boolean,
                })
            }
            Token::Op(op @ ("-" | "+")) => Ok(Value::Unary(*op, self.name()?)),
            Token::Op("!") => Ok(Value::Not(self.name()?)),
            Token::Word(w) => {
                let left = self.resolve(&Spanned::new(w.clone(), tok.span))?;
                let Token::Op(op) = *self.peek() else {
                    return Ok(Value::Copy(left));
                };
                if op == "!" {
                    return Err(self.unexpected(&self.tokens[self.pos], "a binary operator"));
                }
                self.advance();
                let right = self.name()?;
                Ok(Value::Binary(op, left, right))
            }
            _ => Err(self.unexpected(tok, "a value")),
        }
    }

    /// `const` operand: an optionally signed number, `inf` or `nan`.
    fn literal(&mut self) -> Result<f64, Diagnostic> {
        let mut sign = 1.0;
        if let Token::Op(op @ ("-" | "+")) = *self.peek() {
            if op == "-" {
                sign = -1.0;
            }
            self.advance();
        }
        let tok = self.advance();
        match &tok.node {
            Token::Number(n) => Ok(sign * n),
            Token::Word(w) if w == "inf" => Ok(sign * f64::INFINITY),
            Token::Word(w) if w == "nan" => Ok(f64::NAN),
            _ => Err(self.unexpected(tok, "a number")),
        }
    }

    /// Record `value` under `target`.
    fn define(&mut self, target: &Spanned<String>, value: Value) -> Result<(), GraphError> {
        let existing = self.names.get(&target.node).copied();
        if let (Some(variable), Value::Copy(source)) = (existing, &value) {
            return self.graph.reassign(variable, *source);
        }

        let is_copy = matches!(value, Value::Copy(_));
        let g = &mut self.graph;
        let id = match value {
            Value::Constant(v) => g.constant(v),
            Value::Input(name) => g.input(&name),
            Value::Call {
                name,
                args,
                boolean: false,
            } => g.call(&name, &args)?,
            Value::Call { name, args, .. } => g.logical_call(&name, &args)?,
            Value::Unary(op, operand) => g.unary(op, operand)?,
            Value::Not(operand) => g.not(operand)?,
            Value::Binary(op, l, r) if ARITHMETIC_OPERATORS.contains(&op) => g.binary(op, l, r)?,
            Value::Binary(op, l, r) => {
                debug_assert!(COMPARISON_OPERATORS.contains(&op));
                g.compare(op, l, r)?
            }
            Value::Copy(source) => g.assign(source)?,
        };

        match existing {
            Some(variable) => self.graph.reassign(variable, id),
            None => {
                // Inside a block a new name is declared by an assignment.
                let variable = if self.graph.open_depth() > 0 && !is_copy {
                    self.graph.assign(id)?
                } else {
                    id
                };
                self.names.insert(target.node.clone(), variable);
                Ok(())
            }
        }
    }
}

/// Turn a structural fault into a diagnostic on the line that caused it.
fn graph_diagnostic(err: GraphError, span: Span) -> Diagnostic {
    let diag = Diagnostic::error(err.to_string(), span);
    match err {
        GraphError::UnclosedIf { .. } => diag.with_help("add a matching `endif`".to_string()),
        GraphError::NonBooleanCondition { .. } => {
            diag.with_help("conditions must be comparisons or `test` calls".to_string())
        }
        GraphError::ReturnKindMismatch { .. } => {
            diag.with_note("a name keeps the type of its first value".to_string())
        }
        _ => diag,
    }
}
