use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Names, keywords, function names and output targets. May contain
    /// `.` and brackets, so `residual[0]` is one word.
    Word(String),
    Number(f64),
    /// Arithmetic, comparison and logical operators.
    Op(&'static str),
    Assign,
    LParen,
    RParen,
    Comma,
    /// `// text`, recorded as a comment expression. Holds the trimmed text.
    Comment(String),
    Newline,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "`{}`", w),
            Token::Number(n) => write!(f, "number `{}`", n),
            Token::Op(op) => write!(f, "`{}`", op),
            Token::Assign => f.write_str("`=`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Comma => f.write_str("`,`"),
            Token::Comment(_) => f.write_str("comment"),
            Token::Newline => f.write_str("end of line"),
            Token::Eof => f.write_str("end of file"),
        }
    }
}

const TWO_CHAR_OPS: &[&str] = &["<=", ">=", "==", "!=", "&&", "||"];

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Token>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn span(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Spanned<Token> {
        loop {
            while matches!(self.peek(0), Some(b' ' | b'\t' | b'\r')) {
                self.pos += 1;
            }
            let start = self.pos;
            let Some(ch) = self.peek(0) else {
                return Spanned::new(Token::Eof, self.span(start));
            };

            match ch {
                b'\n' => {
                    self.pos += 1;
                    return Spanned::new(Token::Newline, self.span(start));
                }
                b'#' => self.skip_line(),
                b'/' if self.peek(1) == Some(b'/') => {
                    self.skip_line();
                    let text = self.source[start + 2..self.pos].trim().to_string();
                    return Spanned::new(Token::Comment(text), self.span(start));
                }
                c if c.is_ascii_alphabetic() || c == b'_' => return self.scan_word(),
                c if c.is_ascii_digit()
                    || (c == b'.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) =>
                {
                    if let Some(tok) = self.scan_number() {
                        return tok;
                    }
                }
                _ => {
                    if let Some(tok) = self.scan_symbol(start) {
                        return tok;
                    }
                }
            }
        }
    }

    fn skip_line(&mut self) {
        while self.peek(0).is_some_and(|c| c != b'\n') {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn scan_word(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b'[' | b']'))
        {
            self.pos += 1;
        }
        let word = self.source[start..self.pos].to_string();
        Spanned::new(Token::Word(word), self.span(start))
    }

    fn scan_number(&mut self) -> Option<Spanned<Token>> {
        let start = self.pos;
        self.skip_digits();
        if self.peek(0) == Some(b'.') {
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek(1), Some(b'+' | b'-')));
            if self.peek(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.skip_digits();
            }
        }
        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(value) => Some(Spanned::new(Token::Number(value), self.span(start))),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    format!("invalid number `{}`", text),
                    self.span(start),
                ));
                None
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Token>> {
        let rest = &self.source[start..];
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| rest.starts_with(*op)) {
            self.pos += 2;
            return Some(Spanned::new(Token::Op(*op), self.span(start)));
        }

        self.pos += 1;
        let tok = match self.bytes[start] {
            b'+' => Token::Op("+"),
            b'-' => Token::Op("-"),
            b'*' => Token::Op("*"),
            b'/' => Token::Op("/"),
            b'<' => Token::Op("<"),
            b'>' => Token::Op(">"),
            b'!' => Token::Op("!"),
            b'=' => Token::Assign,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            _ => {
                // Skip the whole character so multi-byte input stays aligned.
                let ch = rest.chars().next().unwrap_or('?');
                self.pos = start + ch.len_utf8();
                self.diagnostics.push(Diagnostic::error(
                    format!("unexpected character `{}`", ch),
                    self.span(start),
                ));
                return None;
            }
        };
        Some(Spanned::new(tok, self.span(start)))
    }
}
