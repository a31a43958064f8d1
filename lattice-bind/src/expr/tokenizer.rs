//! Tokenizer
//!
//! A single left-to-right scan that turns expression source into postfix
//! tokens, shunting-yard style.
//!
//! # How It Works
//!
//! Every open bracket pushes a [`Frame`] holding its own operator stack,
//! separator count and ternary counter. Operands go straight to the output;
//! operators wait on the frame's stack until something of lower precedence
//! (or the frame's closing bracket) drains them. When a frame closes it
//! emits one accessor token carrying the resolved arity, so `f(a, b)` ends
//! up as `f a b ()2`.
//!
//! Colons are ambiguous inside braces. An object literal frame remembers
//! whether it just read a key; a `:` right after a key separates key from
//! value, any other `:` closes a ternary.

use tracing::warn;

use super::token::{Accessor, Assoc, Literal, Operator, Token};
use crate::error::ExpressionError;

type Result<T> = std::result::Result<T, ExpressionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Group,
    Call,
    Index,
    ArrayLiteral,
    ObjectLiteral,
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(Operator),
    /// A `?` still waiting for its `:`.
    Ternary,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    open: char,
    pos: usize,
    ops: Vec<Pending>,
    commas: usize,
    has_content: bool,
    ternaries: usize,
    expect_key: bool,
    awaiting_colon: bool,
    colons: usize,
}

impl Frame {
    fn new(kind: FrameKind, open: char, pos: usize) -> Self {
        Self {
            kind,
            open,
            pos,
            ops: Vec::new(),
            commas: 0,
            has_content: false,
            ternaries: 0,
            expect_key: kind == FrameKind::ObjectLiteral,
            awaiting_colon: false,
            colons: 0,
        }
    }

    fn closer(&self) -> char {
        match self.open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            _ => '\0',
        }
    }

    fn in_key_position(&self) -> bool {
        self.kind == FrameKind::ObjectLiteral && (self.expect_key || self.awaiting_colon)
    }
}

/// What the previous token was, for unary/binary and call/group decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Operand,
    Close,
    Operator(&'static str),
    Open,
    Separator,
}

impl Prev {
    fn ends_operand(self) -> bool {
        matches!(self, Prev::Operand | Prev::Close)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '@'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize `input`, logging and returning an empty stream on malformed
/// input.
pub fn create_tokens(input: &str) -> Vec<Token> {
    match tokenize(input) {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!(expression = input, error = %err, "failed to tokenize expression");
            Vec::new()
        }
    }
}

/// Tokenize `input` into postfix order.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Tokenizer::new(input).run()
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    output: Vec<Token>,
    frames: Vec<Frame>,
    prev: Prev,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            output: Vec::new(),
            frames: vec![Frame::new(FrameKind::Root, '\0', 0)],
            prev: Prev::Start,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => self.pos += c.len_utf8(),
                ';' => return Err(ExpressionError::Semicolon { pos: self.pos }),
                '\'' | '"' => self.string(c)?,
                '0'..='9' => self.number()?,
                '.' if !self.prev.ends_operand() && self.digit_follows() => self.number()?,
                '.' => self.member()?,
                c if is_ident_start(c) => self.word()?,
                '(' | '[' | '{' => self.open(c)?,
                ')' | ']' | '}' => self.close(c)?,
                ',' => self.comma()?,
                '?' => self.question()?,
                ':' => self.colon()?,
                _ => self.operator(c)?,
            }
        }
        self.finish()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn digit_follows(&self) -> bool {
        self.rest()[1..].starts_with(|c: char| c.is_ascii_digit())
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !pred(c))
            .unwrap_or(self.input.len() - start);
        self.pos += len;
        &self.input[start..start + len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn unexpected(&self, ch: char, pos: usize) -> ExpressionError {
        ExpressionError::UnexpectedCharacter { ch, pos }
    }

    fn reject_in_key_position(&mut self, pos: usize) -> Result<()> {
        if self.top().in_key_position() {
            return Err(ExpressionError::MalformedObjectLiteral { pos });
        }
        Ok(())
    }

    fn emit_operand(&mut self, token: Token, start: usize) -> Result<()> {
        if self.prev.ends_operand() {
            let ch = self.input[start..].chars().next().unwrap_or('\0');
            return Err(self.unexpected(ch, start));
        }
        self.reject_in_key_position(start)?;
        self.output.push(token);
        self.top().has_content = true;
        self.prev = Prev::Operand;
        Ok(())
    }

    fn emit_key(&mut self, key: String) {
        let frame = self.top();
        frame.expect_key = false;
        frame.awaiting_colon = true;
        frame.has_content = true;
        self.output.push(Token::Literal(Literal::Str(key)));
        self.prev = Prev::Operand;
    }

    fn expects_key(&mut self) -> bool {
        let frame = self.top();
        frame.kind == FrameKind::ObjectLiteral && frame.expect_key
    }

    fn string(&mut self, quote: char) -> Result<()> {
        let start = self.pos;
        let body = &self.rest()[1..];
        let end = body
            .find(quote)
            .ok_or(ExpressionError::UnterminatedString { pos: start })?;
        let text = body[..end].to_string();
        self.pos += end + 2;
        if self.expects_key() {
            self.emit_key(text);
            return Ok(());
        }
        self.emit_operand(Token::Literal(Literal::Str(text)), start)
    }

    fn number(&mut self) -> Result<()> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        if self.rest().starts_with('.') && self.digit_follows() {
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if self.rest().starts_with(['e', 'E']) {
            let exponent = self.pos;
            self.pos += 1;
            if self.rest().starts_with(['+', '-']) {
                self.pos += 1;
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(self.unexpected('e', exponent));
            }
        }
        if let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
            return Err(self.unexpected(c, self.pos));
        }
        let text = &self.input[start..self.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| self.unexpected(text.chars().next().unwrap_or('\0'), start))?;
        if self.expects_key() {
            self.emit_key(crate::value::format_number(value));
            return Ok(());
        }
        self.emit_operand(Token::Literal(Literal::Number(value)), start)
    }

    fn word(&mut self) -> Result<()> {
        let start = self.pos;
        let first = self.peek().unwrap_or('\0');
        self.pos += first.len_utf8();
        self.take_while(is_ident_char);
        let name = &self.input[start..self.pos];
        if name == "@" {
            return Err(self.unexpected('@', start));
        }
        if first != '@' && self.expects_key() {
            self.emit_key(name.to_string());
            return Ok(());
        }
        let token = match name {
            "true" => Token::Literal(Literal::Bool(true)),
            "false" => Token::Literal(Literal::Bool(false)),
            "null" => Token::Literal(Literal::Null),
            "undefined" => Token::Literal(Literal::Undefined),
            _ => {
                let callee = self.rest().trim_start().starts_with('(');
                Token::Identifier {
                    name: name.to_string(),
                    callee,
                }
            }
        };
        self.emit_operand(token, start)
    }

    fn member(&mut self) -> Result<()> {
        let dot = self.pos;
        if !self.prev.ends_operand() {
            return Err(self.unexpected('.', dot));
        }
        self.pos += 1;
        self.skip_whitespace();
        let name = self.take_while(is_ident_char);
        if name.is_empty() {
            return Err(ExpressionError::MissingProperty { pos: dot });
        }
        self.output.push(Token::Literal(Literal::Str(name.to_string())));
        self.output.push(Token::Accessor {
            kind: Accessor::Member,
            args: 1,
        });
        self.prev = Prev::Operand;
        Ok(())
    }

    fn open(&mut self, c: char) -> Result<()> {
        let pos = self.pos;
        self.reject_in_key_position(pos)?;
        let follows_operand = self.prev.ends_operand();
        let kind = match c {
            '(' if follows_operand => FrameKind::Call,
            '(' => FrameKind::Group,
            '[' if follows_operand => FrameKind::Index,
            '[' => FrameKind::ArrayLiteral,
            _ if follows_operand => return Err(self.unexpected(c, pos)),
            _ => FrameKind::ObjectLiteral,
        };
        self.top().has_content = true;
        self.frames.push(Frame::new(kind, c, pos));
        self.pos += 1;
        self.prev = Prev::Open;
        Ok(())
    }

    fn close(&mut self, c: char) -> Result<()> {
        let pos = self.pos;
        if self.frames.len() == 1 || self.top().closer() != c {
            return Err(ExpressionError::UnmatchedBracket { ch: c, pos });
        }
        let kind = self.top().kind;
        match self.prev {
            Prev::Operator(op) => {
                return Err(ExpressionError::MissingOperand { op: op.to_string() })
            }
            Prev::Separator if kind == FrameKind::ObjectLiteral => {
                return Err(ExpressionError::MalformedObjectLiteral { pos })
            }
            Prev::Separator => return Err(self.unexpected(c, pos)),
            _ => {}
        }
        if kind == FrameKind::ObjectLiteral && self.top().awaiting_colon {
            return Err(ExpressionError::MalformedObjectLiteral { pos });
        }
        self.drain(pos)?;

        let Some(frame) = self.frames.pop() else {
            return Err(ExpressionError::UnmatchedBracket { ch: c, pos });
        };
        let args = if frame.has_content { frame.commas + 1 } else { 0 };
        let accessor = match frame.kind {
            FrameKind::Group if args == 0 => return Err(self.unexpected(c, pos)),
            FrameKind::Group | FrameKind::Root => None,
            FrameKind::Call => Some(Accessor::Call),
            FrameKind::Index if args != 1 => return Err(self.unexpected(c, pos)),
            FrameKind::Index => Some(Accessor::Index),
            FrameKind::ArrayLiteral => Some(Accessor::ArrayLiteral),
            FrameKind::ObjectLiteral if frame.colons != args => {
                return Err(ExpressionError::MalformedObjectLiteral { pos })
            }
            FrameKind::ObjectLiteral => Some(Accessor::ObjectLiteral),
        };
        if let Some(kind) = accessor {
            self.output.push(Token::Accessor { kind, args });
        }
        self.pos += 1;
        self.prev = Prev::Close;
        Ok(())
    }

    fn comma(&mut self) -> Result<()> {
        let pos = self.pos;
        let kind = self.top().kind;
        if !matches!(
            kind,
            FrameKind::Call | FrameKind::ArrayLiteral | FrameKind::ObjectLiteral
        ) || !self.prev.ends_operand()
        {
            return Err(self.unexpected(',', pos));
        }
        if self.top().awaiting_colon {
            return Err(ExpressionError::MalformedObjectLiteral { pos });
        }
        self.drain(pos)?;
        let frame = self.top();
        frame.commas += 1;
        frame.expect_key = kind == FrameKind::ObjectLiteral;
        self.pos += 1;
        self.prev = Prev::Separator;
        Ok(())
    }

    fn question(&mut self) -> Result<()> {
        let pos = self.pos;
        self.reject_in_key_position(pos)?;
        if !self.prev.ends_operand() {
            return Err(ExpressionError::MissingOperand { op: "?".to_string() });
        }
        let conditional = Operator::Conditional.precedence();
        self.pop_while(|op| op.precedence() > conditional);
        let frame = self.top();
        frame.ops.push(Pending::Ternary);
        frame.ternaries += 1;
        self.pos += 1;
        self.prev = Prev::Operator("?");
        Ok(())
    }

    fn colon(&mut self) -> Result<()> {
        let pos = self.pos;
        if self.top().kind == FrameKind::ObjectLiteral && self.top().awaiting_colon {
            let frame = self.top();
            frame.awaiting_colon = false;
            frame.colons += 1;
            self.pos += 1;
            self.prev = Prev::Separator;
            return Ok(());
        }
        if self.top().ternaries == 0 {
            return Err(ExpressionError::UnbalancedTernary { pos });
        }
        if !self.prev.ends_operand() {
            return Err(ExpressionError::MissingOperand { op: ":".to_string() });
        }
        self.pop_while(|_| true);
        let frame = self.top();
        match frame.ops.last_mut() {
            Some(entry) if matches!(entry, Pending::Ternary) => {
                *entry = Pending::Op(Operator::Conditional)
            }
            _ => return Err(ExpressionError::UnbalancedTernary { pos }),
        }
        frame.ternaries -= 1;
        self.pos += 1;
        self.prev = Prev::Operator(":");
        Ok(())
    }

    fn operator(&mut self, c: char) -> Result<()> {
        let pos = self.pos;
        let Some((op, len)) = Operator::match_symbol(self.rest()) else {
            return Err(self.unexpected(c, pos));
        };
        self.reject_in_key_position(pos)?;
        if self.prev.ends_operand() {
            if op.is_prefix() {
                return Err(self.unexpected(c, pos));
            }
            let left = op.assoc() == Assoc::Left;
            self.pop_while(|top| {
                top.precedence() > op.precedence()
                    || (left && top.precedence() == op.precedence())
            });
            self.top().ops.push(Pending::Op(op));
        } else {
            let prefix = op
                .as_prefix()
                .ok_or_else(|| ExpressionError::MissingOperand { op: op.symbol().to_string() })?;
            self.top().ops.push(Pending::Op(prefix));
        }
        self.top().has_content = true;
        self.pos += len;
        self.prev = Prev::Operator(op.symbol());
        Ok(())
    }

    /// Move operators from the current frame to the output while `pred`
    /// holds, stopping at a pending `?`.
    fn pop_while(&mut self, pred: impl Fn(Operator) -> bool) {
        let last = self.frames.len() - 1;
        while let Some(Pending::Op(op)) = self.frames[last].ops.last().copied() {
            if !pred(op) {
                break;
            }
            self.frames[last].ops.pop();
            self.output.push(Token::Operator(op));
        }
    }

    /// Flush the current frame's operator stack.
    fn drain(&mut self, pos: usize) -> Result<()> {
        let frame = self.top();
        if frame.ternaries != 0 {
            return Err(ExpressionError::UnbalancedTernary { pos });
        }
        let ops: Vec<Pending> = frame.ops.drain(..).rev().collect();
        for pending in ops {
            match pending {
                Pending::Op(op) => self.output.push(Token::Operator(op)),
                Pending::Ternary => return Err(ExpressionError::UnbalancedTernary { pos }),
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token>> {
        if self.frames.len() > 1 {
            let frame = self.top();
            return Err(ExpressionError::UnmatchedBracket {
                ch: frame.open,
                pos: frame.pos,
            });
        }
        if let Prev::Operator(op) = self.prev {
            return Err(ExpressionError::MissingOperand { op: op.to_string() });
        }
        self.drain(self.input.len())?;
        Ok(self.output)
    }
}
