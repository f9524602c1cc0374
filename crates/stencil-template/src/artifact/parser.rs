/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser for artifact code.
//!
//! Expression precedence, loosest first:
//!
//! | level | operators |
//! |---|---|
//! | 1 | `or` |
//! | 2 | `and` |
//! | 3 | `=` (right associative, lvalue on the left) |
//! | 4 | `? :`, `?:` |
//! | 5 | `??` (right associative) |
//! | 6 | `\|\|` |
//! | 7 | `&&` |
//! | 8 | `==` `!=` `===` `!==` |
//! | 9 | `<` `<=` `>` `>=` |
//! | 10 | `.` |
//! | 11 | `+` `-` |
//! | 12 | `*` `/` `%` |
//! | 13 | prefix `!` `-` `+` |
//! | 14 | postfix `[..]` `->` |

use super::SyntaxError;
use super::ast::{
    BinaryOp, Expr, ForeachStmt, IfStmt, Program, Stmt, UnaryOp, WhileStmt,
};
use super::lexer::{Spanned, StrPart, Token, tokenize};
use crate::value::Value;

/// Parse artifact text (without its header line) into a [`Program`].
pub fn parse_program(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.block(&[])?;
    match parser.peek() {
        Token::Eof => Ok(Program { body }),
        other => Err(parser.error(format!("unexpected {}", describe(other)))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::Eof, |spanned| &spanned.token)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map_or(&Token::Eof, |spanned| &spanned.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.line)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                describe(token),
                describe(self.peek())
            )))
        }
    }

    /// The lowercased keyword at the cursor, if the cursor is on an identifier.
    fn keyword(&self) -> Option<String> {
        match self.peek() {
            Token::Ident(name) => Some(name.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.keyword().as_deref() == Some(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}', found {}", describe(self.peek()))))
        }
    }

    /// A statement ends with `;`, or implicitly at `?>` or end of input.
    fn terminator(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            Token::Semi => {
                self.advance();
                Ok(())
            }
            Token::CloseTag | Token::Eof => Ok(()),
            other => Err(self.error(format!("expected ';', found {}", describe(other)))),
        }
    }

    /// Statements up to (not including) one of the `until` keywords.
    fn block(&mut self, until: &[&str]) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Eof => {
                    if let Some(expected) = until.last() {
                        return Err(self.error(format!("missing '{expected}'")));
                    }
                    return Ok(body);
                }
                Token::CloseTag | Token::Semi => {
                    self.advance();
                }
                Token::Text(text) => {
                    body.push(Stmt::Text(text.clone()));
                    self.advance();
                }
                _ => {
                    if let Some(keyword) = self.keyword() {
                        if until.contains(&keyword.as_str()) {
                            return Ok(body);
                        }
                    }
                    body.push(self.statement()?);
                }
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.line();
        let keyword = self.keyword();
        match keyword.as_deref() {
            Some("echo") => {
                self.advance();
                let mut exprs = vec![self.expression()?];
                while self.eat(&Token::Comma) {
                    exprs.push(self.expression()?);
                }
                self.terminator()?;
                Ok(Stmt::Echo(exprs))
            }
            Some("if") => {
                self.advance();
                self.if_statement()
            }
            Some("while") => {
                self.advance();
                let condition = self.condition()?;
                self.expect(&Token::Colon)?;
                let body = self.block(&["endwhile"])?;
                self.expect_keyword("endwhile")?;
                self.terminator()?;
                Ok(Stmt::While(WhileStmt { condition, body }))
            }
            Some("foreach") => {
                self.advance();
                self.foreach_statement(line)
            }
            Some("break") => {
                self.advance();
                self.terminator()?;
                Ok(Stmt::Break { line })
            }
            Some("continue") => {
                self.advance();
                self.terminator()?;
                Ok(Stmt::Continue { line })
            }
            Some("include") => {
                self.advance();
                let target = self.expression()?;
                self.terminator()?;
                Ok(Stmt::Include { target, line })
            }
            Some("unset") if self.peek_at(1) == &Token::LParen => {
                self.advance();
                let targets = self.arguments()?;
                if let Some(bad) = targets.iter().find(|t| !t.is_lvalue()) {
                    return Err(self.error(format!("cannot unset {bad:?}")));
                }
                self.terminator()?;
                Ok(Stmt::Unset(targets))
            }
            Some(kw @ ("elseif" | "else" | "endif" | "endwhile" | "endforeach")) => {
                Err(self.error(format!("unexpected '{kw}'")))
            }
            _ => {
                let expr = self.expression()?;
                self.terminator()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `( expr )`
    fn condition(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(&Token::LParen)?;
        let expr = self.expression()?;
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let mut branches = Vec::new();
        let mut else_branch = None;

        let condition = self.condition()?;
        self.expect(&Token::Colon)?;
        let body = self.block(&["elseif", "else", "endif"])?;
        branches.push((condition, body));

        loop {
            if self.eat_keyword("elseif") {
                let condition = self.condition()?;
                self.expect(&Token::Colon)?;
                let body = self.block(&["elseif", "else", "endif"])?;
                branches.push((condition, body));
            } else if self.eat_keyword("else") {
                self.expect(&Token::Colon)?;
                else_branch = Some(self.block(&["endif"])?);
            } else {
                self.expect_keyword("endif")?;
                self.terminator()?;
                break;
            }
        }

        Ok(Stmt::If(IfStmt {
            branches,
            else_branch,
        }))
    }

    fn foreach_statement(&mut self, line: usize) -> Result<Stmt, SyntaxError> {
        self.expect(&Token::LParen)?;
        let subject = self.expression()?;
        self.expect_keyword("as")?;
        let first = self.loop_variable()?;
        let (key_var, value_var) = if self.eat(&Token::DoubleArrow) {
            (Some(first), self.loop_variable()?)
        } else {
            (None, first)
        };
        self.expect(&Token::RParen)?;
        self.expect(&Token::Colon)?;
        let body = self.block(&["endforeach"])?;
        self.expect_keyword("endforeach")?;
        self.terminator()?;
        Ok(Stmt::Foreach(ForeachStmt {
            subject,
            key_var,
            value_var,
            body,
            line,
        }))
    }

    fn loop_variable(&mut self) -> Result<String, SyntaxError> {
        match self.advance() {
            Token::Var(name) => Ok(name),
            other => Err(self.error(format!("expected loop variable, found {}", describe(&other)))),
        }
    }

    /// `( expr, ... )`, allowing a trailing comma.
    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            args.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.keyword_or()
    }

    fn keyword_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.keyword_and()?;
        while self.eat_keyword("or") {
            let right = self.keyword_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn keyword_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.assignment()?;
        while self.eat_keyword("and") {
            let right = self.assignment()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        let target = self.ternary()?;
        if self.peek() == &Token::Assign {
            if !target.is_lvalue() {
                return Err(self.error("cannot assign to this expression"));
            }
            self.advance();
            let value = self.assignment()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(target)
    }

    fn ternary(&mut self) -> Result<Expr, SyntaxError> {
        let condition = self.coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = if self.eat(&Token::Colon) {
            None
        } else {
            let then = self.assignment()?;
            self.expect(&Token::Colon)?;
            Some(Box::new(then))
        };
        let otherwise = self.assignment()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then,
            otherwise: Box::new(otherwise),
        })
    }

    fn coalesce(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.logical_or()?;
        if self.eat(&Token::Coalesce) {
            let right = self.coalesce()?;
            return Ok(Expr::Coalesce {
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.logical_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::Identical => BinaryOp::Identical,
                Token::NotIdentical => BinaryOp::NotIdentical,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.concat()?;
            left = binary(op, left, right);
        }
    }

    fn concat(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.additive()?;
        while self.eat(&Token::Dot) {
            let right = self.additive()?;
            left = binary(BinaryOp::Concat, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::LBracket => {
                    self.advance();
                    let index = if self.eat(&Token::RBracket) {
                        None
                    } else {
                        let index = self.expression()?;
                        self.expect(&Token::RBracket)?;
                        Some(Box::new(index))
                    };
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index,
                    };
                }
                Token::Arrow => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Ident(name) => name,
                        other => {
                            return Err(self.error(format!(
                                "expected property name, found {}",
                                describe(&other)
                            )));
                        }
                    };
                    expr = Expr::Property {
                        base: Box::new(expr),
                        name,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.advance() {
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Template(parts) => Ok(Expr::Interpolated(
                parts
                    .into_iter()
                    .map(|part| match part {
                        StrPart::Lit(s) => Expr::Literal(Value::String(s)),
                        StrPart::Var(name) => Expr::Var(name),
                    })
                    .collect(),
            )),
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.array_entries(&Token::RBracket),
            Token::Ident(name) => {
                let lower = name.to_ascii_lowercase();
                match lower.as_str() {
                    "true" => return Ok(Expr::Literal(Value::Bool(true))),
                    "false" => return Ok(Expr::Literal(Value::Bool(false))),
                    "null" => return Ok(Expr::Literal(Value::Null)),
                    _ => {}
                }
                if self.peek() != &Token::LParen {
                    return Ok(Expr::Constant(name));
                }
                if lower == "array" {
                    self.advance();
                    return self.array_entries(&Token::RParen);
                }
                let args = self.arguments()?;
                Ok(Expr::Call { name: lower, args })
            }
            other => {
                // Step back so the error points at the offending token.
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    /// Array entries after the opening bracket, up to `close`.
    fn array_entries(&mut self, close: &Token) -> Result<Expr, SyntaxError> {
        let mut entries = Vec::new();
        while !self.eat(close) {
            let first = self.expression()?;
            let entry = if self.eat(&Token::DoubleArrow) {
                (Some(first), self.expression()?)
            } else {
                (None, first)
            };
            entries.push(entry);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(Expr::Array(entries))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Text(_) => "text".to_string(),
        Token::CloseTag => "'?>'".to_string(),
        Token::Var(name) => format!("'${name}'"),
        Token::Ident(name) => format!("'{name}'"),
        Token::Int(i) => format!("'{i}'"),
        Token::Float(f) => format!("'{f}'"),
        Token::Str(_) | Token::Template(_) => "string".to_string(),
        Token::Eof => "end of input".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Semi => "';'".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Question => "'?'".to_string(),
        Token::Coalesce => "'??'".to_string(),
        Token::Arrow => "'->'".to_string(),
        Token::DoubleArrow => "'=>'".to_string(),
        Token::Assign => "'='".to_string(),
        other => format!("{other:?}"),
    }
}
