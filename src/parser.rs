//! Parser for host matrix expressions
//!
//! Parses programs like:
//! - `C = (A @ B + 10).T`
//! - `D = np.exp(A * 2) + B`
//! - `E = np.transpose(A) @ B; F = log(E)`

use crate::ast::{HostExpr, Program, Statement};
use crate::error::{KernelError, KernelResult};
use crate::lexer::{Lexer, Token};

/// Parser for host expressions
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Tokenize `source`; unrecognized characters are a lexer error.
    ///
    /// Newlines separate statements, except inside parentheses.
    pub fn new(source: &str) -> KernelResult<Self> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;

        for item in Lexer::new(source) {
            let (_, token) = item.map_err(|position| KernelError::LexerError {
                position,
                message: format!(
                    "unexpected character {:?}",
                    source[position..].chars().next().unwrap_or(' ')
                ),
            })?;
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Newline if depth > 0 => continue,
                _ => {}
            }
            tokens.push(token);
        }

        Ok(Self { tokens, pos: 0 })
    }

    fn at_separator(&self) -> bool {
        self.check(&Token::Semicolon) || self.check(&Token::Newline)
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Advance to the next token
    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Check if current token matches expected
    fn check(&self, expected: &Token) -> bool {
        match self.current() {
            Some(tok) => std::mem::discriminant(tok) == std::mem::discriminant(expected),
            None => false,
        }
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, expected: Token) -> KernelResult<()> {
        if self.check(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(KernelError::parse_error(format!(
                "Expected '{}', got {}",
                expected,
                self.describe_current()
            )))
        }
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(tok) => format!("'{}'", tok),
            None => "end of input".to_string(),
        }
    }

    /// Parse a complete program (statements separated by `;` or newlines)
    pub fn parse_program(&mut self) -> KernelResult<Program> {
        let mut statements = Vec::new();

        loop {
            while self.at_separator() {
                self.advance();
            }
            if self.current().is_none() {
                break;
            }

            statements.push(self.parse_statement()?);

            if self.current().is_some() && !self.at_separator() {
                return Err(KernelError::parse_error(format!(
                    "Expected ';' or newline after statement, got {}",
                    self.describe_current()
                )));
            }
        }

        if statements.is_empty() {
            return Err(KernelError::parse_error("Empty program"));
        }

        Ok(Program { statements })
    }

    /// Parse a single statement
    fn parse_statement(&mut self) -> KernelResult<Statement> {
        if let (Some(Token::Ident(name)), Some(Token::Equals)) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let target = name.clone();
            self.pos += 2;
            let value = self.parse_expr()?;
            return Ok(Statement::Assignment { target, value });
        }

        let expr = self.parse_expr()?;
        Ok(Statement::Expression(expr))
    }

    /// Parse an expression (handles operator precedence)
    pub fn parse_expr(&mut self) -> KernelResult<HostExpr> {
        self.parse_additive()
    }

    /// Parse additive expressions: a + b, a - b
    fn parse_additive(&mut self) -> KernelResult<HostExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            if self.check(&Token::Plus) {
                self.advance();
                let right = self.parse_multiplicative()?;
                left = HostExpr::Add(Box::new(left), Box::new(right));
            } else if self.check(&Token::Minus) {
                self.advance();
                let right = self.parse_multiplicative()?;
                left = HostExpr::Sub(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }

        Ok(left)
    }

    /// Parse multiplicative expressions: a * b, a / b
    fn parse_multiplicative(&mut self) -> KernelResult<HostExpr> {
        let mut left = self.parse_matmul()?;

        loop {
            if self.check(&Token::Star) {
                self.advance();
                let right = self.parse_matmul()?;
                left = HostExpr::Mul(Box::new(left), Box::new(right));
            } else if self.check(&Token::Slash) {
                self.advance();
                let right = self.parse_matmul()?;
                left = HostExpr::Div(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }

        Ok(left)
    }

    /// Parse matrix multiplication: a @ b
    fn parse_matmul(&mut self) -> KernelResult<HostExpr> {
        let mut left = self.parse_unary()?;
        while self.check(&Token::MatMul) {
            self.advance();
            let right = self.parse_unary()?;
            left = HostExpr::MatMul(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse unary expressions: -a
    fn parse_unary(&mut self) -> KernelResult<HostExpr> {
        if self.check(&Token::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            Ok(HostExpr::Neg(Box::new(operand)))
        } else {
            self.parse_postfix()
        }
    }

    /// Parse postfix expressions: a.T
    fn parse_postfix(&mut self) -> KernelResult<HostExpr> {
        let mut expr = self.parse_primary()?;

        while self.check(&Token::Dot) {
            self.advance();
            match self.advance() {
                Some(Token::Ident(name)) if name == "T" => {
                    expr = HostExpr::Transpose(Box::new(expr));
                }
                Some(Token::Ident(name)) => {
                    return Err(KernelError::parse_error(format!(
                        "Unknown attribute: {}",
                        name
                    )));
                }
                _ => return Err(KernelError::parse_error("Expected identifier after '.'")),
            }
        }

        Ok(expr)
    }

    /// Parse primary expressions: literals, variables, parenthesized, function calls
    fn parse_primary(&mut self) -> KernelResult<HostExpr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(HostExpr::Scalar(n)),

            Some(Token::Ident(name)) => {
                // numpy-style function: np.func(...)
                if name == "np" && self.check(&Token::Dot) {
                    self.advance();
                    return match self.advance() {
                        Some(Token::Ident(func_name)) => {
                            let args = self.parse_args()?;
                            Ok(HostExpr::FunctionCall {
                                name: format!("np.{}", func_name),
                                args,
                            })
                        }
                        _ => Err(KernelError::parse_error("Expected function name after 'np.'")),
                    };
                }

                if self.check(&Token::LParen) {
                    let args = self.parse_args()?;
                    return Ok(HostExpr::FunctionCall { name, args });
                }

                Ok(HostExpr::Variable(name))
            }

            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }

            None => Err(KernelError::parse_error("Unexpected end of input")),

            Some(other) => Err(KernelError::parse_error(format!(
                "Unexpected token: '{}'",
                other
            ))),
        }
    }

    /// Parse function arguments: (arg1, arg2, ...)
    fn parse_args(&mut self) -> KernelResult<Vec<HostExpr>> {
        self.expect(Token::LParen)?;

        let mut args = Vec::new();

        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);

            while self.check(&Token::Comma) {
                self.advance();
                if self.check(&Token::RParen) {
                    break; // Trailing comma
                }
                args.push(self.parse_expr()?);
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }
}
