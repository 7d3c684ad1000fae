//! Parser for Argand
//!
//! A recursive descent parser with one token of lookahead. The grammar
//! keeps the logical sublanguage (`or`/`and`/`not`/comparisons) separate
//! from arithmetic: conditions re-enter the conditional grammar inside
//! parentheses, so `(a == b) and c < d` parses while `(a) + 1 < 2` does
//! not.

use crate::ast::{Expr, ExprKind, Param, Stmt, StmtKind};
use crate::lexer::{Lexer, LexerError};
use crate::token::{Token, TokenKind, TypeId};
use thiserror::Error;

pub const NO_SEMICOLON: &str = "Missing semicolon ';'";
pub const NO_COLON: &str = "Missing colon ':'";
pub const NO_CLOSING_BRACKET: &str = "No match for opening bracket '('";
pub const NO_CURLY_BRACKET: &str = "Missing curly bracket '{'";
pub const NO_CLOSING_CURLY_BRACKET: &str = "No match for opening curly bracket '{'";

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{message} at line {line}")]
    Syntax { message: String, line: u32 },

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// The parser for Argand
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    /// One-token lookahead
    peek: Token,
    /// Line of the most recently consumed token, used for diagnostics
    line: u32,
}

impl<'src> Parser<'src> {
    /// Create a new parser; reads the first token immediately
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let peek = lexer.next_token()?;
        Ok(Self {
            lexer,
            peek,
            line: 1,
        })
    }

    /// Whether the whole input has been consumed
    pub fn at_end(&self) -> bool {
        self.peek.kind == TokenKind::Eof
    }

    /// Consume the current token and return it
    fn advance(&mut self) -> ParseResult<Token> {
        self.line = self.lexer.line();
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.peek, next))
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError::Syntax {
            message: message.into(),
            line: self.line,
        })
    }

    fn warning(&self, message: &str) {
        eprintln!("[WARNING] {} at line {}", message, self.line);
    }

    /// Consume a token of the given kind or fail with `message`
    fn match_token(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.peek.kind == kind {
            self.advance()
        } else {
            self.error(message)
        }
    }

    // ============ Top level ============

    /// Parse the next top-level statement: a global variable definition
    /// or a function declaration/definition
    pub fn parse_next(&mut self) -> ParseResult<Stmt> {
        match self.peek.kind {
            TokenKind::Type => self.variable_definition(),
            TokenKind::Fun => {
                self.advance()?;
                self.function_definition()
            }
            _ => self.error("Expected variable or function definition"),
        }
    }

    fn variable_definition(&mut self) -> ParseResult<Stmt> {
        let ty_token = self.advance()?;
        let ty = ty_token.as_type().unwrap_or(TypeId::None);

        if self.peek.kind != TokenKind::Ident {
            return self.error("Expected an identifier");
        }
        let name = self.advance()?;

        self.match_token(
            TokenKind::Assign,
            &format!("Variable {} was not initialized", name.text()),
        )?;
        let init = self.expression()?;
        self.match_token(TokenKind::Semicolon, NO_SEMICOLON)?;

        Ok(Stmt::new(name, StmtKind::VarDef { ty, init }))
    }

    /// Parse a function prototype or definition; the `fun` keyword has
    /// already been consumed. The name may be any token here — code
    /// generation rejects everything but an identifier or `main`.
    fn function_definition(&mut self) -> ParseResult<Stmt> {
        let name = self.advance()?;

        self.match_token(TokenKind::Colon, NO_COLON)?;
        if self.peek.kind != TokenKind::Type {
            return self.error(format!("Expected a return type for function {}", name.text()));
        }
        let ret_token = self.advance()?;
        let ret = ret_token.as_type().unwrap_or(TypeId::None);

        self.match_token(
            TokenKind::LParen,
            &format!("Expected parameter list for function {}", name.text()),
        )?;
        let params = self.parameters()?;
        self.match_token(TokenKind::RParen, NO_CLOSING_BRACKET)?;

        if self.peek.kind == TokenKind::Semicolon {
            self.advance()?;
            return Ok(Stmt::new(name, StmtKind::FunDecl { ret, params }));
        }

        let body = Box::new(self.block()?);
        Ok(Stmt::new(name, StmtKind::FunDef { ret, params, body }))
    }

    fn parameters(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek.kind == TokenKind::RParen {
            return Ok(params);
        }

        loop {
            if self.peek.kind != TokenKind::Ident {
                return self.error("Expected an identifier");
            }
            let name = self.advance()?;
            self.match_token(TokenKind::Colon, NO_COLON)?;
            if self.peek.kind != TokenKind::Type {
                return self.error(format!("Expected a type for parameter {}", name.text()));
            }
            let ty_token = self.advance()?;
            params.push(Param {
                token: name,
                ty: ty_token.as_type().unwrap_or(TypeId::None),
            });

            if self.peek.kind != TokenKind::Comma {
                break;
            }
            self.advance()?;
            if self.peek.kind == TokenKind::RParen {
                self.warning("Comma with no parameter after");
                break;
            }
        }

        Ok(params)
    }

    // ============ Statements ============

    fn statement(&mut self) -> ParseResult<Stmt> {
        match self.peek.kind {
            TokenKind::Return => {
                let token = self.advance()?;
                let expr = self.expression()?;
                self.match_token(TokenKind::Semicolon, NO_SEMICOLON)?;
                Ok(Stmt::new(token, StmtKind::Return(expr)))
            }
            TokenKind::If | TokenKind::While => self.conditional_statement(),
            TokenKind::Type => self.variable_definition(),
            TokenKind::Ident => self.assignment(),
            _ => self.error("Expected a statement"),
        }
    }

    fn conditional_statement(&mut self) -> ParseResult<Stmt> {
        let is_if = self.peek.kind == TokenKind::If;
        let token = self.advance()?;

        self.match_token(TokenKind::LParen, "Expected a conditional in brackets")?;
        let condition = self.conditional()?;
        self.match_token(TokenKind::RParen, NO_CLOSING_BRACKET)?;

        let body = Box::new(self.block()?);
        if !is_if {
            return Ok(Stmt::new(token, StmtKind::While { condition, body }));
        }

        let else_branch = if self.peek.kind == TokenKind::Else {
            self.advance()?;
            Some(Box::new(self.block()?))
        } else {
            None
        };
        Ok(Stmt::new(
            token,
            StmtKind::If {
                condition,
                then_branch: body,
                else_branch,
            },
        ))
    }

    /// A braced statement sequence, or a single statement
    fn block(&mut self) -> ParseResult<Stmt> {
        if self.peek.kind != TokenKind::LBrace {
            return self.statement();
        }

        let token = self.advance()?;
        let mut statements = Vec::new();
        while self.peek.kind != TokenKind::RBrace {
            if self.peek.kind == TokenKind::Eof {
                return self.error(NO_CLOSING_CURLY_BRACKET);
            }
            statements.push(self.statement()?);
        }
        self.advance()?; // '}'

        Ok(Stmt::new(token, StmtKind::Sequence(statements)))
    }

    fn assignment(&mut self) -> ParseResult<Stmt> {
        let name = self.advance()?;
        self.match_token(TokenKind::Assign, "Expected an assignment")?;
        let value = self.expression()?;
        self.match_token(TokenKind::Semicolon, NO_SEMICOLON)?;
        Ok(Stmt::new(name, StmtKind::Assign(value)))
    }

    // ============ Arithmetic expressions ============

    fn expression(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.term()?;
        while matches!(self.peek.kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance()?;
            let rhs = self.term()?;
            lhs = Expr::new(
                op,
                ExprKind::Binary {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.factor()?;
        while matches!(self.peek.kind, TokenKind::Star | TokenKind::Slash) {
            let op = self.advance()?;
            let rhs = self.factor()?;
            lhs = Expr::new(
                op,
                ExprKind::Binary {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        if matches!(self.peek.kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance()?;
            let inner = self.unary()?;
            return Ok(Expr::new(op, ExprKind::Unary(Box::new(inner))));
        }
        self.unary()
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let mut expr = match self.peek.kind {
            TokenKind::IntLiteral => {
                let token = self.advance()?;
                Expr::new(token, ExprKind::Constant(TypeId::Int))
            }
            TokenKind::DoubleLiteral => {
                let token = self.advance()?;
                Expr::new(token, ExprKind::Constant(TypeId::Double))
            }
            TokenKind::StringLiteral => {
                let token = self.advance()?;
                Expr::new(token, ExprKind::Constant(TypeId::String))
            }
            TokenKind::Ident | TokenKind::Imag | TokenKind::Re | TokenKind::Im => {
                self.call_or_var()?
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.expression()?;
                self.match_token(TokenKind::RParen, NO_CLOSING_BRACKET)?;
                inner
            }
            TokenKind::Pipe => {
                let token = self.advance()?;
                let inner = self.expression()?;
                self.match_token(TokenKind::Pipe, "No match for opening of absolute value '|'")?;
                Expr::new(token, ExprKind::Abs(Box::new(inner)))
            }
            _ => return self.error("Unexpected syntax"),
        };

        // A trailing imaginary-unit marker wraps the expression as the
        // imaginary part of a complex value: `a + 2i` is `a + (0 + 2i)`.
        if self.peek.kind == TokenKind::Imag {
            let marker = self.advance()?;
            expr = Expr::new(marker, ExprKind::Complex(Box::new(expr)));
        }
        Ok(expr)
    }

    fn call_or_var(&mut self) -> ParseResult<Expr> {
        let name = self.advance()?;
        if self.peek.kind != TokenKind::LParen {
            return Ok(Expr::new(name, ExprKind::Ident));
        }
        self.advance()?; // '('

        let mut args = Vec::new();
        if self.peek.kind != TokenKind::RParen {
            loop {
                args.push(self.expression()?);
                if self.peek.kind != TokenKind::Comma {
                    break;
                }
                self.advance()?;
                if self.peek.kind == TokenKind::RParen {
                    self.warning(&format!(
                        "Comma with no argument after in call to {}",
                        name.text()
                    ));
                    break;
                }
            }
        }
        self.match_token(TokenKind::RParen, NO_CLOSING_BRACKET)?;

        Ok(Expr::new(name, ExprKind::Call(args)))
    }

    // ============ Conditions ============

    fn conditional(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.conjunction()?;
        while self.peek.kind == TokenKind::Or {
            let op = self.advance()?;
            let rhs = self.conjunction()?;
            lhs = Expr::new(
                op,
                ExprKind::Disjunction {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.negation()?;
        while self.peek.kind == TokenKind::And {
            let op = self.advance()?;
            let rhs = self.negation()?;
            lhs = Expr::new(
                op,
                ExprKind::Conjunction {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn negation(&mut self) -> ParseResult<Expr> {
        if self.peek.kind == TokenKind::Not {
            let op = self.advance()?;
            let inner = self.relation()?;
            return Ok(Expr::new(op, ExprKind::Negation(Box::new(inner))));
        }
        self.relation()
    }

    /// A comparison, or a parenthesized condition. Parentheses here
    /// re-enter the conditional grammar, not the arithmetic one.
    fn relation(&mut self) -> ParseResult<Expr> {
        if self.peek.kind == TokenKind::LParen {
            self.advance()?;
            let inside = self.conditional()?;
            self.match_token(TokenKind::RParen, NO_CLOSING_BRACKET)?;
            return Ok(inside);
        }

        let lhs = self.expression()?;
        if !self.peek.kind.is_relational() {
            return self.error("Expected a relational operator");
        }
        let op = self.advance()?;
        let rhs = self.expression()?;
        Ok(Expr::new(
            op,
            ExprKind::Relation {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let mut parser = Parser::new(source).expect("lexer failed on first token");
        parser.parse_next().expect("parse failed")
    }

    fn parse_err(source: &str) -> ParseError {
        let mut parser = Parser::new(source).expect("lexer failed on first token");
        loop {
            match parser.parse_next() {
                Ok(_) if !parser.at_end() => continue,
                Ok(_) => panic!("expected a parse error"),
                Err(e) => return e,
            }
        }
    }

    fn body_of(stmt: Stmt) -> Vec<Stmt> {
        let StmtKind::FunDef { body, .. } = stmt.kind else {
            panic!("expected a function definition");
        };
        let StmtKind::Sequence(stmts) = body.kind else {
            panic!("expected a statement sequence");
        };
        stmts
    }

    #[test]
    fn arithmetic_shapes() {
        let stmt = parse_one(
            "fun main : int () { \
               int a = -1 + 2 * 3; \
               a = (1 - 2) / |3|; \
               return 0; \
             }",
        );
        let stmts = body_of(stmt);
        assert_eq!(stmts.len(), 3);

        // -1 + 2 * 3  =>  +(unary-(1), *(2, 3))
        let StmtKind::VarDef { ty, init } = &stmts[0].kind else {
            panic!("expected a variable definition");
        };
        assert_eq!(*ty, TypeId::Int);
        assert_eq!(init.token.kind, TokenKind::Plus);
        let ExprKind::Binary { lhs, rhs } = &init.kind else {
            panic!("expected a binary operation");
        };
        assert_eq!(lhs.token.kind, TokenKind::Minus);
        let ExprKind::Unary(negated) = &lhs.kind else {
            panic!("expected a unary operation");
        };
        assert!(matches!(negated.kind, ExprKind::Constant(TypeId::Int)));
        assert_eq!(rhs.token.kind, TokenKind::Star);

        // (1 - 2) / |3|  =>  /(-(1, 2), |3|)
        let StmtKind::Assign(value) = &stmts[1].kind else {
            panic!("expected an assignment");
        };
        assert_eq!(value.token.kind, TokenKind::Slash);
        let ExprKind::Binary { lhs, rhs } = &value.kind else {
            panic!("expected a binary operation");
        };
        assert_eq!(lhs.token.kind, TokenKind::Minus);
        assert!(matches!(rhs.kind, ExprKind::Abs(_)));

        assert!(matches!(stmts[2].kind, StmtKind::Return(_)));
    }

    #[test]
    fn logical_shapes() {
        let stmt = parse_one(
            "fun main : int () { \
               if (1 == 1 and 1 != 0 or not 1 < 0) { return 0; } \
               while (1 <= 1 and not (1 > 0 or 1 >= 0)) { return -1; } \
               return 2; \
             }",
        );
        let stmts = body_of(stmt);

        // or(and(==, !=), not(<))
        let StmtKind::If { condition, .. } = &stmts[0].kind else {
            panic!("expected an if statement");
        };
        let ExprKind::Disjunction { lhs, rhs } = &condition.kind else {
            panic!("expected a disjunction");
        };
        let ExprKind::Conjunction { lhs: ll, rhs: lr } = &lhs.kind else {
            panic!("expected a conjunction");
        };
        assert_eq!(ll.token.kind, TokenKind::EqEq);
        assert_eq!(lr.token.kind, TokenKind::NotEq);
        let ExprKind::Negation(negated) = &rhs.kind else {
            panic!("expected a negation");
        };
        assert_eq!(negated.token.kind, TokenKind::Lt);

        // and(<=, not(or(>, >=)))
        let StmtKind::While { condition, .. } = &stmts[1].kind else {
            panic!("expected a while statement");
        };
        let ExprKind::Conjunction { lhs, rhs } = &condition.kind else {
            panic!("expected a conjunction");
        };
        assert_eq!(lhs.token.kind, TokenKind::LtEq);
        let ExprKind::Negation(negated) = &rhs.kind else {
            panic!("expected a negation");
        };
        let ExprKind::Disjunction { lhs: rl, rhs: rr } = &negated.kind else {
            panic!("expected a disjunction");
        };
        assert_eq!(rl.token.kind, TokenKind::Gt);
        assert_eq!(rr.token.kind, TokenKind::GtEq);
    }

    #[test]
    fn missing_semicolon() {
        let err = parse_err("fun main : int () { int a = 0 return a; }");
        assert!(err.to_string().contains(NO_SEMICOLON));
    }

    #[test]
    fn missing_colon() {
        let err = parse_err("fun main int () {}");
        assert!(err.to_string().contains(NO_COLON));
    }

    #[test]
    fn missing_closing_brace() {
        let err = parse_err("fun main : int () { return 0;");
        assert!(err.to_string().contains(NO_CLOSING_CURLY_BRACKET));
    }

    #[test]
    fn unparenthesized_condition() {
        let err = parse_err("fun main : int () { if 1 == 1 { return 0; } return 0; }");
        assert!(err.to_string().contains("Expected a conditional in brackets"));
    }

    #[test]
    fn prototype_ends_with_semicolon() {
        let stmt = parse_one("fun f : double (a : int, b : complex);");
        let StmtKind::FunDecl { ret, params } = stmt.kind else {
            panic!("expected a function declaration");
        };
        assert_eq!(ret, TypeId::Double);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].token.text(), "a");
        assert_eq!(params[1].ty, TypeId::Complex);
    }

    #[test]
    fn trailing_comma_in_parameters_is_tolerated() {
        let stmt = parse_one("fun f : int (a : int,);");
        let StmtKind::FunDecl { params, .. } = stmt.kind else {
            panic!("expected a function declaration");
        };
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn trailing_comma_in_arguments_is_tolerated() {
        let stmt = parse_one("fun main : int () { int x = f(1, 2,); return x; }");
        let stmts = body_of(stmt);
        let StmtKind::VarDef { init, .. } = &stmts[0].kind else {
            panic!("expected a variable definition");
        };
        let ExprKind::Call(args) = &init.kind else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn trailing_imaginary_wraps_unary() {
        let stmt = parse_one("complex z = 1 + 2i;");
        let StmtKind::VarDef { init, .. } = &stmt.kind else {
            panic!("expected a variable definition");
        };
        let ExprKind::Binary { rhs, .. } = &init.kind else {
            panic!("expected a binary operation");
        };
        assert!(matches!(rhs.kind, ExprKind::Complex(_)));
    }

    #[test]
    fn single_statement_block() {
        let stmt = parse_one("fun main : int () return 0;");
        let StmtKind::FunDef { body, .. } = stmt.kind else {
            panic!("expected a function definition");
        };
        assert!(matches!(body.kind, StmtKind::Return(_)));
    }

    #[test]
    fn top_level_garbage_is_rejected() {
        let err = parse_err("return 0;");
        assert!(err
            .to_string()
            .contains("Expected variable or function definition"));
    }
}
