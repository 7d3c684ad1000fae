//! Token definitions for Argand
//!
//! This module defines all the tokens that the lexer can produce.

use logos::Logos;
use std::fmt;

/// The primitive types of the language.
///
/// `None` is a placeholder for identifiers whose type is resolved later
/// against the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeId {
    Int,
    Double,
    Complex,
    String,
    None,
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeId::Int => "int",
            TypeId::Double => "double",
            TypeId::Complex => "complex",
            TypeId::String => "string",
            TypeId::None => "<unresolved>",
        };
        write!(f, "{}", s)
    }
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// 1-based source line
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, line: u32) -> Self {
        Self { kind, value, line }
    }

    /// The identifier, keyword or string payload of this token.
    ///
    /// Empty for tokens that carry no text.
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Str(s) => s,
            _ => "",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            TokenValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.value {
            TokenValue::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeId> {
        match self.value {
            TokenValue::Type(t) => Some(t),
            _ => None,
        }
    }
}

/// The payload of a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Int(i64),
    Double(f64),
    /// Identifier, keyword or string-literal text
    Str(String),
    Type(TypeId),
}

/// All possible token types in Argand
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
pub enum TokenKind {
    // ============ Literals ============
    /// Integer literal: 42
    #[regex(r"[0-9]+", priority = 2)]
    IntLiteral,

    /// Double literal: 3.14, 420. — no exponent syntax
    #[regex(r"[0-9]+\.[0-9]*")]
    DoubleLiteral,

    /// String literal: "hello", may span lines
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    /// The imaginary-unit marker. Never matched directly: the lexer turns
    /// an `i` identifier into this kind depending on the previous token.
    Imag,

    // ============ Keywords ============
    /// Type keyword; which type is carried in the token value
    #[token("int")]
    #[token("double")]
    #[token("complex")]
    #[token("string")]
    Type,

    #[token("fun")]
    Fun,
    #[token("main")]
    Main,
    #[token("or")]
    Or,
    #[token("and")]
    And,
    #[token("not")]
    Not,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("Re")]
    Re,
    #[token("Im")]
    Im,

    // ============ Operators ============
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    // ============ Punctuation ============
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("|")]
    Pipe,

    // ============ Identifiers ============
    /// Identifier: foo, _bar123
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ============ Special ============
    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this token is one of the six relational operators
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::IntLiteral => "integer",
            TokenKind::DoubleLiteral => "double",
            TokenKind::StringLiteral => "string",
            TokenKind::Imag => "i",
            TokenKind::Type => "type",
            TokenKind::Fun => "fun",
            TokenKind::Main => "main",
            TokenKind::Or => "or",
            TokenKind::And => "and",
            TokenKind::Not => "not",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Return => "return",
            TokenKind::Re => "Re",
            TokenKind::Im => "Im",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Pipe => "|",
            TokenKind::Ident => "identifier",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", s)
    }
}
