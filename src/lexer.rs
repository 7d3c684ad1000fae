//! Lexer for Argand
//!
//! The lexer converts source code into a stream of tokens. Token matching
//! is done with the `logos` crate; this wrapper adds what the token table
//! cannot express: 1-based line tracking, literal value extraction, and
//! the context-dependent classification of `i` as the imaginary unit.

use crate::token::{Token, TokenKind, TokenValue, TypeId};
use logos::Logos;
use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[error("Invalid token {ch} at line {line}")]
    InvalidToken { ch: char, line: u32 },

    #[error("String literal at line {line} not closed")]
    UnterminatedString { line: u32 },

    #[error("Number literal out of range at line {line}")]
    NumberOutOfRange { line: u32 },
}

/// The lexer for Argand.
///
/// `previous` caches the kind of the last emitted token in order to
/// distinguish `i` as a variable name from `i` as the imaginary unit.
/// Only occurrences immediately following an integer, a double, a closing
/// bracket, an identifier or a `|` are classified as the imaginary unit,
/// so `2i`, `(x)i`, `|z|i` and `a i` denote scaled imaginaries while a
/// lone `i` stays an ordinary variable name.
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    previous: TokenKind,
    line: u32,
    /// Byte offset up to which `line` is accurate
    scanned: usize,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            previous: TokenKind::Eof,
            line: 1,
            scanned: 0,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// The line the lexer has scanned up to
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Advance the line counter to the given byte offset
    fn advance_line(&mut self, offset: usize) {
        let newlines = self.source[self.scanned..offset]
            .bytes()
            .filter(|&b| b == b'\n')
            .count();
        self.line += newlines as u32;
        self.scanned = offset;
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                self.advance_line(span.start);
                let token = self.classify(kind, self.inner.slice())?;
                self.previous = token.kind;
                Ok(token)
            }
            Some(Err(())) => {
                let span = self.inner.span();
                self.advance_line(span.start);
                let ch = self.source[span.start..].chars().next().unwrap_or('\0');
                if ch == '"' {
                    Err(LexerError::UnterminatedString { line: self.line })
                } else {
                    Err(LexerError::InvalidToken {
                        ch,
                        line: self.line,
                    })
                }
            }
            None => {
                self.advance_line(self.source.len());
                self.previous = TokenKind::Eof;
                Ok(Token::new(TokenKind::Eof, TokenValue::None, self.line))
            }
        }
    }

    /// Attach the token value, applying the imaginary-unit rule
    fn classify(&self, kind: TokenKind, slice: &str) -> Result<Token, LexerError> {
        let line = self.line;
        let token = match kind {
            TokenKind::IntLiteral => {
                let value = slice
                    .parse::<i64>()
                    .map_err(|_| LexerError::NumberOutOfRange { line })?;
                Token::new(kind, TokenValue::Int(value), line)
            }
            TokenKind::DoubleLiteral => {
                let value = slice
                    .parse::<f64>()
                    .map_err(|_| LexerError::NumberOutOfRange { line })?;
                Token::new(kind, TokenValue::Double(value), line)
            }
            TokenKind::StringLiteral => {
                Token::new(kind, TokenValue::Str(unescape(slice)), line)
            }
            TokenKind::Type => {
                let id = match slice {
                    "int" => TypeId::Int,
                    "double" => TypeId::Double,
                    "complex" => TypeId::Complex,
                    _ => TypeId::String,
                };
                Token::new(kind, TokenValue::Type(id), line)
            }
            TokenKind::Ident if slice == "i" && self.imag_position() => {
                Token::new(TokenKind::Imag, TokenValue::Str(slice.to_string()), line)
            }
            // Keywords keep their lexeme so diagnostics can name them
            TokenKind::Ident
            | TokenKind::Fun
            | TokenKind::Main
            | TokenKind::Or
            | TokenKind::And
            | TokenKind::Not
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::While
            | TokenKind::Return
            | TokenKind::Re
            | TokenKind::Im => Token::new(kind, TokenValue::Str(slice.to_string()), line),
            _ => Token::new(kind, TokenValue::None, line),
        };
        Ok(token)
    }

    /// Whether an `i` in this position is the imaginary unit
    fn imag_position(&self) -> bool {
        matches!(
            self.previous,
            TokenKind::IntLiteral
                | TokenKind::DoubleLiteral
                | TokenKind::RParen
                | TokenKind::Ident
                | TokenKind::Pipe
        )
    }

    /// Collect all tokens up to and including the end-of-input token
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Strip the quotes off a string literal and process escapes.
///
/// `\n` and `\t` are recognized; any other escaped character stands for
/// itself.
fn unescape(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn first_token(source: &str) -> Result<Token, LexerError> {
        Lexer::new(source).next_token()
    }

    #[test]
    fn empty_source() {
        let kinds = token_kinds("");
        assert_eq!(kinds, vec![TokenKind::Eof]);
    }

    #[test]
    fn whitespace_only() {
        let kinds = token_kinds("   \t\n  ");
        assert_eq!(kinds, vec![TokenKind::Eof]);
    }

    #[test]
    fn integer() {
        let token = first_token("420").unwrap();
        assert_eq!(token.kind, TokenKind::IntLiteral);
        assert_eq!(token.as_int(), Some(420));
    }

    #[test]
    fn double() {
        let token = first_token("420.42").unwrap();
        assert_eq!(token.kind, TokenKind::DoubleLiteral);
        assert_eq!(token.as_double(), Some(420.42));
    }

    #[test]
    fn double_with_empty_fraction() {
        let token = first_token("420.").unwrap();
        assert_eq!(token.kind, TokenKind::DoubleLiteral);
        assert_eq!(token.as_double(), Some(420.0));
    }

    #[test]
    fn complex_literal_sequence() {
        let kinds = token_kinds("420 + 4.2i");
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::DoubleLiteral,
                TokenKind::Imag,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn relational_operators() {
        let kinds = token_kinds("\t==\t !=\t <\t <= > >=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_literal() {
        let token = first_token("\"Hello world!\\n\"").unwrap();
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.text(), "Hello world!\n");
    }

    #[test]
    fn unterminated_string() {
        let err = first_token("\"Hello world!").unwrap_err();
        assert!(matches!(err, LexerError::UnterminatedString { line: 1 }));
    }

    #[test]
    fn string_spanning_lines() {
        let mut lexer = Lexer::new("\"a\nb\" 7");
        let string = lexer.next_token().unwrap();
        assert_eq!(string.text(), "a\nb");
        let number = lexer.next_token().unwrap();
        assert_eq!(number.kind, TokenKind::IntLiteral);
        assert_eq!(number.line, 2);
    }

    #[test]
    fn identifier() {
        let token = first_token("_variable123").unwrap();
        assert_eq!(token.kind, TokenKind::Ident);
        assert_eq!(token.text(), "_variable123");
    }

    #[test]
    fn keywords() {
        let kinds =
            token_kinds("int double complex string fun main or and not if while return Re Im");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Type,
                TokenKind::Type,
                TokenKind::Type,
                TokenKind::Type,
                TokenKind::Fun,
                TokenKind::Main,
                TokenKind::Or,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::If,
                TokenKind::While,
                TokenKind::Return,
                TokenKind::Re,
                TokenKind::Im,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn type_keyword_values() {
        let tokens = Lexer::new("int double complex string").tokenize().unwrap();
        let ids: Vec<_> = tokens[..4].iter().map(|t| t.as_type()).collect();
        assert_eq!(
            ids,
            vec![
                Some(TypeId::Int),
                Some(TypeId::Double),
                Some(TypeId::Complex),
                Some(TypeId::String)
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        let kinds = token_kinds("Int dOuble re iM RETURN");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lone_i_is_identifier() {
        let token = first_token("i").unwrap();
        assert_eq!(token.kind, TokenKind::Ident);
    }

    #[test]
    fn imaginary_after_value_positions() {
        for source in ["2i", "4.2i", "(x)i", "|z|i", "a i"] {
            let tokens = Lexer::new(source).tokenize().unwrap();
            let last = &tokens[tokens.len() - 2];
            assert_eq!(last.kind, TokenKind::Imag, "in {:?}", source);
        }
    }

    #[test]
    fn adjacent_letters_lex_as_one_identifier() {
        // `ai` is a single name; only a standalone `i` can be imaginary
        let kinds = token_kinds("ai");
        assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn i_after_operator_is_identifier() {
        let kinds = token_kinds("1 + i");
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bare_bang_is_error() {
        let err = first_token("!").unwrap_err();
        assert!(matches!(err, LexerError::InvalidToken { ch: '!', .. }));
    }

    #[test]
    fn assignment_sequence() {
        let mut lexer = Lexer::new("int i = 0");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Type);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Assign);
        let zero = lexer.next_token().unwrap();
        assert_eq!(zero.kind, TokenKind::IntLiteral);
        assert_eq!(zero.as_int(), Some(0));
    }

    #[test]
    fn single_printable_characters() {
        for b in b'!'..=b'~' {
            let c = b as char;
            if c == '"' {
                continue;
            }
            let source = c.to_string();
            let result = first_token(&source);
            let expected = match c {
                'a'..='z' | 'A'..='Z' | '_' => Some(TokenKind::Ident),
                '0'..='9' => Some(TokenKind::IntLiteral),
                '=' => Some(TokenKind::Assign),
                '<' => Some(TokenKind::Lt),
                '>' => Some(TokenKind::Gt),
                '+' => Some(TokenKind::Plus),
                '-' => Some(TokenKind::Minus),
                '*' => Some(TokenKind::Star),
                '/' => Some(TokenKind::Slash),
                ';' => Some(TokenKind::Semicolon),
                ':' => Some(TokenKind::Colon),
                ',' => Some(TokenKind::Comma),
                '{' => Some(TokenKind::LBrace),
                '}' => Some(TokenKind::RBrace),
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                '|' => Some(TokenKind::Pipe),
                _ => None,
            };
            match expected {
                Some(kind) => assert_eq!(result.unwrap().kind, kind, "for {:?}", c),
                None => assert!(result.is_err(), "expected an error for {:?}", c),
            }
        }
    }

    #[test]
    fn line_tracking() {
        let tokens = Lexer::new("1\n2\n\n3").tokenize().unwrap();
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4, 4]);
    }
}
