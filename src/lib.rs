//! Argand compiler
//!
//! Argand is a small statically typed expression language with
//! first-class complex numbers: `int`, `double`, `complex` and `string`
//! primitives, functions with fixed arity, `if`/`else` and `while`, the
//! absolute-value form `|e|`, and the complex projections `Re(e)` and
//! `Im(e)`. A trailing `i` turns a value into a pure imaginary, so
//! `2 + 3i` is a complex constant.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.ag)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST (one top-level statement at a time)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Lowerer   │  → Argand IR
//! └─────────────┘
//!       │
//!       ▼
//!   Textual IR module
//! ```
//!
//! Each top-level statement is lowered as soon as it is parsed; after the
//! whole input is consumed, the deferred initializers of module-scope
//! variables are spliced into the head of `main`.

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod ir;

// Re-exports for convenience
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind, TypeId};

use crate::ir::{print_module, Lowerer};
use crate::lexer::LexerError;
use crate::parser::ParseError;
use std::io::Write;
use thiserror::Error;

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for Argand source files
pub const FILE_EXTENSION: &str = "ag";

/// Any failure of the compilation pipeline, tagged by phase
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("parse error: {0}")]
    Parse(ParseError),

    #[error("codegen error: {0}")]
    Codegen(#[from] ir::CodegenError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Lexer(inner) => CompileError::Lexer(inner),
            other => CompileError::Parse(other),
        }
    }
}

/// Compile a whole source text and serialize the resulting IR module to
/// `output`.
///
/// Top-level statements are code-generated in parse order; a call target
/// must therefore be declared or defined earlier in the file. Deferred
/// global initializers are the exception: they are evaluated at the very
/// start of `main`, after the whole file has been processed.
pub fn compile(
    module_name: &str,
    source: &str,
    output: &mut dyn Write,
) -> Result<(), CompileError> {
    let mut parser = Parser::new(source)?;
    let mut lowerer = Lowerer::new(module_name);

    while !parser.at_end() {
        let stmt = parser.parse_next()?;
        lowerer.generate(stmt)?;
    }
    lowerer.init_globals()?;

    let module = lowerer.finish();
    output.write_all(print_module(&module).as_bytes())?;
    Ok(())
}
