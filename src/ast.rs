//! Abstract Syntax Tree for Argand
//!
//! Every node carries the token that produced it, which supplies the
//! source line for diagnostics and, for operators, the operator kind.
//! Code generation is a single dispatch over these sums in `ir::lower`.

use crate::token::{Token, TypeId};

/// An expression node
#[derive(Debug, Clone)]
pub struct Expr {
    pub token: Token,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(token: Token, kind: ExprKind) -> Self {
        Self { token, kind }
    }

    pub fn line(&self) -> u32 {
        self.token.line
    }
}

/// Expression variants
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A variable reference; the name is the token text
    Ident,

    /// A literal; the value is in the token
    Constant(TypeId),

    /// A call; the callee (or the `Re`/`Im` builtin) is the token
    Call(Vec<Expr>),

    /// Absolute value `|e|`
    Abs(Box<Expr>),

    /// A pure imaginary: the wrapped expression is the imaginary part,
    /// the real part is zero. Produced by a trailing `i` marker.
    Complex(Box<Expr>),

    /// Arithmetic binary operation; the operator is the token
    Binary { lhs: Box<Expr>, rhs: Box<Expr> },

    /// Unary `+`/`-`; the operator is the token
    Unary(Box<Expr>),

    /// Logical `or`
    Disjunction { lhs: Box<Expr>, rhs: Box<Expr> },

    /// Logical `and`
    Conjunction { lhs: Box<Expr>, rhs: Box<Expr> },

    /// Logical `not`
    Negation(Box<Expr>),

    /// A comparison; the relational operator is the token
    Relation { lhs: Box<Expr>, rhs: Box<Expr> },
}

/// A statement node
#[derive(Debug, Clone)]
pub struct Stmt {
    pub token: Token,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(token: Token, kind: StmtKind) -> Self {
        Self { token, kind }
    }

    pub fn line(&self) -> u32 {
        self.token.line
    }
}

/// Statement variants
#[derive(Debug, Clone)]
pub enum StmtKind {
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Return(Expr),

    /// Assignment to an existing binding; the target is the token.
    /// The target's type is resolved against the symbol table during
    /// code generation.
    Assign(Expr),

    /// A new binding; the name is the token, the declared type is `ty`
    VarDef { ty: TypeId, init: Expr },

    /// A function prototype; the name is the token
    FunDecl { ret: TypeId, params: Vec<Param> },

    /// A function with a body; the name is the token
    FunDef {
        ret: TypeId,
        params: Vec<Param>,
        body: Box<Stmt>,
    },

    /// A braced block
    Sequence(Vec<Stmt>),
}

/// A function parameter; the name is the token
#[derive(Debug, Clone)]
pub struct Param {
    pub token: Token,
    pub ty: TypeId,
}
