//! IR instructions
//!
//! Instruction definitions for the Argand IR.

use super::types::{BlockId, Constant, IrType, VReg};
use std::fmt;

/// An instruction in the IR
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Result register (None for void instructions)
    pub result: Option<VReg>,
    /// The instruction kind
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, kind: InstrKind) -> Self {
        Self { result, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone)]
pub enum InstrKind {
    /// Load a constant value
    Const(Constant),

    // ============ Integer arithmetic ============
    Add(VReg, VReg),
    Sub(VReg, VReg),
    Mul(VReg, VReg),
    /// Signed integer division
    SDiv(VReg, VReg),

    // ============ Floating point ============
    FAdd(VReg, VReg),
    FSub(VReg, VReg),
    FMul(VReg, VReg),
    FDiv(VReg, VReg),

    // ============ Boolean (i1) ============
    And(VReg, VReg),
    Or(VReg, VReg),
    Not(VReg),

    // ============ Comparison ============
    /// Signed integer comparison
    ICmp(CmpOp, VReg, VReg),
    /// Ordered float comparison
    FCmp(CmpOp, VReg, VReg),

    // ============ Conversion ============
    /// Signed integer to floating point
    SIToFP(VReg, IrType),

    // ============ Memory ============
    /// Allocate stack space in the current frame
    Alloca(IrType),
    /// Load from a pointer
    Load(VReg),
    /// Store to a pointer (ptr, value)
    Store(VReg, VReg),
    /// Pointer to a struct field (ptr, field index)
    GetFieldPtr(VReg, u32),

    // ============ Misc ============
    /// Call a function by name
    Call { func: String, args: Vec<VReg> },
    /// Pointer to a global
    GlobalRef(String),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    /// Less than (signed / ordered)
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        };
        write!(f, "{}", s)
    }
}

/// Block terminators
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return from function
    Ret(Option<VReg>),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        match &self.kind {
            InstrKind::Const(c) => write!(f, "const {}", c),
            InstrKind::Add(a, b) => write!(f, "add {}, {}", a, b),
            InstrKind::Sub(a, b) => write!(f, "sub {}, {}", a, b),
            InstrKind::Mul(a, b) => write!(f, "mul {}, {}", a, b),
            InstrKind::SDiv(a, b) => write!(f, "sdiv {}, {}", a, b),
            InstrKind::FAdd(a, b) => write!(f, "fadd {}, {}", a, b),
            InstrKind::FSub(a, b) => write!(f, "fsub {}, {}", a, b),
            InstrKind::FMul(a, b) => write!(f, "fmul {}, {}", a, b),
            InstrKind::FDiv(a, b) => write!(f, "fdiv {}, {}", a, b),
            InstrKind::And(a, b) => write!(f, "and {}, {}", a, b),
            InstrKind::Or(a, b) => write!(f, "or {}, {}", a, b),
            InstrKind::Not(v) => write!(f, "not {}", v),
            InstrKind::ICmp(op, a, b) => write!(f, "icmp {} {}, {}", op, a, b),
            InstrKind::FCmp(op, a, b) => write!(f, "fcmp {} {}, {}", op, a, b),
            InstrKind::SIToFP(v, ty) => write!(f, "sitofp {} to {}", v, ty),
            InstrKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstrKind::Load(ptr) => write!(f, "load {}", ptr),
            InstrKind::Store(ptr, val) => write!(f, "store {}, {}", ptr, val),
            InstrKind::GetFieldPtr(ptr, idx) => write!(f, "getfieldptr {}, {}", ptr, idx),
            InstrKind::Call { func, args } => {
                write!(f, "call {}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::GlobalRef(name) => write!(f, "globalref @{}", name),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(v)) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {}, {}, {}", cond, then_block, else_block),
        }
    }
}
