//! IR types
//!
//! Type and container definitions for the Argand IR: a small typed
//! SSA-style representation with textual serialization.

use std::fmt;

/// A virtual register (SSA value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// IR types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrType {
    /// Boolean (1 bit)
    Bool,
    /// 8-bit integer (string bytes)
    I8,
    /// 64-bit signed integer
    I64,
    /// 64-bit IEEE-754 float
    F64,
    /// Pointer to another type
    Ptr(Box<IrType>),
    /// Array of elements (string constants)
    Array(Box<IrType>, usize),
    /// Struct with positional fields
    Struct(Vec<IrType>),
}

impl IrType {
    pub fn ptr(inner: IrType) -> Self {
        IrType::Ptr(Box::new(inner))
    }

    /// The two-double record representing a complex number
    pub fn complex() -> Self {
        IrType::Struct(vec![IrType::F64, IrType::F64])
    }

    /// Null-terminated byte string pointer
    pub fn string() -> Self {
        IrType::ptr(IrType::I8)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Bool => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I64 => write!(f, "i64"),
            IrType::F64 => write!(f, "f64"),
            IrType::Ptr(inner) => write!(f, "*{}", inner),
            IrType::Array(elem, size) => write!(f, "[{} x {}]", size, elem),
            IrType::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A module contains functions and global definitions
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A function in the IR
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<(VReg, IrType)>,
    pub ret_type: IrType,
    pub blocks: Vec<BasicBlock>,
    pub is_external: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<(VReg, IrType)>, ret_type: IrType) -> Self {
        Self {
            name: name.into(),
            params,
            ret_type,
            blocks: Vec::new(),
            is_external: false,
        }
    }

    pub fn has_body(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Structural sanity check run after a function body is emitted:
    /// at least one block, every block terminated, every branch target
    /// present in the function.
    pub fn verify(&self) -> Result<(), String> {
        if self.is_external {
            return Ok(());
        }
        if self.blocks.is_empty() {
            return Err(format!("function {} has no body", self.name));
        }
        for block in &self.blocks {
            let Some(terminator) = &block.terminator else {
                return Err(format!(
                    "block {} of function {} has no terminator",
                    block.id, self.name
                ));
            };
            match terminator {
                super::Terminator::Ret(_) => {}
                super::Terminator::Br(target) => self.check_target(block.id, *target)?,
                super::Terminator::CondBr {
                    then_block,
                    else_block,
                    ..
                } => {
                    self.check_target(block.id, *then_block)?;
                    self.check_target(block.id, *else_block)?;
                }
            }
        }
        Ok(())
    }

    fn check_target(&self, from: BlockId, target: BlockId) -> Result<(), String> {
        if self.blocks.iter().any(|b| b.id == target) {
            Ok(())
        } else {
            Err(format!(
                "block {} of function {} branches to unknown block {}",
                from, self.name, target
            ))
        }
    }
}

/// A basic block contains a sequence of instructions
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<super::Instruction>,
    pub terminator: Option<super::Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            terminator: None,
        }
    }
}

/// A global variable or constant
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub init: Option<Constant>,
    pub is_const: bool,
}

/// A constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    String(String),
    Struct(Vec<Constant>),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{}", v),
            Constant::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Constant::Null => write!(f, "null"),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
        }
    }
}
