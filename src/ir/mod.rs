//! Argand intermediate representation
//!
//! A small typed SSA-style IR. It is generated from the AST by the
//! [`Lowerer`], built through the [`IrBuilder`], and serialized to text
//! with [`print_module`].

mod instr;
mod types;
mod builder;
mod lower;

pub use instr::*;
pub use types::*;
pub use builder::*;
pub use lower::*;
