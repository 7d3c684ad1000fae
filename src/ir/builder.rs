//! IR builder
//!
//! Helper for constructing IR instructions and basic blocks. The builder
//! owns the module under construction and a current insertion point; all
//! virtual registers and block ids are unique per module.

use super::instr::{CmpOp, Instruction, InstrKind, Terminator};
use super::types::{BasicBlock, BlockId, Constant, Function, Global, IrType, Module, VReg};

/// Builder for constructing IR
pub struct IrBuilder {
    /// Next virtual register ID
    next_vreg: u32,
    /// Next block ID
    next_block: u32,
    /// Next string constant ID
    next_string: u32,
    /// Current module being built
    module: Module,
    /// Current function being built
    current_fn: Option<Function>,
    /// Current block being built
    current_block: Option<BasicBlock>,
    /// Position to reinsert the function taken out for prelude patching
    prelude_slot: Option<usize>,
    /// Track if the libm helpers are declared
    math_declared: bool,
}

impl IrBuilder {
    /// Create a new IR builder
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            next_block: 0,
            next_string: 0,
            module: Module::new(module_name),
            current_fn: None,
            current_block: None,
            prelude_slot: None,
            math_declared: false,
        }
    }

    /// Finish building and return the module
    pub fn finish(mut self) -> Module {
        self.finish_function();
        self.module
    }

    /// Create a fresh virtual register
    fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    /// Create a fresh block ID
    fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    // ============ Function building ============

    /// Start building a new function; returns the parameter registers
    pub fn start_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret_type: IrType,
    ) -> Vec<VReg> {
        self.finish_function();

        let param_vregs: Vec<(VReg, IrType)> = params
            .into_iter()
            .map(|ty| (self.fresh_vreg(), ty))
            .collect();
        let vregs: Vec<VReg> = param_vregs.iter().map(|(v, _)| *v).collect();

        self.current_fn = Some(Function::new(name, param_vregs, ret_type));

        let entry = self.fresh_block();
        self.current_block = Some(BasicBlock::new(entry));

        vregs
    }

    /// Finish the current function, pushing it into the module
    pub fn finish_function(&mut self) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        if let Some(func) = self.current_fn.take() {
            self.module.functions.push(func);
        }
    }

    /// Whether the insertion point is inside a function
    pub fn in_function(&self) -> bool {
        self.current_fn.is_some()
    }

    /// Declare an external function
    pub fn declare_external(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret_type: IrType,
    ) {
        let mut func = Function::new(name, vec![], ret_type);
        func.is_external = true;
        func.params = params.into_iter().map(|ty| (VReg(0), ty)).collect();
        self.module.functions.push(func);
    }

    /// Look up a function, including the one currently being built
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        if let Some(ref func) = self.current_fn {
            if func.name == name {
                return Some(func);
            }
        }
        self.module.get_function(name)
    }

    /// Remove a function from the module and return it
    pub fn take_function(&mut self, name: &str) -> Option<Function> {
        let idx = self.module.functions.iter().position(|f| f.name == name)?;
        Some(self.module.functions.remove(idx))
    }

    /// Declare the libm helpers used by `|e|` lowering. Called lazily on
    /// first use so modules without absolute values stay clean.
    pub fn declare_math(&mut self) {
        if self.math_declared {
            return;
        }
        self.math_declared = true;

        // long labs(long x)
        self.declare_external("labs", vec![IrType::I64], IrType::I64);
        // double fabs(double x)
        self.declare_external("fabs", vec![IrType::F64], IrType::F64);
        // double sqrt(double x)
        self.declare_external("sqrt", vec![IrType::F64], IrType::F64);
    }

    // ============ Globals ============

    /// Add a global variable to the module. A name that is already taken
    /// is suffixed with a counter; the actual name is returned.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: IrType,
        init: Option<Constant>,
        is_const: bool,
    ) -> String {
        let base = name.into();
        let mut unique = base.clone();
        let mut n = 0;
        while self.module.globals.iter().any(|g| g.name == unique) {
            n += 1;
            unique = format!("{}.{}", base, n);
        }
        self.module.globals.push(Global {
            name: unique.clone(),
            ty,
            init,
            is_const,
        });
        unique
    }

    /// Intern a string constant and return the name of its global
    pub fn add_string_constant(&mut self, value: &str) -> String {
        let name = format!(".str.{}", self.next_string);
        self.next_string += 1;

        self.module.globals.push(Global {
            name: name.clone(),
            ty: IrType::Array(Box::new(IrType::I8), value.len() + 1), // +1 for NUL
            init: Some(Constant::String(value.to_string())),
            is_const: true,
        });

        name
    }

    /// Get a pointer to a global
    pub fn global_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::GlobalRef(name.to_string()))
    }

    // ============ Block building ============

    /// Create a new block and return its ID
    pub fn create_block(&mut self) -> BlockId {
        self.fresh_block()
    }

    /// Start building a block (finishes the current block first)
    pub fn start_block(&mut self, id: BlockId) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        self.current_block = Some(BasicBlock::new(id));
    }

    // ============ Instruction emission ============

    fn emit(&mut self, result: Option<VReg>, kind: InstrKind) -> Option<VReg> {
        if let Some(ref mut block) = self.current_block {
            block.instructions.push(Instruction::new(result, kind));
        }
        result
    }

    fn emit_with_result(&mut self, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        self.emit(Some(result), kind);
        result
    }

    // ============ Constants ============

    pub fn const_int(&mut self, value: i64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Int(value)))
    }

    pub fn const_float(&mut self, value: f64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Float(value)))
    }

    pub fn const_bool(&mut self, value: bool) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Bool(value)))
    }

    // ============ Arithmetic ============

    pub fn add(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Add(a, b))
    }

    pub fn sub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Sub(a, b))
    }

    pub fn mul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Mul(a, b))
    }

    pub fn sdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::SDiv(a, b))
    }

    pub fn fadd(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FAdd(a, b))
    }

    pub fn fsub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FSub(a, b))
    }

    pub fn fmul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FMul(a, b))
    }

    pub fn fdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FDiv(a, b))
    }

    // ============ Boolean ============

    pub fn and(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::And(a, b))
    }

    pub fn or(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Or(a, b))
    }

    pub fn not(&mut self, v: VReg) -> VReg {
        self.emit_with_result(InstrKind::Not(v))
    }

    // ============ Comparison ============

    pub fn icmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::ICmp(op, a, b))
    }

    pub fn fcmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FCmp(op, a, b))
    }

    // ============ Conversion ============

    pub fn sitofp(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::SIToFP(v, ty))
    }

    // ============ Memory ============

    pub fn alloca(&mut self, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Alloca(ty))
    }

    /// Allocate in the entry block of the current function so the slot
    /// dominates every use, regardless of the insertion point.
    pub fn entry_alloca(&mut self, ty: IrType) -> VReg {
        let result = self.fresh_vreg();
        let instr = Instruction::new(Some(result), InstrKind::Alloca(ty));
        if let Some(ref mut func) = self.current_fn {
            if let Some(entry) = func.blocks.first_mut() {
                entry.instructions.insert(0, instr);
                return result;
            }
        }
        // The current block is the entry block
        if let Some(ref mut block) = self.current_block {
            block.instructions.insert(0, instr);
        }
        result
    }

    pub fn load(&mut self, ptr: VReg) -> VReg {
        self.emit_with_result(InstrKind::Load(ptr))
    }

    pub fn store(&mut self, ptr: VReg, value: VReg) {
        self.emit(None, InstrKind::Store(ptr, value));
    }

    pub fn get_field_ptr(&mut self, ptr: VReg, field_idx: u32) -> VReg {
        self.emit_with_result(InstrKind::GetFieldPtr(ptr, field_idx))
    }

    // ============ Calls ============

    pub fn call(&mut self, func: impl Into<String>, args: Vec<VReg>) -> VReg {
        self.emit_with_result(InstrKind::Call {
            func: func.into(),
            args,
        })
    }

    // ============ Terminators ============

    pub fn ret(&mut self, value: Option<VReg>) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Ret(value));
        }
    }

    pub fn br(&mut self, target: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Br(target));
        }
    }

    pub fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            });
        }
    }

    // ============ Entry prelude ============

    /// Reopen a finished function and collect instructions destined for
    /// the very beginning of its entry block. Used for the deferred
    /// global-initializer prelude in `main`.
    pub fn begin_entry_prelude(&mut self, name: &str) -> bool {
        self.finish_function();
        let Some(idx) = self
            .module
            .functions
            .iter()
            .position(|f| f.name == name && f.has_body())
        else {
            return false;
        };
        let func = self.module.functions.remove(idx);
        self.prelude_slot = Some(idx);
        self.current_fn = Some(func);
        let scratch = self.fresh_block();
        self.current_block = Some(BasicBlock::new(scratch));
        true
    }

    /// Splice the collected prelude at the front of the entry block and
    /// put the function back into the module.
    pub fn finish_entry_prelude(&mut self) {
        let (Some(block), Some(mut func)) = (self.current_block.take(), self.current_fn.take())
        else {
            return;
        };
        let mut prelude = block.instructions;
        if let Some(entry) = func.blocks.first_mut() {
            prelude.append(&mut entry.instructions);
            entry.instructions = prelude;
        }
        let idx = self
            .prelude_slot
            .take()
            .unwrap_or(self.module.functions.len())
            .min(self.module.functions.len());
        self.module.functions.insert(idx, func);
    }
}
