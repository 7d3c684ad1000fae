//! AST to IR lowering
//!
//! Walks the typed AST and emits IR through the builder. One top-level
//! statement is lowered at a time, in parse order; after the whole input
//! has been lowered, [`Lowerer::init_globals`] synthesizes the deferred
//! global-initializer prelude at the head of `main`.
//!
//! Types follow the promotion order `int < double < complex`; both
//! operands of a binary or relational operator are widened to the common
//! supremum. Strings take part in no promotion.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, Param, Stmt, StmtKind};
use crate::token::{Token, TokenKind, TokenValue, TypeId};
use thiserror::Error;

use super::builder::IrBuilder;
use super::instr::CmpOp;
use super::types::{Constant, IrType, Module, VReg};

/// Codegen errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("{message} at line {line}")]
    Invalid { message: String, line: u32 },

    #[error("Missing main() function definition")]
    MissingMain,

    #[error("Function {name} could not be verified: {reason}")]
    Verification { name: String, reason: String },
}

fn err<T>(message: impl Into<String>, line: u32) -> Result<T, CodegenError> {
    Err(CodegenError::Invalid {
        message: message.into(),
        line,
    })
}

/// Where a binding's storage lives
#[derive(Debug, Clone)]
enum Storage {
    /// Stack slot in the enclosing function's entry block
    Local(VReg),
    /// Module-scope global, addressed by name
    Global(String),
}

/// A resolved binding
#[derive(Debug, Clone)]
struct Symbol {
    ty: TypeId,
    storage: Storage,
}

/// A stack of lexical scopes mapping names to bindings.
///
/// `push`/`pop` bracket every block, function body and conditional arm.
struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl SymbolTable {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn add(&mut self, name: &str, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn get(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

/// A module-scope variable awaiting its initializer
struct DeferredGlobal {
    name: String,
    init: Expr,
    ty: TypeId,
}

/// A lowered expression value
#[derive(Debug, Clone, Copy)]
struct Value {
    reg: VReg,
    ty: TypeId,
}

/// How a lowered statement left the control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    /// The statement ended with a `return`; the current block is closed
    Returned,
}

/// Lowers the AST to IR
pub struct Lowerer {
    builder: IrBuilder,
    symbols: SymbolTable,
    /// Deferred initializers of module-scope variables, in source order
    globals: Vec<DeferredGlobal>,
    /// Declared return type of the function being lowered
    current_ret: Option<TypeId>,
}

impl Lowerer {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            builder: IrBuilder::new(module_name),
            symbols: SymbolTable::new(),
            globals: Vec::new(),
            current_ret: None,
        }
    }

    /// Lower one top-level statement
    pub fn generate(&mut self, stmt: Stmt) -> Result<(), CodegenError> {
        self.gen_stmt(stmt)?;
        Ok(())
    }

    /// Synthesize the global-initializer prelude at the head of `main`'s
    /// entry block, in source order of the definitions. Fails if no
    /// `main` body exists.
    pub fn init_globals(&mut self) -> Result<(), CodegenError> {
        let has_main = self
            .builder
            .get_function("main")
            .map(|f| f.has_body())
            .unwrap_or(false);
        if !has_main {
            return Err(CodegenError::MissingMain);
        }

        self.builder.begin_entry_prelude("main");
        let globals = std::mem::take(&mut self.globals);
        for global in globals {
            let value = self.gen_expr(&global.init)?;
            let widened = self.expand(value, global.ty, global.init.line())?;
            let ptr = self.builder.global_ref(&global.name);
            self.builder.store(ptr, widened.reg);
        }
        self.builder.finish_entry_prelude();
        Ok(())
    }

    /// Finish lowering and return the module
    pub fn finish(self) -> Module {
        self.builder.finish()
    }

    // ============ Statements ============

    fn gen_stmt(&mut self, stmt: Stmt) -> Result<Flow, CodegenError> {
        let token = stmt.token;
        match stmt.kind {
            StmtKind::Sequence(stmts) => {
                let mut flow = Flow::Normal;
                for stmt in stmts {
                    flow = self.gen_stmt(stmt)?;
                    if flow == Flow::Returned {
                        break;
                    }
                }
                Ok(flow)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.gen_if(condition, then_branch, else_branch),
            StmtKind::While { condition, body } => self.gen_while(condition, body),
            StmtKind::Return(expr) => self.gen_return(expr),
            StmtKind::Assign(value) => self.gen_assign(token, value),
            StmtKind::VarDef { ty, init } => self.gen_var_def(token, ty, init),
            StmtKind::FunDecl { ret, params } => {
                self.gen_fun_decl(&token, ret, &params)?;
                Ok(Flow::Normal)
            }
            StmtKind::FunDef { ret, params, body } => self.gen_fun_def(token, ret, params, *body),
        }
    }

    fn gen_if(
        &mut self,
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    ) -> Result<Flow, CodegenError> {
        let cond = self.gen_cond(&condition)?;
        let zero = self.builder.const_bool(false);
        let flag = self.builder.icmp(CmpOp::Ne, cond, zero);

        let then_block = self.builder.create_block();
        let cont_block = self.builder.create_block();
        let else_block = if else_branch.is_some() {
            self.builder.create_block()
        } else {
            cont_block
        };
        self.builder.cond_br(flag, then_block, else_block);

        self.builder.start_block(then_block);
        self.symbols.push();
        let then_flow = self.gen_stmt(*then_branch)?;
        self.symbols.pop();
        if then_flow != Flow::Returned {
            self.builder.br(cont_block);
        }

        if let Some(else_branch) = else_branch {
            self.builder.start_block(else_block);
            self.symbols.push();
            let else_flow = self.gen_stmt(*else_branch)?;
            self.symbols.pop();
            if else_flow != Flow::Returned {
                self.builder.br(cont_block);
            }
        }

        self.builder.start_block(cont_block);
        Ok(Flow::Normal)
    }

    fn gen_while(&mut self, condition: Expr, body: Box<Stmt>) -> Result<Flow, CodegenError> {
        let cond_block = self.builder.create_block();
        self.builder.br(cond_block);
        self.builder.start_block(cond_block);

        let cond = self.gen_cond(&condition)?;
        let zero = self.builder.const_bool(false);
        let flag = self.builder.icmp(CmpOp::Ne, cond, zero);

        let body_block = self.builder.create_block();
        let cont_block = self.builder.create_block();
        self.builder.cond_br(flag, body_block, cont_block);

        self.builder.start_block(body_block);
        self.symbols.push();
        let body_flow = self.gen_stmt(*body)?;
        self.symbols.pop();
        if body_flow != Flow::Returned {
            self.builder.br(cond_block);
        }

        self.builder.start_block(cont_block);
        Ok(Flow::Normal)
    }

    fn gen_return(&mut self, expr: Expr) -> Result<Flow, CodegenError> {
        let line = expr.line();
        let Some(ret_ty) = self.current_ret else {
            return err("Return statement outside of a function", line);
        };
        let value = self.gen_expr(&expr)?;
        let widened = self.expand(value, ret_ty, line)?;
        self.builder.ret(Some(widened.reg));
        Ok(Flow::Returned)
    }

    fn gen_assign(&mut self, target: Token, value: Expr) -> Result<Flow, CodegenError> {
        let name = target.text();
        let Some(symbol) = self.symbols.get(name).cloned() else {
            return err(format!("Undefined identifier {}", name), target.line);
        };
        let rhs = self.gen_expr(&value)?;
        let widened = self.expand(rhs, symbol.ty, value.line())?;
        let ptr = self.storage_ptr(&symbol.storage);
        self.builder.store(ptr, widened.reg);
        Ok(Flow::Normal)
    }

    fn gen_var_def(&mut self, name: Token, ty: TypeId, init: Expr) -> Result<Flow, CodegenError> {
        let line = name.line;
        let ir_ty = Self::ir_type(ty, line)?;

        if self.builder.in_function() {
            let value = self.gen_expr(&init)?;
            let widened = self.expand(value, ty, line)?;
            let slot = self.builder.entry_alloca(ir_ty);
            self.builder.store(slot, widened.reg);
            self.symbols.add(
                name.text(),
                Symbol {
                    ty,
                    storage: Storage::Local(slot),
                },
            );
        } else {
            // Module scope: zero-initialized common global; the real
            // initializer runs in the prelude of main.
            let zero = Self::zero_const(ty, line)?;
            let global = self.builder.add_global(name.text(), ir_ty, Some(zero), false);
            self.globals.push(DeferredGlobal {
                name: global.clone(),
                init,
                ty,
            });
            self.symbols.add(
                name.text(),
                Symbol {
                    ty,
                    storage: Storage::Global(global),
                },
            );
        }
        Ok(Flow::Normal)
    }

    /// Validate the function name and the signature rules shared by
    /// declarations and definitions
    fn check_function_name(
        &self,
        token: &Token,
        ret: TypeId,
        params: &[Param],
    ) -> Result<String, CodegenError> {
        if token.kind != TokenKind::Ident && token.kind != TokenKind::Main {
            return err(
                format!("Cannot redefine reserved keyword {}", display_name(token)),
                token.line,
            );
        }
        if token.kind == TokenKind::Main && (!params.is_empty() || ret != TypeId::Int) {
            return err("Invalid main function signature", token.line);
        }
        Ok(token.text().to_string())
    }

    fn gen_fun_decl(
        &mut self,
        token: &Token,
        ret: TypeId,
        params: &[Param],
    ) -> Result<(), CodegenError> {
        let name = self.check_function_name(token, ret, params)?;
        if self.builder.get_function(&name).is_some() {
            return err(
                format!("Two functions with the same name: {}", name),
                token.line,
            );
        }
        let param_irs = Self::param_types(params)?;
        let ret_ir = Self::ir_type(ret, token.line)?;
        self.builder.declare_external(name, param_irs, ret_ir);
        Ok(())
    }

    fn gen_fun_def(
        &mut self,
        token: Token,
        ret: TypeId,
        params: Vec<Param>,
        body: Stmt,
    ) -> Result<Flow, CodegenError> {
        let name = self.check_function_name(&token, ret, &params)?;
        let param_irs = Self::param_types(&params)?;
        let ret_ir = Self::ir_type(ret, token.line)?;

        if let Some(existing) = self.builder.get_function(&name) {
            if existing.has_body() {
                return err(
                    format!("Two functions with the same name: {}", name),
                    token.line,
                );
            }
            let declared: Vec<IrType> = existing.params.iter().map(|(_, ty)| ty.clone()).collect();
            if declared != param_irs || existing.ret_type != ret_ir {
                return err(
                    format!(
                        "Mismatch between signatures in definition and declaration of {}",
                        name
                    ),
                    token.line,
                );
            }
            self.builder.take_function(&name);
        }

        let param_regs = self.builder.start_function(&name, param_irs, ret_ir);
        self.symbols.push();
        for (param, reg) in params.iter().zip(param_regs) {
            let ty_ir = Self::ir_type(param.ty, param.token.line)?;
            let slot = self.builder.entry_alloca(ty_ir);
            self.builder.store(slot, reg);
            self.symbols.add(
                param.token.text(),
                Symbol {
                    ty: param.ty,
                    storage: Storage::Local(slot),
                },
            );
        }

        self.current_ret = Some(ret);
        let flow = self.gen_stmt(body)?;
        self.current_ret = None;
        self.symbols.pop();

        if flow != Flow::Returned {
            return err(
                format!("Function {} does not end with a return statement", name),
                token.line,
            );
        }

        self.builder.finish_function();
        if let Some(func) = self.builder.get_function(&name) {
            func.verify().map_err(|reason| CodegenError::Verification {
                name: name.clone(),
                reason,
            })?;
        }
        Ok(Flow::Normal)
    }

    fn param_types(params: &[Param]) -> Result<Vec<IrType>, CodegenError> {
        params
            .iter()
            .map(|p| Self::ir_type(p.ty, p.token.line))
            .collect()
    }

    // ============ Expressions ============

    fn gen_expr(&mut self, expr: &Expr) -> Result<Value, CodegenError> {
        let line = expr.line();
        match &expr.kind {
            ExprKind::Ident => {
                let name = expr.token.text();
                let Some(symbol) = self.symbols.get(name).cloned() else {
                    return err(format!("Undefined identifier {}", name), line);
                };
                let ptr = self.storage_ptr(&symbol.storage);
                let reg = self.builder.load(ptr);
                Ok(Value { reg, ty: symbol.ty })
            }
            ExprKind::Constant(ty) => self.gen_constant(&expr.token, *ty),
            ExprKind::Call(args) => self.gen_call(&expr.token, args),
            ExprKind::Abs(inner) => self.gen_abs(inner),
            ExprKind::Complex(imaginary) => {
                let value = self.gen_expr(imaginary)?;
                let im = self.expand(value, TypeId::Double, line)?;
                let re = self.builder.const_float(0.0);
                let reg = self.cx_pack(re, im.reg);
                Ok(Value {
                    reg,
                    ty: TypeId::Complex,
                })
            }
            ExprKind::Binary { lhs, rhs } => self.gen_binary(expr.token.kind, lhs, rhs, line),
            ExprKind::Unary(inner) => self.gen_unary(expr.token.kind, inner, line),
            ExprKind::Disjunction { .. }
            | ExprKind::Conjunction { .. }
            | ExprKind::Negation(_)
            | ExprKind::Relation { .. } => {
                err("Logical expression in arithmetic context", line)
            }
        }
    }

    fn gen_constant(&mut self, token: &Token, ty: TypeId) -> Result<Value, CodegenError> {
        match (ty, &token.value) {
            (TypeId::Int, TokenValue::Int(v)) => Ok(Value {
                reg: self.builder.const_int(*v),
                ty,
            }),
            (TypeId::Double, TokenValue::Double(v)) => Ok(Value {
                reg: self.builder.const_float(*v),
                ty,
            }),
            (TypeId::String, TokenValue::Str(s)) => {
                let global = self.builder.add_string_constant(s);
                let reg = self.builder.global_ref(&global);
                Ok(Value { reg, ty })
            }
            _ => err("Unsupported constant", token.line),
        }
    }

    fn gen_call(&mut self, token: &Token, args: &[Expr]) -> Result<Value, CodegenError> {
        let line = token.line;

        if token.kind == TokenKind::Re {
            if args.len() != 1 {
                return err("Incorrect number of parameters in call to Re()", line);
            }
            let value = self.gen_expr(&args[0])?;
            return self.gen_re(value, line);
        }
        if token.kind == TokenKind::Im {
            if args.len() != 1 {
                return err("Incorrect number of parameters in call to Im()", line);
            }
            let value = self.gen_expr(&args[0])?;
            return self.gen_im(value, line);
        }

        let name = token.text();
        let Some(func) = self.builder.get_function(name) else {
            return err(format!("Function {} not defined", name), line);
        };
        let param_tys: Vec<TypeId> = func.params.iter().map(|(_, ty)| type_id_of(ty)).collect();
        let ret_ty = type_id_of(&func.ret_type);

        if args.len() != param_tys.len() {
            return err(
                format!("Incorrect number of parameters in call to {}", name),
                line,
            );
        }

        let mut regs = Vec::with_capacity(args.len());
        for (arg, &param_ty) in args.iter().zip(&param_tys) {
            let value = self.gen_expr(arg)?;
            let widened = self.expand(value, param_ty, arg.line())?;
            regs.push(widened.reg);
        }
        let reg = self.builder.call(name, regs);
        Ok(Value { reg, ty: ret_ty })
    }

    fn gen_re(&mut self, value: Value, line: u32) -> Result<Value, CodegenError> {
        match value.ty {
            TypeId::Int | TypeId::Double => Ok(value),
            TypeId::Complex => {
                let (re, _) = self.cx_components(value.reg);
                Ok(Value {
                    reg: re,
                    ty: TypeId::Double,
                })
            }
            _ => err("Unsupported type in call to Re()", line),
        }
    }

    fn gen_im(&mut self, value: Value, line: u32) -> Result<Value, CodegenError> {
        match value.ty {
            TypeId::Int => Ok(Value {
                reg: self.builder.const_int(0),
                ty: TypeId::Int,
            }),
            TypeId::Double => Ok(Value {
                reg: self.builder.const_float(0.0),
                ty: TypeId::Double,
            }),
            TypeId::Complex => {
                let (_, im) = self.cx_components(value.reg);
                Ok(Value {
                    reg: im,
                    ty: TypeId::Double,
                })
            }
            _ => err("Unsupported type in call to Im()", line),
        }
    }

    fn gen_abs(&mut self, inner: &Expr) -> Result<Value, CodegenError> {
        let value = self.gen_expr(inner)?;
        self.builder.declare_math();
        match value.ty {
            TypeId::Int => Ok(Value {
                reg: self.builder.call("labs", vec![value.reg]),
                ty: TypeId::Int,
            }),
            TypeId::Double => Ok(Value {
                reg: self.builder.call("fabs", vec![value.reg]),
                ty: TypeId::Double,
            }),
            TypeId::Complex => {
                // |a+bi| = sqrt(a^2 + b^2)
                let (re, im) = self.cx_components(value.reg);
                let re2 = self.builder.fmul(re, re);
                let im2 = self.builder.fmul(im, im);
                let sum = self.builder.fadd(re2, im2);
                Ok(Value {
                    reg: self.builder.call("sqrt", vec![sum]),
                    ty: TypeId::Double,
                })
            }
            _ => err("Unsupported type inside absolute value", inner.line()),
        }
    }

    fn gen_binary(
        &mut self,
        op: TokenKind,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
    ) -> Result<Value, CodegenError> {
        let left = self.gen_expr(lhs)?;
        let right = self.gen_expr(rhs)?;
        let common = self.max_type(left.ty, right.ty, line)?;
        let left = self.expand(left, common, line)?;
        let right = self.expand(right, common, line)?;

        let reg = match common {
            TypeId::Int => match op {
                TokenKind::Plus => self.builder.add(left.reg, right.reg),
                TokenKind::Minus => self.builder.sub(left.reg, right.reg),
                TokenKind::Star => self.builder.mul(left.reg, right.reg),
                TokenKind::Slash => self.builder.sdiv(left.reg, right.reg),
                _ => return err("Unsupported binary operator", line),
            },
            TypeId::Double => match op {
                TokenKind::Plus => self.builder.fadd(left.reg, right.reg),
                TokenKind::Minus => self.builder.fsub(left.reg, right.reg),
                TokenKind::Star => self.builder.fmul(left.reg, right.reg),
                TokenKind::Slash => self.builder.fdiv(left.reg, right.reg),
                _ => return err("Unsupported binary operator", line),
            },
            TypeId::Complex => {
                let (re1, im1) = self.cx_components(left.reg);
                let (re2, im2) = self.cx_components(right.reg);
                match op {
                    TokenKind::Plus => {
                        let re = self.builder.fadd(re1, re2);
                        let im = self.builder.fadd(im1, im2);
                        self.cx_pack(re, im)
                    }
                    TokenKind::Minus => {
                        let re = self.builder.fsub(re1, re2);
                        let im = self.builder.fsub(im1, im2);
                        self.cx_pack(re, im)
                    }
                    TokenKind::Star => {
                        let (re, im) = self.cx_mul(re1, im1, re2, im2);
                        self.cx_pack(re, im)
                    }
                    TokenKind::Slash => {
                        let (re, im) = self.cx_div(re1, im1, re2, im2);
                        self.cx_pack(re, im)
                    }
                    _ => return err("Unsupported binary operator", line),
                }
            }
            _ => return err("Unsupported types for binary operator", line),
        };
        Ok(Value { reg, ty: common })
    }

    fn gen_unary(
        &mut self,
        op: TokenKind,
        inner: &Expr,
        line: u32,
    ) -> Result<Value, CodegenError> {
        let value = self.gen_expr(inner)?;
        if op != TokenKind::Minus {
            return Ok(value);
        }
        match value.ty {
            TypeId::Int => {
                let minus_one = self.builder.const_int(-1);
                Ok(Value {
                    reg: self.builder.mul(value.reg, minus_one),
                    ty: TypeId::Int,
                })
            }
            TypeId::Double => {
                let minus_one = self.builder.const_float(-1.0);
                Ok(Value {
                    reg: self.builder.fmul(value.reg, minus_one),
                    ty: TypeId::Double,
                })
            }
            TypeId::Complex => {
                let minus_one = self.builder.const_float(-1.0);
                let (re, im) = self.cx_components(value.reg);
                let re = self.builder.fmul(re, minus_one);
                let im = self.builder.fmul(im, minus_one);
                Ok(Value {
                    reg: self.cx_pack(re, im),
                    ty: TypeId::Complex,
                })
            }
            _ => err("Unsupported type for unary operator", line),
        }
    }

    // ============ Conditions ============

    /// Lower a condition to an i1. Logical operators are eager: both
    /// sides are emitted and combined bitwise.
    fn gen_cond(&mut self, expr: &Expr) -> Result<VReg, CodegenError> {
        match &expr.kind {
            ExprKind::Disjunction { lhs, rhs } => {
                let left = self.gen_cond(lhs)?;
                let right = self.gen_cond(rhs)?;
                Ok(self.builder.or(left, right))
            }
            ExprKind::Conjunction { lhs, rhs } => {
                let left = self.gen_cond(lhs)?;
                let right = self.gen_cond(rhs)?;
                Ok(self.builder.and(left, right))
            }
            ExprKind::Negation(inner) => {
                let value = self.gen_cond(inner)?;
                Ok(self.builder.not(value))
            }
            ExprKind::Relation { lhs, rhs } => {
                self.gen_relation(expr.token.kind, lhs, rhs, expr.line())
            }
            _ => err("Expected a logical expression", expr.line()),
        }
    }

    fn gen_relation(
        &mut self,
        op: TokenKind,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
    ) -> Result<VReg, CodegenError> {
        let left = self.gen_expr(lhs)?;
        let right = self.gen_expr(rhs)?;
        let common = self.max_type(left.ty, right.ty, line)?;
        let left = self.expand(left, common, line)?;
        let right = self.expand(right, common, line)?;

        let cmp = match op {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::Ge,
            _ => return err("Unsupported relational operator", line),
        };

        match common {
            TypeId::Int => Ok(self.builder.icmp(cmp, left.reg, right.reg)),
            TypeId::Double => Ok(self.builder.fcmp(cmp, left.reg, right.reg)),
            TypeId::Complex => {
                // Lexicographic order on (re, im)
                let (re_l, im_l) = self.cx_components(left.reg);
                let (re_r, im_r) = self.cx_components(right.reg);
                let result = match cmp {
                    CmpOp::Lt => self.builder.fcmp(CmpOp::Lt, re_l, re_r),
                    CmpOp::Gt => self.builder.fcmp(CmpOp::Gt, re_l, re_r),
                    CmpOp::Le => {
                        let lt = self.builder.fcmp(CmpOp::Lt, re_l, re_r);
                        let eq = self.builder.fcmp(CmpOp::Eq, re_l, re_r);
                        let le_im = self.builder.fcmp(CmpOp::Le, im_l, im_r);
                        let tie = self.builder.and(eq, le_im);
                        self.builder.or(lt, tie)
                    }
                    CmpOp::Ge => {
                        let gt = self.builder.fcmp(CmpOp::Gt, re_l, re_r);
                        let eq = self.builder.fcmp(CmpOp::Eq, re_l, re_r);
                        let ge_im = self.builder.fcmp(CmpOp::Ge, im_l, im_r);
                        let tie = self.builder.and(eq, ge_im);
                        self.builder.or(gt, tie)
                    }
                    CmpOp::Eq => {
                        let re = self.builder.fcmp(CmpOp::Eq, re_l, re_r);
                        let im = self.builder.fcmp(CmpOp::Eq, im_l, im_r);
                        self.builder.and(re, im)
                    }
                    CmpOp::Ne => {
                        let re = self.builder.fcmp(CmpOp::Ne, re_l, re_r);
                        let im = self.builder.fcmp(CmpOp::Ne, im_l, im_r);
                        self.builder.or(re, im)
                    }
                };
                Ok(result)
            }
            _ => err("Unsupported types for comparison operator", line),
        }
    }

    // ============ Widening ============

    /// Widen a value along `int < double < complex`. Anything involving
    /// strings, or a narrowing, is an error.
    fn expand(&mut self, value: Value, to: TypeId, line: u32) -> Result<Value, CodegenError> {
        if value.ty == to {
            return Ok(value);
        }
        let mut reg = value.reg;
        let mut ty = value.ty;
        if ty == TypeId::Int && matches!(to, TypeId::Double | TypeId::Complex) {
            reg = self.builder.sitofp(reg, IrType::F64);
            ty = TypeId::Double;
        }
        if ty == TypeId::Double {
            if to == TypeId::Double {
                return Ok(Value { reg, ty });
            }
            if to == TypeId::Complex {
                let zero = self.builder.const_float(0.0);
                let packed = self.cx_pack(reg, zero);
                return Ok(Value {
                    reg: packed,
                    ty: TypeId::Complex,
                });
            }
        }
        err("Unsupported type conversion", line)
    }

    /// The common supremum of two types under promotion
    fn max_type(&self, a: TypeId, b: TypeId, line: u32) -> Result<TypeId, CodegenError> {
        if a == TypeId::String || b == TypeId::String {
            return err("Strings cannot be converted to other types", line);
        }
        if a == TypeId::Complex || b == TypeId::Complex {
            return Ok(TypeId::Complex);
        }
        if a == TypeId::Double || b == TypeId::Double {
            return Ok(TypeId::Double);
        }
        Ok(TypeId::Int)
    }

    fn ir_type(ty: TypeId, line: u32) -> Result<IrType, CodegenError> {
        match ty {
            TypeId::Int => Ok(IrType::I64),
            TypeId::Double => Ok(IrType::F64),
            TypeId::Complex => Ok(IrType::complex()),
            TypeId::String => Ok(IrType::string()),
            TypeId::None => err("Unsupported type", line),
        }
    }

    fn zero_const(ty: TypeId, line: u32) -> Result<Constant, CodegenError> {
        match ty {
            TypeId::Int => Ok(Constant::Int(0)),
            TypeId::Double => Ok(Constant::Float(0.0)),
            TypeId::Complex => Ok(Constant::Struct(vec![
                Constant::Float(0.0),
                Constant::Float(0.0),
            ])),
            TypeId::String => Ok(Constant::Null),
            TypeId::None => err("Unsupported type of global variable", line),
        }
    }

    fn storage_ptr(&mut self, storage: &Storage) -> VReg {
        match storage {
            Storage::Local(reg) => *reg,
            Storage::Global(name) => {
                let name = name.clone();
                self.builder.global_ref(&name)
            }
        }
    }

    // ============ Complex helpers ============

    /// Materialize a complex value from its components
    fn cx_pack(&mut self, re: VReg, im: VReg) -> VReg {
        let slot = self.builder.alloca(IrType::complex());
        let re_ptr = self.builder.get_field_ptr(slot, 0);
        self.builder.store(re_ptr, re);
        let im_ptr = self.builder.get_field_ptr(slot, 1);
        self.builder.store(im_ptr, im);
        self.builder.load(slot)
    }

    /// Spill a complex value and load its components
    fn cx_components(&mut self, value: VReg) -> (VReg, VReg) {
        let slot = self.builder.alloca(IrType::complex());
        self.builder.store(slot, value);
        let re_ptr = self.builder.get_field_ptr(slot, 0);
        let re = self.builder.load(re_ptr);
        let im_ptr = self.builder.get_field_ptr(slot, 1);
        let im = self.builder.load(im_ptr);
        (re, im)
    }

    /// (a+bi)(c+di) = (ac - bd) + (ad + bc)i
    fn cx_mul(&mut self, re1: VReg, im1: VReg, re2: VReg, im2: VReg) -> (VReg, VReg) {
        let ac = self.builder.fmul(re1, re2);
        let bd = self.builder.fmul(im1, im2);
        let ad = self.builder.fmul(re1, im2);
        let bc = self.builder.fmul(im1, re2);
        let re = self.builder.fsub(ac, bd);
        let im = self.builder.fadd(ad, bc);
        (re, im)
    }

    /// (a+bi)/(c+di): multiply by the conjugate of the denominator and
    /// divide both components by the real denominator c^2 + d^2
    fn cx_div(&mut self, re1: VReg, im1: VReg, re2: VReg, im2: VReg) -> (VReg, VReg) {
        let c2 = self.builder.fmul(re2, re2);
        let d2 = self.builder.fmul(im2, im2);
        let denom = self.builder.fadd(c2, d2);

        let minus_one = self.builder.const_float(-1.0);
        let conj_im = self.builder.fmul(im2, minus_one);
        let (num_re, num_im) = self.cx_mul(re1, im1, re2, conj_im);

        let re = self.builder.fdiv(num_re, denom);
        let im = self.builder.fdiv(num_im, denom);
        (re, im)
    }
}

/// Map an IR type back onto the language type it encodes
fn type_id_of(ty: &IrType) -> TypeId {
    match ty {
        IrType::I64 => TypeId::Int,
        IrType::F64 => TypeId::Double,
        IrType::Struct(_) => TypeId::Complex,
        IrType::Ptr(_) | IrType::Array(..) => TypeId::String,
        IrType::Bool | IrType::I8 => TypeId::None,
    }
}

/// The name a token stands for in diagnostics
fn display_name(token: &Token) -> String {
    let text = token.text();
    if text.is_empty() {
        token.kind.to_string()
    } else {
        text.to_string()
    }
}

/// Print the module in a readable format
pub fn print_module(module: &Module) -> String {
    let mut output = String::new();
    output.push_str(&format!("module {}\n\n", module.name));

    for global in &module.globals {
        let linkage = if global.is_const {
            "constant"
        } else {
            "common global"
        };
        match &global.init {
            Some(init) => output.push_str(&format!(
                "@{} = {} {} {}\n",
                global.name, linkage, global.ty, init
            )),
            None => output.push_str(&format!("@{} = {} {}\n", global.name, linkage, global.ty)),
        }
    }
    if !module.globals.is_empty() {
        output.push('\n');
    }

    for func in &module.functions {
        if func.is_external {
            output.push_str(&format!("declare {} ", func.name));
        } else {
            output.push_str(&format!("define {} ", func.name));
        }

        output.push('(');
        for (i, (vreg, ty)) in func.params.iter().enumerate() {
            if i > 0 {
                output.push_str(", ");
            }
            if func.is_external {
                output.push_str(&format!("{}", ty));
            } else {
                output.push_str(&format!("{} {}", ty, vreg));
            }
        }
        output.push_str(&format!(") -> {} ", func.ret_type));

        if func.is_external {
            output.push('\n');
            continue;
        }

        output.push_str("{\n");
        for block in &func.blocks {
            output.push_str(&format!("  {}:\n", block.id));
            for instr in &block.instructions {
                output.push_str(&format!("    {}\n", instr));
            }
            if let Some(ref term) = block.terminator {
                output.push_str(&format!("    {}\n", term));
            }
        }
        output.push_str("}\n\n");
    }

    output
}
