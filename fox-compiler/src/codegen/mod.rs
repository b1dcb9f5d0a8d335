//! The code generator: lowers the typed AST to flat bytecode over the
//! VM's stack discipline. A `FnCompiler` tracks the exact logical stack
//! top across every emission so static addresses and jump patches are
//! computed at generation time.

mod composite;
mod constants;
mod control;
mod place;

use std::collections::{HashMap, VecDeque};

use crate::bytecode::{self, Opcode};
use crate::error::CompileError;
use crate::interp::Interpreter;
use crate::typer::typed_ast::{CastKind, ProcessedPattern, TypedAst, TypedBinaryOp, TypedNode};
use crate::value::{Address, Size, TypeKind, Uuid, ValueType};

/// A named stack slot (or constant-pool entry) visible to the function
/// being compiled.
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub is_const: bool,
    pub ty: ValueType,
    pub address: Address,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct CompilerScope {
    pub stack_bottom: Address,
    pub variables: HashMap<String, Variable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FindVariable {
    NotFound,
    Found,
    FoundGlobal,
    FoundConstant,
}

/// Shared state threaded through function compilation: the registries,
/// the constant pools and the queue of function bodies awaiting their own
/// compiler.
pub(crate) struct GenCtx<'i> {
    pub interp: &'i mut Interpreter,
    pub deferred: VecDeque<(Uuid, Vec<TypedAst>)>,
}

pub(crate) struct FnCompiler<'g> {
    pub stack_top: Address,
    pub code: Vec<u8>,
    pub scopes: Vec<CompilerScope>,
    pub global_scope: Option<&'g CompilerScope>,
    pub varargs: bool,
}

/// Lower a type-checked program. Returns the root function; all other
/// functions receive their bytecode inside the interpreter's registry.
pub fn generate(
    interp: &mut Interpreter,
    module: Uuid,
    nodes: &[TypedAst],
) -> Result<crate::definitions::FunctionDefinition, CompileError> {
    let root_uuid = interp.next_uuid();
    let mut ctx = GenCtx {
        interp,
        deferred: VecDeque::new(),
    };

    let mut root = FnCompiler {
        stack_top: 0,
        code: Vec::new(),
        scopes: Vec::new(),
        global_scope: None,
        varargs: false,
    };
    root.begin_scope();
    for node in nodes {
        root.compile_node(node, &mut ctx)?;
    }

    let global_scope = root
        .scopes
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::Internal("Root compiler lost its scope.".to_string()))?;

    // Function bodies are compiled after the root walk, against the
    // now-complete global scope. Addresses of globals were fixed when
    // their `let`s were compiled, so deferral cannot move them.
    while let Some((uuid, body)) = ctx.deferred.pop_front() {
        compile_function(uuid, &body, &global_scope, &mut ctx)?;
    }

    Ok(crate::definitions::FunctionDefinition {
        varargs: false,
        uuid: root_uuid,
        module,
        name: "<main>".to_string(),
        ty: ValueType::func(Vec::new(), ValueType::VOID, false),
        param_names: Vec::new(),
        code: root.code,
    })
}

fn compile_function(
    uuid: Uuid,
    body: &[TypedAst],
    global_scope: &CompilerScope,
    ctx: &mut GenCtx,
) -> Result<(), CompileError> {
    let defn = ctx
        .interp
        .functions
        .get_func_by_uuid(uuid)
        .ok_or_else(|| CompileError::Internal(format!("Missing function #{}", uuid)))?;
    let varargs = defn.varargs;
    let param_names = defn.param_names.clone();
    let TypeKind::Func(func) = &defn.ty.kind else {
        return Err(CompileError::Internal(format!(
            "Function #{} is not of function type.",
            uuid
        )));
    };
    let params: Vec<ValueType> = func.params.clone();
    let ret_is_void = func.ret.kind == TypeKind::Void;

    let mut fc = FnCompiler {
        stack_top: 0,
        code: Vec::new(),
        scopes: Vec::new(),
        global_scope: Some(global_scope),
        varargs,
    };

    fc.begin_scope();
    for (name, ty) in param_names.iter().zip(&params) {
        fc.put_variable(name, ty.clone(), fc.stack_top, false);
        fc.stack_top += ty.size() as Address;
    }
    if varargs {
        // The caller stores the extra-argument byte count in the word just
        // below the frame base.
        fc.put_variable("vararg_size", ValueType::INT, -8, false);
    }

    for node in body {
        fc.compile_node(node, ctx)?;
    }

    if ret_is_void {
        fc.emit_op(if varargs {
            Opcode::VariadicReturn
        } else {
            Opcode::Return
        });
        fc.emit_size(0);
    }

    let defn = ctx
        .interp
        .functions
        .get_func_mut(uuid)
        .ok_or_else(|| CompileError::Internal(format!("Missing function #{}", uuid)))?;
    defn.code = fc.code;
    Ok(())
}

impl<'g> FnCompiler<'g> {
    // ==================== Emission ====================

    pub(crate) fn emit_op(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    pub(crate) fn emit_size(&mut self, size: Size) {
        bytecode::push_size(&mut self.code, size);
    }

    pub(crate) fn emit_address(&mut self, address: Address) {
        bytecode::push_address(&mut self.code, address);
    }

    pub(crate) fn emit_u32(&mut self, value: u32) {
        bytecode::push_u32(&mut self.code, value);
    }

    pub(crate) fn emit_u64(&mut self, value: u64) {
        bytecode::push_u64(&mut self.code, value);
    }

    pub(crate) fn emit_i64(&mut self, value: i64) {
        bytecode::push_u64(&mut self.code, value as u64);
    }

    pub(crate) fn emit_f64(&mut self, value: f64) {
        bytecode::push_u64(&mut self.code, value.to_bits());
    }

    /// Push an int literal, using the compact encodings for 0 and 1.
    pub(crate) fn emit_int_literal(&mut self, value: i64) {
        match value {
            0 => self.emit_op(Opcode::Lit0),
            1 => self.emit_op(Opcode::Lit1),
            _ => {
                self.emit_op(Opcode::LitInt);
                self.emit_i64(value);
            }
        }
    }

    /// Emit a forward jump with a placeholder offset; returns the patch
    /// site. `Jump_True`/`Jump_False` pop their condition, which
    /// `update_stack_top` mirrors at compile time.
    pub(crate) fn emit_jump(&mut self, op: Opcode, update_stack_top: bool) -> usize {
        self.emit_op(op);
        let site = self.code.len();
        self.emit_u64(u64::MAX);
        if update_stack_top && matches!(op, Opcode::JumpTrue | Opcode::JumpFalse) {
            self.stack_top -= ValueType::BOOL.size() as Address;
        }
        site
    }

    pub(crate) fn patch_jump(&mut self, site: usize) -> Result<(), CompileError> {
        let to = self.code.len();
        let offset = (to - site - std::mem::size_of::<u64>()) as u64;
        let bytes = offset.to_le_bytes();
        let slot = self
            .code
            .get_mut(site..site + 8)
            .ok_or_else(|| CompileError::Internal("Jump patch site out of range.".to_string()))?;
        slot.copy_from_slice(&bytes);
        Ok(())
    }

    /// Emit a backward jump to `loop_start`.
    pub(crate) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(Opcode::Loop);
        let jump = self.code.len() - loop_start + std::mem::size_of::<u64>();
        self.emit_u64(jump as u64);
    }

    // ==================== Scopes & variables ====================

    pub(crate) fn begin_scope(&mut self) {
        self.scopes.push(CompilerScope {
            stack_bottom: self.stack_top,
            variables: HashMap::new(),
        });
    }

    /// Emit the scope's `Flush` and rewind the logical stack top to the
    /// scope's bottom.
    pub(crate) fn end_scope(&mut self) {
        let bottom = self
            .scopes
            .pop()
            .map(|s| s.stack_bottom)
            .unwrap_or_default();
        self.emit_op(Opcode::Flush);
        self.emit_address(bottom);
        self.stack_top = bottom;
    }

    pub(crate) fn put_variable(
        &mut self,
        name: &str,
        ty: ValueType,
        address: Address,
        is_const: bool,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.variables.insert(
                name.to_string(),
                Variable {
                    is_const,
                    ty,
                    address,
                },
            );
        }
    }

    pub(crate) fn put_variables_from_pattern(
        &mut self,
        pattern: &ProcessedPattern,
        address: Address,
    ) {
        for binding in &pattern.bindings {
            if let Some(name) = &binding.name {
                let ty = binding.ty.clone().with_mut(binding.is_mut);
                self.put_variable(name, ty, address + binding.offset as Address, false);
            }
        }
    }

    pub(crate) fn find_variable(&self, name: &str) -> (FindVariable, Option<Variable>) {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.variables.get(name) {
                let status = if v.is_const {
                    FindVariable::FoundConstant
                } else {
                    FindVariable::Found
                };
                return (status, Some(v.clone()));
            }
        }
        if let Some(global) = self.global_scope {
            if let Some(v) = global.variables.get(name) {
                let status = if v.is_const {
                    FindVariable::FoundConstant
                } else {
                    FindVariable::FoundGlobal
                };
                return (status, Some(v.clone()));
            }
        }
        (FindVariable::NotFound, None)
    }

    // ==================== Node dispatch ====================

    pub(crate) fn compile_node(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        match &node.node {
            TypedNode::BoolLit(value) => {
                self.emit_op(if *value { Opcode::LitTrue } else { Opcode::LitFalse });
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::CharLit(value) => {
                self.emit_op(Opcode::LitChar);
                self.emit_u32(*value as u32);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::IntLit(value) => {
                self.emit_int_literal(*value);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::FloatLit(value) => {
                self.emit_op(Opcode::LitFloat);
                self.emit_f64(*value);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::StrLit(value) => {
                let index = constants::add_str_constant(&mut ctx.interp.str_constants, value);
                self.emit_op(Opcode::LoadConstString);
                self.emit_u64(index as u64);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::Ident(name) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' reached code generation.",
                        name
                    )));
                };
                match status {
                    FindVariable::Found | FindVariable::FoundGlobal => {
                        self.emit_op(if status == FindVariable::FoundGlobal {
                            Opcode::PushGlobalValue
                        } else {
                            Opcode::PushValue
                        });
                        self.emit_size(variable.ty.size());
                        self.emit_address(variable.address);
                    }
                    FindVariable::FoundConstant => {
                        self.compile_constant(&variable, ctx)?;
                    }
                    FindVariable::NotFound => unreachable!(),
                }
                self.stack_top = start + variable.ty.size() as Address;
            }
            TypedNode::FnRef(uuid) => {
                self.emit_op(Opcode::LitPointer);
                self.emit_u64(*uuid);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::Negation(sub) => {
                self.compile_node(sub, ctx)?;
                self.emit_op(if sub.ty.kind == TypeKind::Int {
                    Opcode::IntNeg
                } else {
                    Opcode::FloatNeg
                });
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::Not(sub) => {
                self.compile_node(sub, ctx)?;
                self.emit_op(Opcode::Not);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::AddressOf(sub) | TypedNode::AddressOfMut(sub) => {
                if !self.emit_address_code(sub, ctx)? {
                    return Err(CompileError::user_unlocated(
                        "Cannot take the address of this expression.",
                    ));
                }
            }
            TypedNode::Deref(sub) => {
                let size = node.ty.size();
                self.compile_node(sub, ctx)?;
                self.emit_op(Opcode::Load);
                self.emit_size(size);
                self.stack_top = start + size as Address;
            }
            TypedNode::Binary { op, lhs, rhs } => {
                self.compile_binary(node, *op, lhs, rhs, ctx)?;
            }
            TypedNode::And { .. } | TypedNode::Or { .. } => {
                self.compile_logical(node, ctx)?;
            }
            TypedNode::Assignment { lhs, rhs } => {
                self.compile_node(rhs, ctx)?;
                if !self.emit_address_code(lhs, ctx)? {
                    return Err(CompileError::user_unlocated(
                        "Cannot assign to this kind of expression.",
                    ));
                }
                self.emit_op(Opcode::Move);
                self.emit_size(rhs.ty.size());
                self.stack_top = start;
            }
            TypedNode::Subscript { .. } => self.compile_subscript(node, ctx)?,
            TypedNode::NegativeSubscript { .. } => self.compile_negative_subscript(node, ctx)?,
            TypedNode::Range { lhs, rhs, .. } => {
                self.compile_node(lhs, ctx)?;
                self.compile_node(rhs, ctx)?;
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::Block(nodes) => {
                self.begin_scope();
                for child in nodes {
                    self.compile_node(child, ctx)?;
                }
                self.end_scope();
            }
            TypedNode::TupleLit(_)
            | TypedNode::ArrayLit { .. }
            | TypedNode::SliceLit { .. }
            | TypedNode::StructLit { .. }
            | TypedNode::EnumLit { .. } => self.compile_composite_literal(node, ctx)?,
            TypedNode::FieldAccess { .. } | TypedNode::TupleAccess { .. } => {
                self.compile_access(node, ctx)?;
            }
            TypedNode::If { .. } => self.compile_if(node, ctx)?,
            TypedNode::While { cond, body } => self.compile_while(cond, body, ctx)?,
            TypedNode::ForArray { .. } | TypedNode::ForRange { .. } => {
                self.compile_for(node, ctx)?;
            }
            TypedNode::Match { .. } => self.compile_match(node, ctx)?,
            TypedNode::Let {
                is_const,
                pattern,
                init,
            } => {
                if *is_const {
                    self.declare_constant(pattern, init.as_deref(), ctx)?;
                } else {
                    let size = pattern.ty.size();
                    self.put_variables_from_pattern(pattern, start);
                    match init {
                        Some(init) => self.compile_node(init, ctx)?,
                        None => {
                            self.emit_op(Opcode::ClearAllocate);
                            self.emit_size(size);
                        }
                    }
                    self.stack_top = start + size as Address;
                }
            }
            TypedNode::Return(value) => {
                let mut size = 0;
                if let Some(value) = value {
                    size = value.ty.size();
                    self.compile_node(value, ctx)?;
                }
                self.emit_op(if self.varargs {
                    Opcode::VariadicReturn
                } else {
                    Opcode::Return
                });
                self.emit_size(size);
                self.stack_top = start;
            }
            TypedNode::Print {
                builtin,
                type_uuid,
                arg,
            } => {
                self.compile_node(arg, ctx)?;
                let mut arg_size = arg.ty.size();
                if let Some(uuid) = type_uuid {
                    self.emit_op(Opcode::LitPointer);
                    self.emit_u64(*uuid);
                    arg_size += 8;
                }
                self.emit_op(Opcode::CallBuiltin);
                self.emit_u32(*builtin as u32);
                self.emit_size(arg_size);
                self.stack_top = start;
            }
            TypedNode::Invocation {
                callee,
                args,
                extras,
                arg_size,
            } => {
                let callee_varargs = match &callee.ty.kind {
                    TypeKind::Func(func) => func.varargs,
                    _ => false,
                };
                if callee_varargs {
                    let extra_bytes: Size = extras.iter().map(|e| e.ty.size()).sum();
                    for extra in extras {
                        self.compile_node(extra, ctx)?;
                    }
                    self.emit_int_literal(extra_bytes as i64);
                    self.stack_top += ValueType::INT.size() as Address;
                }
                for arg in args {
                    self.compile_node(arg, ctx)?;
                }
                self.compile_node(callee, ctx)?;
                self.emit_op(Opcode::Call);
                self.emit_size(*arg_size);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::BuiltinInvocation {
                builtin,
                args,
                arg_size,
            } => {
                for arg in args {
                    self.compile_node(arg, ctx)?;
                }
                self.emit_op(Opcode::CallBuiltin);
                self.emit_u32(*builtin as u32);
                self.emit_size(*arg_size);
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::Cast { kind, sub } => {
                self.compile_node(sub, ctx)?;
                self.emit_op(match kind {
                    CastKind::BoolToInt => Opcode::CastBoolInt,
                    CastKind::CharToInt => Opcode::CastCharInt,
                    CastKind::IntToFloat => Opcode::CastIntFloat,
                    CastKind::FloatToInt => Opcode::CastFloatInt,
                });
                self.stack_top = start + node.ty.size() as Address;
            }
            TypedNode::FnDecl { uuid, body } => {
                ctx.deferred.push_back((*uuid, body.clone()));
            }
            TypedNode::Decls(decls) => {
                for decl in decls {
                    self.compile_node(decl, ctx)?;
                }
            }
            TypedNode::NoOp => {}
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        node: &TypedAst,
        op: TypedBinaryOp,
        lhs: &TypedAst,
        rhs: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        let operand_kind = &lhs.ty.kind;

        self.compile_node(lhs, ctx)?;
        self.compile_node(rhs, ctx)?;

        match op {
            TypedBinaryOp::Equal | TypedBinaryOp::NotEqual => {
                if *operand_kind == TypeKind::Str {
                    self.emit_op(if op == TypedBinaryOp::Equal {
                        Opcode::StrEqual
                    } else {
                        Opcode::StrNotEqual
                    });
                } else {
                    self.emit_op(if op == TypedBinaryOp::Equal {
                        Opcode::Equal
                    } else {
                        Opcode::NotEqual
                    });
                    self.emit_size(lhs.ty.size());
                }
            }
            TypedBinaryOp::Add => self.emit_op(match operand_kind {
                TypeKind::Float => Opcode::FloatAdd,
                TypeKind::Str => Opcode::StrAdd,
                _ => Opcode::IntAdd,
            }),
            TypedBinaryOp::Sub => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatSub
            } else {
                Opcode::IntSub
            }),
            TypedBinaryOp::Mul => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatMul
            } else {
                Opcode::IntMul
            }),
            TypedBinaryOp::Div => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatDiv
            } else {
                Opcode::IntDiv
            }),
            TypedBinaryOp::Mod => self.emit_op(Opcode::Mod),
            TypedBinaryOp::Less => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatLessThan
            } else {
                Opcode::IntLessThan
            }),
            TypedBinaryOp::LessEq => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatLessEqual
            } else {
                Opcode::IntLessEqual
            }),
            TypedBinaryOp::Greater => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatGreaterThan
            } else {
                Opcode::IntGreaterThan
            }),
            TypedBinaryOp::GreaterEq => self.emit_op(if *operand_kind == TypeKind::Float {
                Opcode::FloatGreaterEqual
            } else {
                Opcode::IntGreaterEqual
            }),
        }

        self.stack_top = start + node.ty.size() as Address;
        Ok(())
    }
}
