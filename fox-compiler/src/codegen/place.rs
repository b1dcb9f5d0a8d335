//! Place expressions: classification into static addresses (known at
//! compile time) and dynamic addresses (computed at runtime), plus the
//! value loads built on top of them.

use super::{FindVariable, FnCompiler, GenCtx};
use crate::bytecode::Opcode;
use crate::error::CompileError;
use crate::typer::typed_ast::{TypedAst, TypedNode};
use crate::value::{Address, TypeKind, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaticAddress {
    NotFound,
    Found(Address),
    FoundGlobal(Address),
}

impl<'g> FnCompiler<'g> {
    /// A static address exists for variables and for field/subscript
    /// chains over them that never pass through a dereference or a
    /// runtime index.
    pub(crate) fn find_static_address(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<StaticAddress, CompileError> {
        match &node.node {
            TypedNode::Ident(name) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' reached code generation.",
                        name
                    )));
                };
                Ok(match status {
                    FindVariable::Found => StaticAddress::Found(variable.address),
                    FindVariable::FoundGlobal => StaticAddress::FoundGlobal(variable.address),
                    _ => StaticAddress::NotFound,
                })
            }
            TypedNode::Subscript { lhs, rhs } => {
                if !matches!(lhs.ty.kind, TypeKind::Array { .. }) || !self.is_constant(rhs) {
                    return Ok(StaticAddress::NotFound);
                }
                let base = self.find_static_address(lhs, ctx)?;
                let index = self.evaluate_const_int(rhs, ctx)?;
                let offset = index * node.ty.size() as i64;
                Ok(match base {
                    StaticAddress::Found(addr) => StaticAddress::Found(addr + offset),
                    StaticAddress::FoundGlobal(addr) => StaticAddress::FoundGlobal(addr + offset),
                    StaticAddress::NotFound => StaticAddress::NotFound,
                })
            }
            TypedNode::FieldAccess {
                deref,
                instance,
                offset,
            }
            | TypedNode::TupleAccess {
                deref,
                instance,
                offset,
                ..
            } => {
                if *deref {
                    return Ok(StaticAddress::NotFound);
                }
                let base = self.find_static_address(instance, ctx)?;
                let offset = *offset as Address;
                Ok(match base {
                    StaticAddress::Found(addr) => StaticAddress::Found(addr + offset),
                    StaticAddress::FoundGlobal(addr) => StaticAddress::FoundGlobal(addr + offset),
                    StaticAddress::NotFound => StaticAddress::NotFound,
                })
            }
            _ => Ok(StaticAddress::NotFound),
        }
    }

    /// Emit code that leaves the address of `node` on top of the stack.
    /// Returns false when the expression is not addressable.
    pub(crate) fn emit_address_code(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<bool, CompileError> {
        let start = self.stack_top;

        let success = match self.find_static_address(node, ctx)? {
            StaticAddress::Found(address) => {
                self.emit_op(Opcode::PushPointer);
                self.emit_address(address);
                true
            }
            StaticAddress::FoundGlobal(address) => {
                self.emit_op(Opcode::PushGlobalPointer);
                self.emit_address(address);
                true
            }
            StaticAddress::NotFound => self.emit_dynamic_address_code(node, ctx)?,
        };

        self.stack_top = start + 8;
        Ok(success)
    }

    fn emit_dynamic_address_code(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<bool, CompileError> {
        match &node.node {
            TypedNode::Ident(name) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' reached code generation.",
                        name
                    )));
                };
                match status {
                    FindVariable::Found => {
                        self.emit_op(Opcode::PushPointer);
                        self.emit_address(variable.address);
                    }
                    FindVariable::FoundGlobal => {
                        self.emit_op(Opcode::PushGlobalPointer);
                        self.emit_address(variable.address);
                    }
                    // Constants live in the pool; they have no stack slot.
                    _ => return Ok(false),
                }
                Ok(true)
            }
            TypedNode::Deref(sub) => {
                self.compile_node(sub, ctx)?;
                Ok(true)
            }
            TypedNode::Subscript { lhs, rhs } => {
                let elem_size = node.ty.size();

                if !self.emit_address_code(lhs, ctx)? {
                    return Ok(false);
                }
                if matches!(lhs.ty.kind, TypeKind::Slice(_)) {
                    // The slice's data pointer is its first field.
                    self.emit_op(Opcode::Load);
                    self.emit_size(ValueType::ptr_to(ValueType::VOID).size());
                }

                // offset = rhs * element_size
                self.compile_node(rhs, ctx)?;
                self.emit_op(Opcode::LitInt);
                self.emit_i64(elem_size as i64);
                self.emit_op(Opcode::IntMul);

                // address = &lhs + offset
                self.emit_op(Opcode::IntAdd);
                Ok(true)
            }
            TypedNode::NegativeSubscript { lhs, index } => {
                let elem_size = node.ty.size();

                // (data, count) = result of compiling lhs
                self.compile_node(lhs, ctx)?;

                // offset = (count - index) * element_size
                self.emit_op(Opcode::LitInt);
                self.emit_i64(*index);
                self.emit_op(Opcode::IntSub);
                self.emit_op(Opcode::LitInt);
                self.emit_i64(elem_size as i64);
                self.emit_op(Opcode::IntMul);

                // element_ptr = data + offset
                self.emit_op(Opcode::IntAdd);
                Ok(true)
            }
            TypedNode::FieldAccess {
                deref,
                instance,
                offset,
            } => {
                if *deref {
                    self.compile_node(instance, ctx)?;
                } else if !self.emit_address_code(instance, ctx)? {
                    return Ok(false);
                }
                self.emit_offset_add(*offset as i64);
                Ok(true)
            }
            TypedNode::TupleAccess {
                deref,
                instance,
                offset,
                ..
            } => {
                if *deref {
                    self.compile_node(instance, ctx)?;
                } else if !self.emit_address_code(instance, ctx)? {
                    return Ok(false);
                }
                self.emit_offset_add(*offset as i64);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn emit_offset_add(&mut self, offset: i64) {
        if offset == 0 {
            return;
        }
        self.emit_int_literal(offset);
        self.emit_op(Opcode::IntAdd);
    }

    // ==================== Value loads over places ====================

    pub(crate) fn compile_subscript(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let TypedNode::Subscript { lhs, rhs } = &node.node else {
            return Err(CompileError::Internal("Expected subscript node.".to_string()));
        };
        let start = self.stack_top;
        let elem_size = node.ty.size();

        if matches!(lhs.ty.kind, TypeKind::Array { .. }) {
            if self.is_constant(rhs) {
                let index = self.evaluate_const_int(rhs, ctx)?;
                let offset = index * elem_size as i64;
                match self.find_static_address(lhs, ctx)? {
                    StaticAddress::Found(address) => {
                        self.emit_op(Opcode::PushValue);
                        self.emit_size(elem_size);
                        self.emit_address(address + offset);
                    }
                    StaticAddress::FoundGlobal(address) => {
                        self.emit_op(Opcode::PushGlobalValue);
                        self.emit_size(elem_size);
                        self.emit_address(address + offset);
                    }
                    StaticAddress::NotFound => {
                        if !self.emit_address_code(lhs, ctx)? {
                            return Err(CompileError::user_unlocated(
                                "Cannot subscript this expression.",
                            ));
                        }
                        self.emit_dynamic_offset_load(rhs, elem_size, ctx)?;
                    }
                }
            } else {
                if !self.emit_address_code(lhs, ctx)? {
                    return Err(CompileError::user_unlocated(
                        "Cannot subscript this expression.",
                    ));
                }
                self.emit_dynamic_offset_load(rhs, elem_size, ctx)?;
            }
        } else {
            // Slice: load the data pointer, then index off it.
            if !self.emit_address_code(lhs, ctx)? {
                return Err(CompileError::user_unlocated(
                    "Cannot subscript this expression.",
                ));
            }
            self.emit_op(Opcode::Load);
            self.emit_size(8);
            self.emit_dynamic_offset_load(rhs, elem_size, ctx)?;
        }

        self.stack_top = start + elem_size as Address;
        Ok(())
    }

    fn emit_dynamic_offset_load(
        &mut self,
        index: &TypedAst,
        elem_size: u32,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        // offset = index * element_size
        self.compile_node(index, ctx)?;
        self.emit_op(Opcode::LitInt);
        self.emit_i64(elem_size as i64);
        self.emit_op(Opcode::IntMul);

        // element_ptr = base + offset
        self.emit_op(Opcode::IntAdd);

        self.emit_op(Opcode::Load);
        self.emit_size(elem_size);
        Ok(())
    }

    pub(crate) fn compile_negative_subscript(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        let size = node.ty.size();

        if !self.emit_address_code(node, ctx)? {
            return Err(CompileError::user_unlocated(
                "Cannot subscript this expression.",
            ));
        }
        self.emit_op(Opcode::Load);
        self.emit_size(size);

        self.stack_top = start + size as Address;
        Ok(())
    }

    /// Field and tuple accesses in value position: a single `Push_Value`
    /// when the whole chain is static, otherwise address computation plus
    /// a `Load`.
    pub(crate) fn compile_access(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        let size = node.ty.size();

        match self.find_static_address(node, ctx)? {
            StaticAddress::Found(address) => {
                self.emit_op(Opcode::PushValue);
                self.emit_size(size);
                self.emit_address(address);
            }
            StaticAddress::FoundGlobal(address) => {
                self.emit_op(Opcode::PushGlobalValue);
                self.emit_size(size);
                self.emit_address(address);
            }
            StaticAddress::NotFound => {
                if !self.emit_dynamic_address_code(node, ctx)? {
                    return Err(CompileError::user_unlocated(
                        "Cannot access a field of this expression.",
                    ));
                }
                self.emit_op(Opcode::Load);
                self.emit_size(size);
            }
        }

        self.stack_top = start + size as Address;
        Ok(())
    }
}
