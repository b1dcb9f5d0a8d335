//! Control flow lowering: if, while, short-circuit logic, both for-loop
//! forms, and match.

use super::{FnCompiler, GenCtx, Variable};
use crate::bytecode::Opcode;
use crate::error::CompileError;
use crate::typer::typed_ast::{ArmTest, TypedAst, TypedMatchArm, TypedNode};
use crate::value::{Address, TypeKind, ValueType};

impl<'g> FnCompiler<'g> {
    pub(crate) fn compile_if(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let TypedNode::If { cond, then, else_ } = &node.node else {
            return Err(CompileError::Internal("Expected if node.".to_string()));
        };
        let start = self.stack_top;

        self.compile_node(cond, ctx)?;
        let else_jump = self.emit_jump(Opcode::JumpFalse, true);

        self.compile_node(then, ctx)?;

        if let Some(else_) = else_ {
            let exit_jump = self.emit_jump(Opcode::Jump, false);
            self.patch_jump(else_jump)?;
            // only one branch runs; the else starts from the same stack
            self.stack_top = start;
            self.compile_node(else_, ctx)?;
            self.patch_jump(exit_jump)?;
        } else {
            self.patch_jump(else_jump)?;
        }

        self.stack_top = start + node.ty.size() as Address;
        Ok(())
    }

    pub(crate) fn compile_while(
        &mut self,
        cond: &TypedAst,
        body: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        let loop_start = self.code.len();

        self.compile_node(cond, ctx)?;
        let exit_jump = self.emit_jump(Opcode::JumpFalse, true);

        self.compile_node(body, ctx)?;
        self.emit_loop(loop_start);
        self.patch_jump(exit_jump)?;

        self.stack_top = start;
        Ok(())
    }

    /// Short-circuit `and`/`or` with the no-pop jumps, so the left operand
    /// is the result when the right side is skipped.
    pub(crate) fn compile_logical(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let (lhs, rhs, jump_op) = match &node.node {
            TypedNode::And { lhs, rhs } => (lhs, rhs, Opcode::JumpFalseNoPop),
            TypedNode::Or { lhs, rhs } => (lhs, rhs, Opcode::JumpTrueNoPop),
            _ => return Err(CompileError::Internal("Expected logical node.".to_string())),
        };
        let start = self.stack_top;
        let size_of_bool = ValueType::BOOL.size();

        self.compile_node(lhs, ctx)?;

        let jump = self.emit_jump(jump_op, false);
        self.emit_op(Opcode::Pop);
        self.emit_size(size_of_bool);
        self.stack_top -= size_of_bool as Address;

        self.compile_node(rhs, ctx)?;
        self.patch_jump(jump)?;

        self.stack_top = start + size_of_bool as Address;
        Ok(())
    }

    pub(crate) fn compile_for(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        self.begin_scope();
        let result = match &node.node {
            TypedNode::ForArray {
                target,
                counter,
                iterable,
                body,
            } => self.compile_for_array(target, counter.as_deref(), iterable, body, ctx),
            TypedNode::ForRange {
                target,
                counter,
                inclusive,
                start,
                end,
                body,
                ..
            } => self.compile_for_range(target, counter.as_deref(), *inclusive, start, end, body, ctx),
            _ => Err(CompileError::Internal("Expected for node.".to_string())),
        };
        self.end_scope();
        result
    }

    fn compile_for_array(
        &mut self,
        target: &crate::typer::typed_ast::ProcessedPattern,
        counter: Option<&str>,
        iterable: &TypedAst,
        body: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        // hidden counter, always allocated
        let counter_v = Variable {
            is_const: false,
            ty: ValueType::INT,
            address: self.stack_top,
        };
        self.emit_op(Opcode::Lit0);
        self.stack_top += counter_v.ty.size() as Address;
        if let Some(name) = counter {
            self.put_variable(name, counter_v.ty.clone(), counter_v.address, false);
        }

        // Alias a plain local iterable; materialize anything else
        // (globals included, since the loop header addresses the iterable
        // frame-relative).
        let iterable_v = match &iterable.node {
            TypedNode::Ident(name)
                if self.find_variable(name).0 == super::FindVariable::Found =>
            {
                match self.find_variable(name).1 {
                    Some(v) => v,
                    None => {
                        return Err(CompileError::Internal(
                            "Iterable variable vanished.".to_string(),
                        ));
                    }
                }
            }
            _ => {
                let v = Variable {
                    is_const: false,
                    ty: iterable.ty.clone(),
                    address: self.stack_top,
                };
                self.compile_node(iterable, ctx)?;
                v
            }
        };

        // loop target slot
        let Some(elem_ty) = iterable_v.ty.child_type().cloned() else {
            return Err(CompileError::Internal(
                "For-loop iterable has no element type.".to_string(),
            ));
        };
        let target_v = Variable {
            is_const: false,
            ty: elem_ty,
            address: self.stack_top,
        };
        self.put_variables_from_pattern(target, target_v.address);
        self.emit_op(Opcode::Allocate);
        self.emit_size(target_v.ty.size());
        self.stack_top += target_v.ty.size() as Address;

        let loop_start = self.code.len();

        // condition: counter < length
        self.emit_op(Opcode::PushValue);
        self.emit_size(counter_v.ty.size());
        self.emit_address(counter_v.address);

        match &iterable_v.ty.kind {
            TypeKind::Array { count, .. } => {
                self.emit_int_literal(*count as i64);
            }
            _ => {
                // a slice's count field sits after its data pointer
                self.emit_op(Opcode::PushValue);
                self.emit_size(ValueType::INT.size());
                self.emit_address(iterable_v.address + 8);
            }
        }

        self.emit_op(Opcode::IntLessThan);
        let exit_jump = self.emit_jump(Opcode::JumpFalse, false);

        // target = iterable[counter]
        self.emit_op(Opcode::PushValue);
        self.emit_size(counter_v.ty.size());
        self.emit_address(counter_v.address);

        self.emit_op(Opcode::LitInt);
        self.emit_i64(target_v.ty.size() as i64);
        self.emit_op(Opcode::IntMul);

        match &iterable_v.ty.kind {
            TypeKind::Array { .. } => {
                self.emit_op(Opcode::PushPointer);
                self.emit_address(iterable_v.address);
            }
            _ => {
                self.emit_op(Opcode::PushValue);
                self.emit_size(8);
                self.emit_address(iterable_v.address);
            }
        }
        self.emit_op(Opcode::IntAdd);

        self.emit_op(Opcode::PushPointer);
        self.emit_address(target_v.address);

        self.emit_op(Opcode::Copy);
        self.emit_size(target_v.ty.size());

        self.compile_node(body, ctx)?;

        // increment counter
        self.emit_op(Opcode::PushPointer);
        self.emit_address(counter_v.address);
        self.emit_op(Opcode::Inc);

        self.emit_loop(loop_start);
        self.patch_jump(exit_jump)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_for_range(
        &mut self,
        target: &str,
        counter: Option<&str>,
        inclusive: bool,
        start: &TypedAst,
        end: &TypedAst,
        body: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        // target variable, initialized from the range start
        let target_v = Variable {
            is_const: false,
            ty: ValueType::INT,
            address: self.stack_top,
        };
        self.put_variable(target, ValueType::INT, target_v.address, false);
        self.compile_node(start, ctx)?;

        let counter_v = counter.map(|name| {
            let v = Variable {
                is_const: false,
                ty: ValueType::INT,
                address: self.stack_top,
            };
            self.put_variable(name, ValueType::INT, v.address, false);
            self.emit_op(Opcode::Lit0);
            self.stack_top += ValueType::INT.size() as Address;
            v
        });

        let end_v = Variable {
            is_const: false,
            ty: ValueType::INT,
            address: self.stack_top,
        };
        self.compile_node(end, ctx)?;

        let loop_start = self.code.len();

        // condition: target < end (or <= for inclusive ranges)
        self.emit_op(Opcode::PushValue);
        self.emit_size(target_v.ty.size());
        self.emit_address(target_v.address);

        self.emit_op(Opcode::PushValue);
        self.emit_size(end_v.ty.size());
        self.emit_address(end_v.address);

        self.emit_op(if inclusive {
            Opcode::IntLessEqual
        } else {
            Opcode::IntLessThan
        });
        let exit_jump = self.emit_jump(Opcode::JumpFalse, false);

        self.compile_node(body, ctx)?;

        if let Some(counter_v) = &counter_v {
            self.emit_op(Opcode::PushPointer);
            self.emit_address(counter_v.address);
            self.emit_op(Opcode::Inc);
        }

        self.emit_op(Opcode::PushPointer);
        self.emit_address(target_v.address);
        self.emit_op(Opcode::Inc);

        self.emit_loop(loop_start);
        self.patch_jump(exit_jump)?;
        Ok(())
    }

    /// Match lowering: an optional result slot below the scrutinee, one
    /// tag/value test per arm, payload bindings addressed straight into
    /// the scrutinee, and a `Move` of each arm's value into the slot.
    pub(crate) fn compile_match(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let TypedNode::Match {
            cond,
            arms,
            default,
        } = &node.node
        else {
            return Err(CompileError::Internal("Expected match node.".to_string()));
        };
        let start = self.stack_top;
        let result_size = node.ty.size();
        let result_addr = start;

        if result_size > 0 {
            self.emit_op(Opcode::ClearAllocate);
            self.emit_size(result_size);
            self.stack_top += result_size as Address;
        }

        self.begin_scope();
        let cond_addr = self.stack_top;
        let cond_size = cond.ty.size();
        self.compile_node(cond, ctx)?;
        let scope_top = self.stack_top;

        let mut exit_jumps = Vec::new();

        for arm in arms {
            let next_jump = self.compile_arm_test(arm, cond, cond_addr, cond_size, ctx)?;

            self.begin_scope();
            for binding in &arm.bindings {
                if let Some(name) = &binding.name {
                    let ty = binding.ty.clone().with_mut(binding.is_mut);
                    self.put_variable(name, ty, cond_addr + binding.offset as Address, false);
                }
            }
            self.compile_node(&arm.body, ctx)?;
            if result_size > 0 {
                self.emit_op(Opcode::PushPointer);
                self.emit_address(result_addr);
                self.emit_op(Opcode::Move);
                self.emit_size(result_size);
                self.stack_top -= result_size as Address;
            }
            self.end_scope();

            exit_jumps.push(self.emit_jump(Opcode::Jump, false));
            if let Some(next_jump) = next_jump {
                self.patch_jump(next_jump)?;
            }
            self.stack_top = scope_top;
        }

        if let Some(default) = default {
            self.begin_scope();
            self.compile_node(default, ctx)?;
            if result_size > 0 {
                self.emit_op(Opcode::PushPointer);
                self.emit_address(result_addr);
                self.emit_op(Opcode::Move);
                self.emit_size(result_size);
                self.stack_top -= result_size as Address;
            }
            self.end_scope();
        }

        for jump in exit_jumps {
            self.patch_jump(jump)?;
        }

        self.end_scope();
        self.stack_top = result_addr + result_size as Address;
        Ok(())
    }

    /// Emit the arm's test; returns the jump to patch to the next arm, or
    /// None for an unconditional (binding) arm.
    fn compile_arm_test(
        &mut self,
        arm: &TypedMatchArm,
        cond: &TypedAst,
        cond_addr: Address,
        cond_size: u32,
        ctx: &mut GenCtx,
    ) -> Result<Option<usize>, CompileError> {
        match &arm.test {
            ArmTest::Any => Ok(None),
            ArmTest::Value(value) => {
                self.emit_op(Opcode::PushValue);
                self.emit_size(cond_size);
                self.emit_address(cond_addr);
                self.stack_top += cond_size as Address;

                self.compile_node(value, ctx)?;

                if cond.ty.kind == TypeKind::Str {
                    self.emit_op(Opcode::StrEqual);
                } else {
                    self.emit_op(Opcode::Equal);
                    self.emit_size(cond_size);
                }
                self.stack_top -= 2 * cond_size as Address;
                self.stack_top += ValueType::BOOL.size() as Address;

                Ok(Some(self.emit_jump(Opcode::JumpFalse, true)))
            }
            ArmTest::EnumTag(tag) => {
                // the tag is the enum's first word
                self.emit_op(Opcode::PushValue);
                self.emit_size(ValueType::INT.size());
                self.emit_address(cond_addr);
                self.stack_top += ValueType::INT.size() as Address;

                self.emit_int_literal(*tag);
                self.stack_top += ValueType::INT.size() as Address;

                self.emit_op(Opcode::Equal);
                self.emit_size(ValueType::INT.size());
                self.stack_top -= 2 * ValueType::INT.size() as Address;
                self.stack_top += ValueType::BOOL.size() as Address;

                Ok(Some(self.emit_jump(Opcode::JumpFalse, true)))
            }
        }
    }
}
