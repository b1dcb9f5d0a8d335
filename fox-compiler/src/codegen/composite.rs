//! Composite literals: tuples, arrays, slices, structs and enums.
//! Densely packed composites are built by pushing parts in order; padded
//! layouts are built over a zeroed allocation with per-field `Move`s so
//! the padding bytes compare equal under `Equal(size)`.

use super::{FnCompiler, GenCtx};
use crate::bytecode::Opcode;
use crate::error::CompileError;
use crate::typer::typed_ast::{TypedAst, TypedNode};
use crate::value::{Address, Size, TypeKind, ValueType};

/// One piece of a composite: its offset within the value, and either a
/// node to compile or the enum tag word.
enum Part<'n> {
    Node(Size, &'n TypedAst),
    Tag(i64),
}

impl Part<'_> {
    fn offset(&self) -> Size {
        match self {
            Part::Node(offset, _) => *offset,
            Part::Tag(_) => 0,
        }
    }

    fn size(&self) -> Size {
        match self {
            Part::Node(_, node) => node.ty.size(),
            Part::Tag(_) => 8,
        }
    }
}

impl<'g> FnCompiler<'g> {
    pub(crate) fn compile_composite_literal(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        match &node.node {
            TypedNode::ArrayLit { elems, .. } => {
                // uniform element size, always dense
                let start = self.stack_top;
                for elem in elems {
                    self.compile_node(elem, ctx)?;
                }
                self.stack_top = start + node.ty.size() as Address;
                Ok(())
            }
            TypedNode::TupleLit(elems) => {
                let TypeKind::Tuple(tup) = &node.ty.kind else {
                    return Err(CompileError::Internal(
                        "Tuple literal without tuple type.".to_string(),
                    ));
                };
                let parts: Vec<Part> = elems
                    .iter()
                    .enumerate()
                    .map(|(i, e)| Part::Node(tup.offset_of_type(i).unwrap_or(0), e))
                    .collect();
                self.compile_parts(node.ty.size(), &parts, ctx)
            }
            TypedNode::StructLit { size, fields } => {
                let parts: Vec<Part> = fields
                    .iter()
                    .map(|(offset, value)| Part::Node(*offset, value))
                    .collect();
                self.compile_parts(*size, &parts, ctx)
            }
            TypedNode::EnumLit { size, tag, payload } => {
                let mut parts: Vec<Part> = vec![Part::Tag(*tag)];
                parts.extend(
                    payload
                        .iter()
                        .map(|(offset, value)| Part::Node(*offset, value)),
                );
                self.compile_parts(*size, &parts, ctx)
            }
            TypedNode::SliceLit { elems } => self.compile_slice_literal(node, elems, ctx),
            _ => Err(CompileError::Internal(
                "Expected composite literal.".to_string(),
            )),
        }
    }

    fn compile_parts(
        &mut self,
        total: Size,
        parts: &[Part],
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;

        let mut cursor = 0;
        let mut dense = true;
        for part in parts {
            if part.offset() != cursor {
                dense = false;
                break;
            }
            cursor += part.size();
        }
        dense = dense && cursor == total;

        if dense {
            for part in parts {
                match part {
                    Part::Node(_, node) => self.compile_node(node, ctx)?,
                    Part::Tag(tag) => {
                        self.emit_int_literal(*tag);
                        self.stack_top += 8;
                    }
                }
            }
        } else {
            self.emit_op(Opcode::ClearAllocate);
            self.emit_size(total);
            self.stack_top += total as Address;

            for part in parts {
                match part {
                    Part::Node(offset, node) => {
                        self.compile_node(node, ctx)?;
                        self.emit_op(Opcode::PushPointer);
                        self.emit_address(start + *offset as Address);
                        self.emit_op(Opcode::Move);
                        self.emit_size(node.ty.size());
                        self.stack_top -= node.ty.size() as Address;
                    }
                    Part::Tag(tag) => {
                        self.emit_int_literal(*tag);
                        self.stack_top += 8;
                        self.emit_op(Opcode::PushPointer);
                        self.emit_address(start);
                        self.emit_op(Opcode::Move);
                        self.emit_size(8);
                        self.stack_top -= 8;
                    }
                }
            }
        }

        self.stack_top = start + total as Address;
        Ok(())
    }

    /// Slice literals heap-allocate their element data; the slice value
    /// itself is `(data_ptr, count)`.
    fn compile_slice_literal(
        &mut self,
        node: &TypedAst,
        elems: &[TypedAst],
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let start = self.stack_top;
        let count = elems.len() as u32;

        if count == 0 {
            self.emit_op(Opcode::ClearAllocate);
            self.emit_size(node.ty.size());
        } else {
            let elem_size = node
                .ty
                .child_type()
                .map(ValueType::size)
                .unwrap_or_default();
            let alloc_size = count * elem_size;

            // slice data = the element values
            for elem in elems {
                self.compile_node(elem, ctx)?;
            }

            // data ptr = heap allocation of the right size
            self.emit_op(Opcode::HeapAllocate);
            self.emit_size(alloc_size);

            // slice.data = move the element data into the allocation
            self.emit_op(Opcode::MovePushPointer);
            self.emit_size(alloc_size);

            // slice.count
            self.emit_op(Opcode::LitInt);
            self.emit_i64(count as i64);
        }

        self.stack_top = start + node.ty.size() as Address;
        Ok(())
    }
}
