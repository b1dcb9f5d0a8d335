//! The constant pools and the mini-evaluator behind `const` bindings and
//! constant-indexed subscripts. Pool entries are 8-byte aligned and
//! deduplicated by exact byte comparison; string constants live in their
//! own length-prefixed pool.

use super::{FindVariable, FnCompiler, GenCtx, Variable};
use crate::bytecode::Opcode;
use crate::error::CompileError;
use crate::typer::typed_ast::{ProcessedPattern, TypedAst, TypedBinaryOp, TypedNode};
use crate::value::{Address, TypeKind};

pub(crate) const CONSTANTS_ALIGNMENT: usize = 8;

/// Append `data` to the pool unless an identical, aligned entry already
/// exists; either way, return its offset. Issued offsets never move.
pub(crate) fn add_constant(pool: &mut Vec<u8>, data: &[u8]) -> usize {
    let aligned_size = data.len().div_ceil(CONSTANTS_ALIGNMENT) * CONSTANTS_ALIGNMENT;

    let mut i = 0;
    while i + aligned_size <= pool.len() {
        if &pool[i..i + data.len()] == data {
            return i;
        }
        i += CONSTANTS_ALIGNMENT;
    }

    let index = pool.len();
    pool.extend_from_slice(data);
    pool.resize(index + aligned_size, 0);
    index
}

/// Each entry is `[length: 8 bytes][bytes: length]`, unaligned.
pub(crate) fn add_str_constant(pool: &mut Vec<u8>, s: &str) -> usize {
    let bytes = s.as_bytes();

    let mut i = 0;
    while i + 8 <= pool.len() {
        let index = i;
        let len = u64::from_le_bytes(
            pool[i..i + 8].try_into().unwrap_or([0; 8]),
        ) as usize;
        i += 8;
        if len == bytes.len() && &pool[i..i + len] == bytes {
            return index;
        }
        i += len;
    }

    let index = pool.len();
    pool.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    pool.extend_from_slice(bytes);
    index
}

impl<'g> FnCompiler<'g> {
    /// Can this expression be evaluated at compile time?
    pub(crate) fn is_constant(&self, node: &TypedAst) -> bool {
        match &node.node {
            TypedNode::BoolLit(_)
            | TypedNode::CharLit(_)
            | TypedNode::IntLit(_)
            | TypedNode::FloatLit(_)
            | TypedNode::StrLit(_) => true,
            TypedNode::Ident(name) => {
                matches!(self.find_variable(name).0, FindVariable::FoundConstant)
            }
            TypedNode::Negation(sub) | TypedNode::Not(sub) => self.is_constant(sub),
            TypedNode::Binary { op, lhs, rhs } => {
                matches!(
                    op,
                    TypedBinaryOp::Add
                        | TypedBinaryOp::Sub
                        | TypedBinaryOp::Mul
                        | TypedBinaryOp::Div
                        | TypedBinaryOp::Mod
                ) && self.is_constant(lhs)
                    && self.is_constant(rhs)
            }
            TypedNode::Range { lhs, rhs, .. } => self.is_constant(lhs) && self.is_constant(rhs),
            TypedNode::TupleLit(elems) | TypedNode::ArrayLit { elems, .. } => {
                elems.iter().all(|e| self.is_constant(e))
            }
            _ => false,
        }
    }

    pub(crate) fn evaluate_const_int(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<i64, CompileError> {
        match &node.node {
            TypedNode::IntLit(v) => Ok(*v),
            TypedNode::CharLit(c) => Ok(*c as i64),
            TypedNode::BoolLit(b) => Ok(*b as i64),
            TypedNode::Ident(name) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' in constant evaluation.",
                        name
                    )));
                };
                if status != FindVariable::FoundConstant {
                    return Err(CompileError::user_unlocated(format!(
                        "'{}' is not a constant.",
                        name
                    )));
                }
                let at = variable.address as usize;
                let bytes = ctx
                    .interp
                    .constants
                    .get(at..at + 8)
                    .ok_or_else(|| CompileError::Internal("Constant out of range.".to_string()))?;
                Ok(i64::from_le_bytes(bytes.try_into().unwrap_or([0; 8])))
            }
            TypedNode::Negation(sub) => Ok(-self.evaluate_const_int(sub, ctx)?),
            TypedNode::Binary { op, lhs, rhs } => {
                let a = self.evaluate_const_int(lhs, ctx)?;
                let b = self.evaluate_const_int(rhs, ctx)?;
                match op {
                    TypedBinaryOp::Add => Ok(a.wrapping_add(b)),
                    TypedBinaryOp::Sub => Ok(a.wrapping_sub(b)),
                    TypedBinaryOp::Mul => Ok(a.wrapping_mul(b)),
                    TypedBinaryOp::Div => {
                        if b == 0 {
                            return Err(CompileError::user_unlocated(
                                "Division by zero in constant expression.",
                            ));
                        }
                        Ok(a.wrapping_div(b))
                    }
                    TypedBinaryOp::Mod => {
                        if b == 0 {
                            return Err(CompileError::user_unlocated(
                                "Division by zero in constant expression.",
                            ));
                        }
                        Ok(a.wrapping_rem(b))
                    }
                    _ => Err(CompileError::Internal(
                        "Non-constant operator in constant expression.".to_string(),
                    )),
                }
            }
            _ => Err(CompileError::Internal(
                "Expression is not a constant int.".to_string(),
            )),
        }
    }

    fn evaluate_const_float(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
    ) -> Result<f64, CompileError> {
        match &node.node {
            TypedNode::FloatLit(v) => Ok(*v),
            TypedNode::Ident(name) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' in constant evaluation.",
                        name
                    )));
                };
                if status != FindVariable::FoundConstant {
                    return Err(CompileError::user_unlocated(format!(
                        "'{}' is not a constant.",
                        name
                    )));
                }
                let at = variable.address as usize;
                let bytes = ctx
                    .interp
                    .constants
                    .get(at..at + 8)
                    .ok_or_else(|| CompileError::Internal("Constant out of range.".to_string()))?;
                Ok(f64::from_le_bytes(bytes.try_into().unwrap_or([0; 8])))
            }
            TypedNode::Negation(sub) => Ok(-self.evaluate_const_float(sub, ctx)?),
            TypedNode::Binary { op, lhs, rhs } => {
                let a = self.evaluate_const_float(lhs, ctx)?;
                let b = self.evaluate_const_float(rhs, ctx)?;
                match op {
                    TypedBinaryOp::Add => Ok(a + b),
                    TypedBinaryOp::Sub => Ok(a - b),
                    TypedBinaryOp::Mul => Ok(a * b),
                    TypedBinaryOp::Div => Ok(a / b),
                    _ => Err(CompileError::Internal(
                        "Non-constant operator in constant expression.".to_string(),
                    )),
                }
            }
            _ => Err(CompileError::Internal(
                "Expression is not a constant float.".to_string(),
            )),
        }
    }

    /// Serialize a constant expression into `buf` at the value's natural
    /// layout. `buf` must already be zeroed and `node.ty.size()` long, so
    /// padding inside composites is deterministic.
    fn evaluate_const_into(
        &mut self,
        node: &TypedAst,
        ctx: &mut GenCtx,
        buf: &mut [u8],
    ) -> Result<(), CompileError> {
        let write = |buf: &mut [u8], at: usize, bytes: &[u8]| -> Result<(), CompileError> {
            buf.get_mut(at..at + bytes.len())
                .ok_or_else(|| CompileError::Internal("Constant buffer overrun.".to_string()))?
                .copy_from_slice(bytes);
            Ok(())
        };

        match (&node.ty.kind, &node.node) {
            (TypeKind::Bool, TypedNode::BoolLit(b)) => write(buf, 0, &[*b as u8]),
            (TypeKind::Bool, TypedNode::Not(sub)) => {
                let mut inner = [0u8; 1];
                self.evaluate_const_into(sub, ctx, &mut inner)?;
                write(buf, 0, &[(inner[0] == 0) as u8])
            }
            (TypeKind::Char, TypedNode::CharLit(c)) => {
                write(buf, 0, &(*c as u32).to_le_bytes())
            }
            (TypeKind::Int, _) => {
                let v = self.evaluate_const_int(node, ctx)?;
                write(buf, 0, &v.to_le_bytes())
            }
            (TypeKind::Float, _) => {
                let v = self.evaluate_const_float(node, ctx)?;
                write(buf, 0, &v.to_le_bytes())
            }
            (_, TypedNode::Ident(name)) => {
                let (status, variable) = self.find_variable(name);
                let Some(variable) = variable else {
                    return Err(CompileError::Internal(format!(
                        "Unresolved identifier '{}' in constant evaluation.",
                        name
                    )));
                };
                if status != FindVariable::FoundConstant {
                    return Err(CompileError::user_unlocated(format!(
                        "'{}' is not a constant.",
                        name
                    )));
                }
                let at = variable.address as usize;
                let size = variable.ty.size() as usize;
                let bytes = ctx
                    .interp
                    .constants
                    .get(at..at + size)
                    .ok_or_else(|| CompileError::Internal("Constant out of range.".to_string()))?
                    .to_vec();
                write(buf, 0, &bytes)
            }
            (TypeKind::Tuple(tup), TypedNode::TupleLit(elems)) => {
                let offsets: Vec<usize> = (0..tup.len())
                    .map(|i| tup.offset_of_type(i).unwrap_or(0) as usize)
                    .collect();
                for (elem, offset) in elems.iter().zip(offsets) {
                    let size = elem.ty.size() as usize;
                    let mut inner = vec![0u8; size];
                    self.evaluate_const_into(elem, ctx, &mut inner)?;
                    write(buf, offset, &inner)?;
                }
                Ok(())
            }
            (TypeKind::Array { .. }, TypedNode::ArrayLit { elems, .. }) => {
                let mut at = 0usize;
                for elem in elems {
                    let size = elem.ty.size() as usize;
                    let mut inner = vec![0u8; size];
                    self.evaluate_const_into(elem, ctx, &mut inner)?;
                    write(buf, at, &inner)?;
                    at += size;
                }
                Ok(())
            }
            (TypeKind::Range { .. }, TypedNode::Range { lhs, rhs, .. }) => {
                let start = self.evaluate_const_int(lhs, ctx)?;
                let end = self.evaluate_const_int(rhs, ctx)?;
                write(buf, 0, &start.to_le_bytes())?;
                write(buf, 8, &end.to_le_bytes())
            }
            _ => Err(CompileError::user_unlocated(
                "Cannot initialize constant with non-constant expression.",
            )),
        }
    }

    pub(crate) fn declare_constant(
        &mut self,
        pattern: &ProcessedPattern,
        init: Option<&TypedAst>,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let [binding] = pattern.bindings.as_slice() else {
            return Err(CompileError::user_unlocated(
                "'const' only works with single identifiers.",
            ));
        };
        let Some(name) = binding.name.clone() else {
            return Err(CompileError::user_unlocated(
                "'const' requires a named binding.",
            ));
        };
        let Some(init) = init else {
            return Err(CompileError::Internal(
                "Constant without initializer reached code generation.".to_string(),
            ));
        };

        if !self.is_constant(init) {
            return Err(CompileError::user_unlocated(
                "Cannot initialize constant with non-constant expression.",
            ));
        }

        let ty = binding.ty.clone().with_mut(false);
        let address: Address = match &ty.kind {
            TypeKind::Bool
            | TypeKind::Char
            | TypeKind::Int
            | TypeKind::Float
            | TypeKind::Tuple(_)
            | TypeKind::Array { .. }
            | TypeKind::Range { .. } => {
                let mut buf = vec![0u8; ty.size() as usize];
                self.evaluate_const_into(init, ctx, &mut buf)?;
                add_constant(&mut ctx.interp.constants, &buf) as Address
            }
            TypeKind::Str => match &init.node {
                TypedNode::StrLit(s) => {
                    add_str_constant(&mut ctx.interp.str_constants, s) as Address
                }
                TypedNode::Ident(other) => {
                    let (status, variable) = self.find_variable(other);
                    match (status, variable) {
                        (FindVariable::FoundConstant, Some(v)) => v.address,
                        _ => {
                            return Err(CompileError::user_unlocated(
                                "Cannot initialize constant with non-constant expression.",
                            ));
                        }
                    }
                }
                _ => {
                    return Err(CompileError::user_unlocated(
                        "Cannot initialize constant with non-constant expression.",
                    ));
                }
            },
            TypeKind::Void => {
                return Err(CompileError::user_unlocated(
                    "Cannot declare a constant of type (void).",
                ));
            }
            _ => {
                return Err(CompileError::user_unlocated(format!(
                    "Constants of type ({}) are not yet supported.",
                    ty
                )));
            }
        };

        self.put_variable(&name, ty, address, true);
        Ok(())
    }

    /// Push a constant's value, re-materializing scalars as literal
    /// opcodes and larger values as pool loads.
    pub(crate) fn compile_constant(
        &mut self,
        constant: &Variable,
        ctx: &mut GenCtx,
    ) -> Result<(), CompileError> {
        let old_top = self.stack_top;
        let at = constant.address as usize;

        let pool_bytes = |ctx: &GenCtx, size: usize| -> Result<Vec<u8>, CompileError> {
            ctx.interp
                .constants
                .get(at..at + size)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| CompileError::Internal("Constant out of range.".to_string()))
        };

        match &constant.ty.kind {
            TypeKind::Bool => {
                let bytes = pool_bytes(ctx, 1)?;
                self.emit_op(if bytes[0] != 0 {
                    Opcode::LitTrue
                } else {
                    Opcode::LitFalse
                });
            }
            TypeKind::Char => {
                let bytes = pool_bytes(ctx, 4)?;
                self.emit_op(Opcode::LitChar);
                self.code.extend_from_slice(&bytes);
            }
            TypeKind::Int => {
                let bytes = pool_bytes(ctx, 8)?;
                let value = i64::from_le_bytes(bytes.as_slice().try_into().unwrap_or([0; 8]));
                self.emit_int_literal(value);
            }
            TypeKind::Float => {
                let bytes = pool_bytes(ctx, 8)?;
                self.emit_op(Opcode::LitFloat);
                self.code.extend_from_slice(&bytes);
            }
            TypeKind::Str => {
                self.emit_op(Opcode::LoadConstString);
                self.emit_u64(constant.address as u64);
            }
            TypeKind::Array { .. } => {
                self.emit_op(Opcode::LoadConstArray);
                self.emit_size(constant.ty.size());
                self.emit_u64(constant.address as u64);
            }
            TypeKind::Tuple(_) | TypeKind::Range { .. } => {
                self.emit_op(Opcode::LoadConst);
                self.emit_size(constant.ty.size());
                self.emit_u64(constant.address as u64);
            }
            _ => {
                return Err(CompileError::Internal(format!(
                    "Constant of type ({}) is not compilable.",
                    constant.ty
                )));
            }
        }

        self.stack_top = old_top + constant.ty.size() as Address;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pool_dedup() {
        let mut pool = Vec::new();
        let a = add_constant(&mut pool, &42i64.to_le_bytes());
        let b = add_constant(&mut pool, &7i64.to_le_bytes());
        let c = add_constant(&mut pool, &42i64.to_le_bytes());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 16);
    }

    #[test]
    fn test_constant_pool_alignment() {
        let mut pool = Vec::new();
        let a = add_constant(&mut pool, &[1u8]);
        let b = add_constant(&mut pool, &[2u8, 3]);
        assert_eq!(a, 0);
        assert_eq!(b, 8);
        assert_eq!(pool.len(), 16);
    }

    #[test]
    fn test_str_constant_dedup_and_layout() {
        let mut pool = Vec::new();
        let a = add_str_constant(&mut pool, "hi");
        let b = add_str_constant(&mut pool, "there");
        let c = add_str_constant(&mut pool, "hi");
        assert_eq!(a, c);
        assert_eq!(a, 0);
        // entry layout: [len: 8][bytes]
        assert_eq!(b, 10);
        assert_eq!(&pool[8..10], b"hi");
        assert_eq!(
            u64::from_le_bytes(pool[10..18].try_into().unwrap()),
            5
        );
    }
}
