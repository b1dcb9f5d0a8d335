//! Invocation type checking: function calls, intrinsic dispatch, method
//! dot-calls, enum constructors, and the composite literals that share
//! their argument plumbing.

use fox_ast::{Expr, ExprKind, TypeSig};

use super::{ScopeEntry, TypedAst, Typer};
use crate::builtins::Builtin;
use crate::error::{CompileError, SourceRange};
use crate::typer::typed_ast::TypedNode;
use crate::value::{Size, TypeKind, ValueType};

impl<'a> Typer<'a> {
    pub(crate) fn check_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        // Identifiers that don't resolve to a user binding may name a
        // directly callable intrinsic.
        if let ExprKind::Ident(name) = &callee.kind {
            if self.lookup(name).is_none() {
                if name == "free" {
                    return self.check_free(args, span);
                }
                if let Some(builtin) = Builtin::by_source_name(name) {
                    return self.check_builtin_call(builtin, args, span);
                }
            }
        }

        // Paths may name an enum constructor rather than a function.
        if let ExprKind::Path(segments) = &callee.kind {
            if let [head, variant] = segments.as_slice() {
                if let Some(ScopeEntry::EnumType(uuid)) = self.lookup(head) {
                    let uuid = *uuid;
                    let defn = self.interp.types.get_enum_by_uuid(uuid).ok_or_else(|| {
                        CompileError::Internal(format!("Missing enum #{}", uuid))
                    })?;
                    if defn.find_variant(variant).is_some() {
                        return self.check_enum_ctor(uuid, variant, args, span);
                    }
                }
            }
        }

        let typed_callee = self.check_expr(callee)?;
        let TypeKind::Func(func) = &typed_callee.ty.kind else {
            return Err(self.err(
                span,
                format!("Cannot call a value of type ({}).", typed_callee.ty),
            ));
        };
        let func = func.clone();

        if func.varargs {
            if args.len() < func.params.len() {
                return Err(self.err(
                    span,
                    format!(
                        "Expected at least {} arguments but got {}.",
                        func.params.len(),
                        args.len()
                    ),
                ));
            }
        } else if args.len() != func.params.len() {
            return Err(self.err(
                span,
                format!(
                    "Expected {} arguments but got {}.",
                    func.params.len(),
                    args.len()
                ),
            ));
        }

        let mut typed_args = Vec::new();
        for (param, arg) in func.params.iter().zip(args) {
            let typed = self.check_expr(arg)?;
            if !param.fits(&typed.ty) {
                return Err(self.err(
                    &arg.span,
                    format!("Expected argument of type ({}) but got ({}).", param, typed.ty),
                ));
            }
            typed_args.push(typed);
        }

        let mut extras = Vec::new();
        for arg in &args[func.params.len()..] {
            let typed = self.check_expr(arg)?;
            if typed.ty.size() == 0 {
                return Err(self.err(
                    &arg.span,
                    format!("A ({}) cannot be passed as a vararg.", typed.ty),
                ));
            }
            extras.push(typed);
        }

        Ok(TypedAst::new(
            (*func.ret).clone(),
            TypedNode::Invocation {
                callee: Box::new(typed_callee),
                args: typed_args,
                extras,
                arg_size: func.arg_size(),
            },
        ))
    }

    fn check_builtin_call(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let signature = builtin.signature().ok_or_else(|| {
            CompileError::Internal(format!("Builtin {:?} has no direct signature.", builtin))
        })?;
        let TypeKind::Func(func) = &signature.kind else {
            return Err(CompileError::Internal(
                "Builtin signature is not a function type.".to_string(),
            ));
        };

        if args.len() != func.params.len() {
            return Err(self.err(
                span,
                format!(
                    "'{}' expects {} arguments but got {}.",
                    builtin.name(),
                    func.params.len(),
                    args.len()
                ),
            ));
        }

        let mut typed_args = Vec::new();
        for (param, arg) in func.params.iter().zip(args) {
            let typed = self.check_expr(arg)?;
            if !param.fits(&typed.ty) {
                return Err(self.err(
                    &arg.span,
                    format!("Expected argument of type ({}) but got ({}).", param, typed.ty),
                ));
            }
            typed_args.push(typed);
        }

        Ok(TypedAst::new(
            (*func.ret).clone(),
            TypedNode::BuiltinInvocation {
                builtin,
                args: typed_args,
                arg_size: func.arg_size(),
            },
        ))
    }

    /// `free(x)` dispatches on the argument's kind to the matching
    /// deallocation intrinsic.
    fn check_free(&mut self, args: &[Expr], span: &SourceRange) -> Result<TypedAst, CompileError> {
        let [arg] = args else {
            return Err(self.err(span, "'free' expects exactly one argument."));
        };
        let typed = self.check_expr(arg)?;
        let builtin = match &typed.ty.kind {
            TypeKind::Ptr(_) => Builtin::FreePtr,
            TypeKind::Slice(_) => Builtin::FreeSlice,
            TypeKind::Str => Builtin::FreeStr,
            _ => {
                return Err(self.err(
                    &arg.span,
                    format!("'free' expects a pointer, slice or str but got ({}).", typed.ty),
                ));
            }
        };
        let arg_size = typed.ty.size();
        Ok(TypedAst::new(
            ValueType::VOID,
            TypedNode::BuiltinInvocation {
                builtin,
                args: vec![typed],
                arg_size,
            },
        ))
    }

    fn check_enum_ctor(
        &mut self,
        uuid: crate::value::Uuid,
        variant_name: &str,
        args: &[Expr],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let enum_ty = self.enum_value_type(uuid)?;
        let defn = self
            .interp
            .types
            .get_enum_by_uuid(uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing enum #{}", uuid)))?;
        let variant = defn.find_variant(variant_name).ok_or_else(|| {
            CompileError::Internal(format!("Missing variant '{}'.", variant_name))
        })?;

        if args.len() != variant.payload.len() {
            return Err(self.err(
                span,
                format!(
                    "Variant '{}::{}' takes {} values but got {}.",
                    defn.name,
                    variant_name,
                    variant.payload.len(),
                    args.len()
                ),
            ));
        }

        let size = defn.size;
        let tag = variant.tag;
        let payload_spec: Vec<(Size, ValueType)> = variant
            .payload
            .iter()
            .map(|p| (p.offset, p.ty.clone()))
            .collect();

        let mut payload = Vec::new();
        for ((offset, field_ty), arg) in payload_spec.into_iter().zip(args) {
            let typed = self.check_expr(arg)?;
            if !field_ty.fits(&typed.ty) {
                return Err(self.err(
                    &arg.span,
                    format!(
                        "Expected payload of type ({}) but got ({}).",
                        field_ty, typed.ty
                    ),
                ));
            }
            payload.push((offset, typed));
        }

        Ok(TypedAst::new(
            enum_ty,
            TypedNode::EnumLit { size, tag, payload },
        ))
    }

    pub(crate) fn check_method_call(
        &mut self,
        receiver: &Expr,
        method_name: &str,
        args: &[Expr],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let typed_receiver = self.check_expr(receiver)?;

        let (target_ty, through_ptr) = match &typed_receiver.ty.kind {
            TypeKind::Ptr(child) => ((**child).clone(), true),
            _ => (typed_receiver.ty.clone(), false),
        };

        let method = match &target_ty.kind {
            TypeKind::Struct(handle) => self
                .interp
                .types
                .get_struct_by_uuid(handle.uuid)
                .and_then(|d| d.find_method(method_name)),
            TypeKind::Enum(handle) => self
                .interp
                .types
                .get_enum_by_uuid(handle.uuid)
                .and_then(|d| d.find_method(method_name)),
            _ => {
                return Err(self.err(
                    span,
                    format!("({}) has no methods.", typed_receiver.ty),
                ));
            }
        };
        let Some(method) = method else {
            return Err(self.err(
                span,
                format!("'{}' is not a method of ({}).", method_name, target_ty),
            ));
        };
        if method.is_static {
            return Err(self.err(
                span,
                format!(
                    "'{}' is static; call it as {}::{}.",
                    method_name, target_ty, method_name
                ),
            ));
        }

        let callee = self.fn_ref(method.uuid)?;
        let TypeKind::Func(func) = &callee.ty.kind else {
            return Err(CompileError::Internal(
                "Method is not of function type.".to_string(),
            ));
        };
        let func = func.clone();
        let Some(self_param) = func.params.first() else {
            return Err(CompileError::Internal(
                "Non-static method without a self parameter.".to_string(),
            ));
        };
        let TypeKind::Ptr(self_child) = &self_param.kind else {
            return Err(CompileError::Internal(
                "Method self parameter is not a pointer.".to_string(),
            ));
        };
        let needs_mut = self_child.is_mut;

        // Lower the receiver to a pointer argument.
        let receiver_arg = if through_ptr {
            if needs_mut {
                let child_mut = typed_receiver
                    .ty
                    .child_type()
                    .map(|c| c.is_mut)
                    .unwrap_or(false);
                if !child_mut {
                    return Err(self.err(
                        span,
                        format!("'{}' requires a (*mut {}) receiver.", method_name, target_ty),
                    ));
                }
            }
            typed_receiver
        } else if needs_mut {
            if !typed_receiver.ty.is_mut {
                return Err(self.err(
                    span,
                    format!(
                        "'{}' mutates its receiver, which requires the receiver to be 'mut'.",
                        method_name
                    ),
                ));
            }
            let ptr_ty = ValueType::ptr_to(typed_receiver.ty.clone());
            TypedAst::new(ptr_ty, TypedNode::AddressOfMut(Box::new(typed_receiver)))
        } else {
            let child = typed_receiver.ty.clone().with_mut(false);
            TypedAst::new(
                ValueType::ptr_to(child),
                TypedNode::AddressOf(Box::new(typed_receiver)),
            )
        };

        if args.len() != func.params.len() - 1 {
            return Err(self.err(
                span,
                format!(
                    "'{}' expects {} arguments but got {}.",
                    method_name,
                    func.params.len() - 1,
                    args.len()
                ),
            ));
        }

        let mut typed_args = vec![receiver_arg];
        for (param, arg) in func.params.iter().skip(1).zip(args) {
            let typed = self.check_expr(arg)?;
            if !param.fits(&typed.ty) {
                return Err(self.err(
                    &arg.span,
                    format!("Expected argument of type ({}) but got ({}).", param, typed.ty),
                ));
            }
            typed_args.push(typed);
        }

        Ok(TypedAst::new(
            (*func.ret).clone(),
            TypedNode::Invocation {
                callee: Box::new(callee),
                args: typed_args,
                extras: Vec::new(),
                arg_size: func.arg_size(),
            },
        ))
    }

    pub(crate) fn check_array_lit(
        &mut self,
        count: Option<u64>,
        elem: Option<&TypeSig>,
        is_slice: bool,
        elems: &[Expr],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let declared_elem = elem.map(|sig| self.resolve_type_sig(sig, span)).transpose()?;

        let typed_elems = elems
            .iter()
            .map(|e| self.check_expr(e))
            .collect::<Result<Vec<_>, _>>()?;

        let elem_ty = match declared_elem {
            Some(ty) => ty,
            None => match typed_elems.first() {
                Some(first) => first.ty.clone().with_mut(false),
                None => {
                    return Err(self.err(
                        span,
                        "Cannot infer element type of empty array literal.",
                    ));
                }
            },
        };

        for (i, typed) in typed_elems.iter().enumerate() {
            if !typed.ty.eq_ignoring_mutability(&elem_ty) {
                return Err(self.err(
                    span,
                    format!(
                        "Element {} in array literal does not match the expected type ({}).",
                        i + 1,
                        elem_ty
                    ),
                ));
            }
        }

        if is_slice {
            return Ok(TypedAst::new(
                ValueType::slice_of(elem_ty),
                TypedNode::SliceLit { elems: typed_elems },
            ));
        }

        let count = match count {
            Some(declared) => {
                if declared as usize != typed_elems.len() {
                    return Err(self.err(
                        span,
                        format!(
                            "Array literal declares {} elements but provides {}.",
                            declared,
                            typed_elems.len()
                        ),
                    ));
                }
                declared
            }
            None => typed_elems.len() as u64,
        };

        Ok(TypedAst::new(
            ValueType::array_of(count, elem_ty),
            TypedNode::ArrayLit {
                count,
                elems: typed_elems,
            },
        ))
    }

    pub(crate) fn check_struct_lit(
        &mut self,
        name: &[String],
        fields: &[(String, Expr)],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let [struct_name] = name else {
            return Err(self.err(
                span,
                "Module-qualified struct literals are not yet supported.",
            ));
        };
        let Some(ScopeEntry::StructType(uuid)) = self.lookup(struct_name) else {
            return Err(self.err(
                span,
                format!("'{}' is not a struct.", struct_name),
            ));
        };
        let uuid = *uuid;
        let struct_ty = self.struct_value_type(uuid)?;
        let defn = self
            .interp
            .types
            .get_struct_by_uuid(uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing struct #{}", uuid)))?;
        let size = defn.size;

        // Validate names, reject duplicates and extras.
        let field_specs: Vec<(String, Size, ValueType)> = defn
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.offset, f.ty.clone()))
            .collect();
        let defn_name = defn.name.clone();

        let mut bound: Vec<(usize, &Expr)> = Vec::new();
        for (field_name, value) in fields {
            let Some(index) = field_specs.iter().position(|(n, _, _)| n == field_name) else {
                return Err(self.err(
                    span,
                    format!("'{}' is not a field of '{}'.", field_name, defn_name),
                ));
            };
            if bound.iter().any(|(i, _)| *i == index) {
                return Err(self.err(
                    span,
                    format!("Field '{}' bound more than once.", field_name),
                ));
            }
            bound.push((index, value));
        }
        if bound.len() != field_specs.len() {
            let missing: Vec<&str> = field_specs
                .iter()
                .enumerate()
                .filter(|(i, _)| !bound.iter().any(|(bi, _)| bi == i))
                .map(|(_, (n, _, _))| n.as_str())
                .collect();
            return Err(self.err(
                span,
                format!(
                    "Missing fields in '{}' literal: {}.",
                    defn_name,
                    missing.join(", ")
                ),
            ));
        }

        // Evaluate in declaration order so the emitted layout matches the
        // definition's offsets.
        bound.sort_by_key(|(i, _)| *i);

        let mut typed_fields = Vec::new();
        for (index, value) in bound {
            let (field_name, offset, field_ty) = &field_specs[index];
            let typed = self.check_expr(value)?;
            if !field_ty.fits(&typed.ty) {
                return Err(self.err(
                    &value.span,
                    format!(
                        "Field '{}' expects ({}) but got ({}).",
                        field_name, field_ty, typed.ty
                    ),
                ));
            }
            typed_fields.push((*offset, typed));
        }

        Ok(TypedAst::new(
            struct_ty,
            TypedNode::StructLit {
                size,
                fields: typed_fields,
            },
        ))
    }
}
