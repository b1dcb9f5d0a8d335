//! Pattern processing: reduces source patterns to flat binding lists with
//! per-binding offsets into the matched value, and type-checks `match`.

use fox_ast::{Expr, MatchArm, Pattern, PatternKind};

use super::{ScopeEntry, TypedAst, Typer};
use crate::error::{CompileError, SourceRange};
use crate::typer::typed_ast::{ArmTest, PatternBinding, ProcessedPattern, TypedMatchArm, TypedNode};
use crate::value::{Size, TypeKind, ValueType};

impl<'a> Typer<'a> {
    /// Resolve a source pattern against the type of the matched value.
    pub(crate) fn process_pattern(
        &mut self,
        pattern: &Pattern,
        ty: &ValueType,
    ) -> Result<ProcessedPattern, CompileError> {
        let mut bindings = Vec::new();
        self.process_pattern_at(pattern, ty, 0, &mut bindings)?;
        Ok(ProcessedPattern {
            ty: ty.clone(),
            bindings,
        })
    }

    fn process_pattern_at(
        &mut self,
        pattern: &Pattern,
        ty: &ValueType,
        offset: Size,
        bindings: &mut Vec<PatternBinding>,
    ) -> Result<(), CompileError> {
        match &pattern.kind {
            PatternKind::Underscore => {
                bindings.push(PatternBinding {
                    name: None,
                    ty: ty.clone(),
                    is_mut: false,
                    offset,
                });
                Ok(())
            }
            PatternKind::Ident { is_mut, name } => {
                bindings.push(PatternBinding {
                    name: Some(name.clone()),
                    ty: ty.clone(),
                    is_mut: *is_mut,
                    offset,
                });
                Ok(())
            }
            PatternKind::Tuple(subs) => {
                let TypeKind::Tuple(tup) = &ty.kind else {
                    return Err(self.err(
                        &pattern.span,
                        format!("Tuple pattern cannot destructure a ({}).", ty),
                    ));
                };
                if subs.len() != tup.len() {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Pattern has {} elements but ({}) has {}.",
                            subs.len(),
                            ty,
                            tup.len()
                        ),
                    ));
                }
                let elems: Vec<(ValueType, Size)> = (0..tup.len())
                    .map(|i| {
                        (
                            tup.elems()[i].clone(),
                            tup.offset_of_type(i).unwrap_or(0),
                        )
                    })
                    .collect();
                for (sub, (elem_ty, elem_offset)) in subs.iter().zip(elems) {
                    self.process_pattern_at(sub, &elem_ty, offset + elem_offset, bindings)?;
                }
                Ok(())
            }
            PatternKind::Struct {
                name,
                fields,
                has_rest,
            } => {
                let TypeKind::Struct(handle) = &ty.kind else {
                    return Err(self.err(
                        &pattern.span,
                        format!("Struct pattern cannot destructure a ({}).", ty),
                    ));
                };
                let [struct_name] = name.as_slice() else {
                    return Err(self.err(
                        &pattern.span,
                        "Module-qualified struct patterns are not yet supported.",
                    ));
                };
                if *struct_name != handle.name {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Pattern names '{}' but the matched value is a ({}).",
                            struct_name, ty
                        ),
                    ));
                }

                let defn = self
                    .interp
                    .types
                    .get_struct_by_uuid(handle.uuid)
                    .ok_or_else(|| {
                        CompileError::Internal(format!("Missing struct #{}", handle.uuid))
                    })?;

                let mut resolved = Vec::new();
                let mut seen = Vec::new();
                for (field_name, sub) in fields {
                    let Some(field) = defn.find_field(field_name) else {
                        return Err(self.err(
                            &pattern.span,
                            format!("'{}' is not a field of '{}'.", field_name, defn.name),
                        ));
                    };
                    if seen.contains(field_name) {
                        return Err(self.err(
                            &pattern.span,
                            format!("Field '{}' bound more than once.", field_name),
                        ));
                    }
                    seen.push(field_name.clone());
                    resolved.push((sub, field.ty.clone(), field.offset));
                }

                if !has_rest && seen.len() != defn.fields.len() {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Pattern must bind every field of '{}' (or end with '..').",
                            defn.name
                        ),
                    ));
                }

                for (sub, field_ty, field_offset) in resolved {
                    self.process_pattern_at(sub, &field_ty, offset + field_offset, bindings)?;
                }
                Ok(())
            }
            PatternKind::Enum { .. } => Err(self.err(
                &pattern.span,
                "Enum patterns are only allowed in match arms.",
            )),
            PatternKind::Value(_) => Err(self.err(
                &pattern.span,
                "Value patterns are only allowed in match arms.",
            )),
        }
    }

    /// Introduce the pattern's bindings into the current scope.
    pub(crate) fn bind_pattern(&mut self, pattern: &ProcessedPattern) {
        for binding in &pattern.bindings {
            if let Some(name) = &binding.name {
                self.bind(
                    name,
                    ScopeEntry::Var {
                        ty: binding.ty.clone().with_mut(binding.is_mut),
                    },
                );
            }
        }
    }

    // ==================== match ====================

    pub(crate) fn check_match(
        &mut self,
        cond: &Expr,
        arms: &[MatchArm],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let typed_cond = self.check_expr(cond)?;

        if !is_equatable(&typed_cond.ty) {
            return Err(self.err(
                &cond.span,
                format!("(match) cannot compare values of type ({}).", typed_cond.ty),
            ));
        }
        if arms.is_empty() {
            return Err(self.err(span, "(match) requires at least one arm."));
        }

        let mut typed_arms = Vec::new();
        let mut default: Option<Box<TypedAst>> = None;
        let mut result_ty: Option<ValueType> = None;

        for arm in arms {
            let (test, bindings) = self.check_arm_pattern(&arm.pattern, &typed_cond.ty)?;

            self.begin_scope();
            for binding in &bindings {
                if let Some(name) = &binding.name {
                    self.bind(
                        name,
                        ScopeEntry::Var {
                            ty: binding.ty.clone().with_mut(binding.is_mut),
                        },
                    );
                }
            }
            let body = self.check_expr(&arm.body);
            self.end_scope();
            let body = body?;

            match &result_ty {
                None => result_ty = Some(body.ty.clone()),
                Some(expected) => {
                    if !expected.eq_ignoring_mutability(&body.ty) {
                        return Err(self.err(
                            span,
                            format!(
                                "Match arms disagree on type: ({}) vs ({}).",
                                expected, body.ty
                            ),
                        ));
                    }
                }
            }

            match test {
                None => {
                    // underscore arm
                    if default.is_some() {
                        return Err(self.err(
                            &arm.pattern.span,
                            "A match may have at most one '_' arm.",
                        ));
                    }
                    default = Some(Box::new(body));
                }
                Some(test) => typed_arms.push(TypedMatchArm {
                    test,
                    bindings,
                    body,
                }),
            }
        }

        let ty = result_ty.unwrap_or(ValueType::NONE);
        Ok(TypedAst::new(
            ty,
            TypedNode::Match {
                cond: Box::new(typed_cond),
                arms: typed_arms,
                default,
            },
        ))
    }

    /// Returns `None` as the test for the underscore (default) arm.
    fn check_arm_pattern(
        &mut self,
        pattern: &Pattern,
        cond_ty: &ValueType,
    ) -> Result<(Option<ArmTest>, Vec<PatternBinding>), CompileError> {
        match &pattern.kind {
            PatternKind::Underscore => Ok((None, Vec::new())),
            PatternKind::Ident { is_mut, name } => Ok((
                Some(ArmTest::Any),
                vec![PatternBinding {
                    name: Some(name.clone()),
                    ty: cond_ty.clone(),
                    is_mut: *is_mut,
                    offset: 0,
                }],
            )),
            PatternKind::Value(expr) => {
                let value = self.check_expr(expr)?;
                if !value.ty.eq_ignoring_mutability(cond_ty) {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Pattern of type ({}) cannot match a ({}).",
                            value.ty, cond_ty
                        ),
                    ));
                }
                Ok((Some(ArmTest::Value(Box::new(value))), Vec::new()))
            }
            PatternKind::Enum { path, args } => {
                let TypeKind::Enum(handle) = &cond_ty.kind else {
                    return Err(self.err(
                        &pattern.span,
                        format!("Enum pattern cannot match a ({}).", cond_ty),
                    ));
                };
                let [enum_name, variant_name] = path.as_slice() else {
                    return Err(self.err(
                        &pattern.span,
                        "Enum patterns take the form Enum::Variant.",
                    ));
                };
                if *enum_name != handle.name {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Pattern names '{}' but the matched value is a ({}).",
                            enum_name, cond_ty
                        ),
                    ));
                }

                let defn = self
                    .interp
                    .types
                    .get_enum_by_uuid(handle.uuid)
                    .ok_or_else(|| {
                        CompileError::Internal(format!("Missing enum #{}", handle.uuid))
                    })?;
                let Some(variant) = defn.find_variant(variant_name) else {
                    return Err(self.err(
                        &pattern.span,
                        format!("'{}' is not a variant of '{}'.", variant_name, defn.name),
                    ));
                };

                if args.len() != variant.payload.len() {
                    return Err(self.err(
                        &pattern.span,
                        format!(
                            "Variant '{}::{}' has {} payload fields but the pattern binds {}.",
                            enum_name,
                            variant_name,
                            variant.payload.len(),
                            args.len()
                        ),
                    ));
                }

                let tag = variant.tag;
                let payload: Vec<(ValueType, Size)> = variant
                    .payload
                    .iter()
                    .map(|p| (p.ty.clone(), p.offset))
                    .collect();

                let mut bindings = Vec::new();
                for (arg, (field_ty, field_offset)) in args.iter().zip(payload) {
                    self.process_pattern_at(arg, &field_ty, field_offset, &mut bindings)?;
                }
                Ok((Some(ArmTest::EnumTag(tag)), bindings))
            }
            PatternKind::Tuple(_) | PatternKind::Struct { .. } => Err(self.err(
                &pattern.span,
                "Destructuring patterns are not supported in match arms.",
            )),
        }
    }
}

/// Kinds whose values can be compared by the match lowering.
pub(crate) fn is_equatable(ty: &ValueType) -> bool {
    matches!(
        ty.kind,
        TypeKind::Bool
            | TypeKind::Char
            | TypeKind::Int
            | TypeKind::Float
            | TypeKind::Str
            | TypeKind::Enum(_)
    )
}
