//! The type checker: walks the untyped AST, resolves identifiers and type
//! signatures against a stack of lexical scopes, and produces a typed AST
//! in which every node carries a resolved value type and precomputed
//! layout information.

mod calls;
mod decls;
mod patterns;
pub mod typed_ast;

pub use typed_ast::*;

use std::collections::HashMap;

use fox_ast::{BinaryOp, Block, Expr, ExprKind, Program, Stmt, StmtKind, TypeSig, UnaryOp};

use crate::builtins::Builtin;
use crate::error::{CompileError, SourceRange};
use crate::interp::Interpreter;
use crate::value::{TypeHandle, TypeKind, Uuid, ValueType};

#[derive(Debug, Clone)]
pub(crate) enum ScopeEntry {
    Var { ty: ValueType },
    Func { uuid: Uuid, ty: ValueType },
    StructType(Uuid),
    EnumType(Uuid),
}

pub(crate) type Scope = HashMap<String, ScopeEntry>;

pub struct Typer<'a> {
    pub(crate) interp: &'a mut Interpreter,
    pub(crate) module: Uuid,
    pub(crate) scopes: Vec<Scope>,
    /// Resolved `Self` type while checking an impl block
    pub(crate) self_type: Option<ValueType>,
    /// Declared return types of the enclosing functions, innermost last
    pub(crate) fn_rets: Vec<ValueType>,
}

/// Type-check a parsed program against the interpreter's registries.
pub fn typecheck(
    interp: &mut Interpreter,
    module: Uuid,
    program: &Program,
) -> Result<Vec<TypedAst>, CompileError> {
    let mut typer = Typer {
        interp,
        module,
        scopes: vec![Scope::new()],
        self_type: None,
        fn_rets: Vec::new(),
    };
    program
        .stmts
        .iter()
        .map(|stmt| typer.check_stmt(stmt))
        .collect()
}

impl<'a> Typer<'a> {
    pub(crate) fn err(&self, span: &SourceRange, message: impl Into<String>) -> CompileError {
        CompileError::user(span.clone(), message)
    }

    // ==================== Scopes ====================

    pub(crate) fn begin_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub(crate) fn end_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn bind(&mut self, name: &str, entry: ScopeEntry) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), entry);
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&ScopeEntry> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn known_names(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .flat_map(|s| s.keys().map(String::as_str))
            .collect()
    }

    pub(crate) fn unresolved(&self, span: &SourceRange, name: &str) -> CompileError {
        let message = format!("Unresolved identifier '{}'.", name);
        match fox_diagnostics::closest_match(name, self.known_names()) {
            Some(suggestion) => self.err(
                span,
                format!("{} Did you mean '{}'?", message, suggestion),
            ),
            None => self.err(span, message),
        }
    }

    // ==================== Types ====================

    pub(crate) fn struct_value_type(&self, uuid: Uuid) -> Result<ValueType, CompileError> {
        let defn = self
            .interp
            .types
            .get_struct_by_uuid(uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing struct #{}", uuid)))?;
        Ok(ValueType::new(TypeKind::Struct(TypeHandle {
            uuid,
            name: defn.name.clone(),
            size: defn.size,
        })))
    }

    pub(crate) fn enum_value_type(&self, uuid: Uuid) -> Result<ValueType, CompileError> {
        let defn = self
            .interp
            .types
            .get_enum_by_uuid(uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing enum #{}", uuid)))?;
        Ok(ValueType::new(TypeKind::Enum(TypeHandle {
            uuid,
            name: defn.name.clone(),
            size: defn.size,
        })))
    }

    pub(crate) fn resolve_type_sig(
        &self,
        sig: &TypeSig,
        span: &SourceRange,
    ) -> Result<ValueType, CompileError> {
        match sig {
            TypeSig::Named(name) => match name.as_str() {
                "void" => Ok(ValueType::VOID),
                "bool" => Ok(ValueType::BOOL),
                "char" => Ok(ValueType::CHAR),
                "int" => Ok(ValueType::INT),
                "float" => Ok(ValueType::FLOAT),
                "str" => Ok(ValueType::STR),
                "Self" => self
                    .self_type
                    .clone()
                    .ok_or_else(|| self.err(span, "'Self' is only valid inside an impl block.")),
                _ => match self.lookup(name) {
                    Some(ScopeEntry::StructType(uuid)) => self.struct_value_type(*uuid),
                    Some(ScopeEntry::EnumType(uuid)) => self.enum_value_type(*uuid),
                    _ => Err(self.err(span, format!("Unknown type '{}'.", name))),
                },
            },
            TypeSig::Path(segments) => Err(self.err(
                span,
                format!(
                    "Module-qualified types ('{}') are not yet supported.",
                    segments.join("::")
                ),
            )),
            TypeSig::Ptr { is_mut, inner } => {
                let child = self.resolve_type_sig(inner, span)?.with_mut(*is_mut);
                Ok(ValueType::ptr_to(child))
            }
            TypeSig::Array { count, elem } => {
                let elem = self.resolve_type_sig(elem, span)?;
                Ok(ValueType::array_of(*count, elem))
            }
            TypeSig::Slice { elem } => {
                let elem = self.resolve_type_sig(elem, span)?;
                Ok(ValueType::slice_of(elem))
            }
            TypeSig::Tuple(elems) => {
                let elems = elems
                    .iter()
                    .map(|e| self.resolve_type_sig(e, span))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ValueType::tuple_of(elems))
            }
            TypeSig::Fn { params, ret } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_type_sig(p, span))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = self.resolve_type_sig(ret, span)?;
                Ok(ValueType::func(params, ret, false))
            }
        }
    }

    // ==================== Statements ====================

    pub(crate) fn check_stmt(&mut self, stmt: &Stmt) -> Result<TypedAst, CompileError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.check_expr(expr),
            StmtKind::Let {
                is_const,
                pattern,
                ty,
                init,
            } => self.check_let(stmt, *is_const, pattern, ty.as_ref(), init.as_ref()),
            StmtKind::Assign { target, value } => self.check_assign(target, value),
            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),
            StmtKind::While { cond, body } => self.check_while(cond, body),
            StmtKind::For {
                pattern,
                counter,
                iterable,
                body,
            } => self.check_for(pattern, counter.as_deref(), iterable, body),
            StmtKind::Print { newline, arg } => self.check_print(*newline, arg),
            StmtKind::Defer(_) => Err(self.err(&stmt.span, "'defer' is not yet supported.")),
            StmtKind::Fn(decl) => self.check_fn_decl(decl, &stmt.span),
            StmtKind::StructDecl(decl) => self.check_struct_decl(decl, &stmt.span),
            StmtKind::EnumDecl(decl) => self.check_enum_decl(decl, &stmt.span),
            StmtKind::Impl(block) => self.check_impl(block, &stmt.span),
            StmtKind::TraitDecl(decl) => Err(self.err(
                &stmt.span,
                format!("Trait '{}' cannot be declared: traits are not yet supported.", decl.name),
            )),
            StmtKind::Import { path, .. } => Err(self.err(
                &stmt.span,
                format!(
                    "Cannot import '{}': module imports are not yet supported.",
                    path.join("::")
                ),
            )),
        }
    }

    fn check_let(
        &mut self,
        stmt: &Stmt,
        is_const: bool,
        pattern: &fox_ast::Pattern,
        ty: Option<&TypeSig>,
        init: Option<&Expr>,
    ) -> Result<TypedAst, CompileError> {
        if is_const {
            if !matches!(pattern.kind, fox_ast::PatternKind::Ident { is_mut: false, .. }) {
                return Err(self.err(
                    &pattern.span,
                    "'const' requires a single non-mut identifier.",
                ));
            }
            if init.is_none() {
                return Err(self.err(&stmt.span, "'const' requires an initializer."));
            }
        }

        let typed_init = init.map(|e| self.check_expr(e)).transpose()?;

        let declared = ty.map(|sig| self.resolve_type_sig(sig, &stmt.span)).transpose()?;

        let value_ty = match (&declared, &typed_init) {
            (Some(declared), Some(init)) => {
                if !declared.fits(&init.ty) {
                    return Err(self.err(
                        &stmt.span,
                        format!(
                            "Specified type ({}) does not match given type ({}).",
                            declared, init.ty
                        ),
                    ));
                }
                declared.clone()
            }
            (Some(declared), None) => declared.clone(),
            (None, Some(init)) => {
                if matches!(init.ty.kind, TypeKind::None | TypeKind::Void) {
                    return Err(self.err(
                        &stmt.span,
                        format!("Cannot bind a value of type ({}).", init.ty),
                    ));
                }
                init.ty.clone()
            }
            (None, None) => {
                return Err(self.err(
                    &stmt.span,
                    "'let' requires an initializer or a type signature.",
                ));
            }
        };

        if init.is_none()
            && !pattern.all_bindings_mut()
            && !value_ty.is_partially_mutable()
        {
            return Err(self.err(
                &stmt.span,
                "Uninitialized 'let' requires the binding to be 'mut'.",
            ));
        }

        let processed = self.process_pattern(pattern, &value_ty)?;
        self.bind_pattern(&processed);

        Ok(TypedAst::stmt(TypedNode::Let {
            is_const,
            pattern: processed,
            init: typed_init.map(Box::new),
        }))
    }

    fn check_assign(&mut self, target: &Expr, value: &Expr) -> Result<TypedAst, CompileError> {
        let lhs = self.check_expr(target)?;
        let rhs = self.check_expr(value)?;

        if !is_place(&lhs.node) {
            return Err(self.err(&target.span, "Cannot assign to this kind of expression."));
        }
        if !lhs.ty.is_mut {
            return Err(self.err(
                &target.span,
                format!(
                    "Cannot assign to something of type ({}) because it is immutable.",
                    lhs.ty
                ),
            ));
        }
        if !lhs.ty.assignable_from(&rhs.ty) {
            return Err(self.err(
                &value.span,
                format!("(=) cannot assign ({}) to ({}).", rhs.ty, lhs.ty),
            ));
        }

        Ok(TypedAst::stmt(TypedNode::Assignment {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }))
    }

    fn check_return(
        &mut self,
        stmt: &Stmt,
        value: Option<&Expr>,
    ) -> Result<TypedAst, CompileError> {
        let typed = value.map(|e| self.check_expr(e)).transpose()?;

        match self.fn_rets.last() {
            Some(ret) => {
                let actual = typed.as_ref().map_or(ValueType::VOID, |t| t.ty.clone());
                if !ret.eq_ignoring_mutability(&actual) {
                    return Err(self.err(
                        &stmt.span,
                        format!("Expected return type ({}) but got ({}).", ret, actual),
                    ));
                }
            }
            None => {
                if typed.is_some() {
                    return Err(self.err(
                        &stmt.span,
                        "A top-level return cannot carry a value.",
                    ));
                }
            }
        }

        Ok(TypedAst::stmt(TypedNode::Return(typed.map(Box::new))))
    }

    fn check_while(&mut self, cond: &Expr, body: &Block) -> Result<TypedAst, CompileError> {
        let typed_cond = self.check_expr(cond)?;
        if typed_cond.ty.kind != TypeKind::Bool {
            return Err(self.err(
                &cond.span,
                format!(
                    "(while) requires condition to be (bool) but was given ({}).",
                    typed_cond.ty
                ),
            ));
        }
        let typed_body = self.check_block(body)?;
        Ok(TypedAst::stmt(TypedNode::While {
            cond: Box::new(typed_cond),
            body: Box::new(typed_body),
        }))
    }

    fn check_for(
        &mut self,
        pattern: &fox_ast::Pattern,
        counter: Option<&str>,
        iterable: &Expr,
        body: &Block,
    ) -> Result<TypedAst, CompileError> {
        let typed_iterable = self.check_expr(iterable)?;

        self.begin_scope();
        let result = self.check_for_inner(pattern, counter, iterable, typed_iterable, body);
        self.end_scope();
        result
    }

    fn check_for_inner(
        &mut self,
        pattern: &fox_ast::Pattern,
        counter: Option<&str>,
        iterable: &Expr,
        typed_iterable: TypedAst,
        body: &Block,
    ) -> Result<TypedAst, CompileError> {
        if let Some(name) = counter {
            self.bind(
                name,
                ScopeEntry::Var {
                    ty: ValueType::INT,
                },
            );
        }

        match &typed_iterable.ty.kind {
            TypeKind::Range { inclusive, .. } => {
                let fox_ast::PatternKind::Ident { is_mut, ref name } = pattern.kind else {
                    return Err(self.err(
                        &pattern.span,
                        "A range for-loop requires a single identifier target.",
                    ));
                };
                self.bind(
                    name,
                    ScopeEntry::Var {
                        ty: ValueType::INT.with_mut(is_mut),
                    },
                );
                let inclusive = *inclusive;
                let TypedNode::Range { lhs, rhs, .. } = typed_iterable.node else {
                    return Err(self.err(
                        &iterable.span,
                        "A range for-loop requires a literal range expression.",
                    ));
                };
                let body = self.check_block(body)?;
                Ok(TypedAst::stmt(TypedNode::ForRange {
                    target: name.clone(),
                    target_mut: is_mut,
                    counter: counter.map(str::to_string),
                    inclusive,
                    start: lhs,
                    end: rhs,
                    body: Box::new(body),
                }))
            }
            TypeKind::Array { elem, .. } | TypeKind::Slice(elem) => {
                let elem_ty = (**elem).clone();
                let target = self.process_pattern(pattern, &elem_ty)?;
                self.bind_pattern(&target);
                let body = self.check_block(body)?;
                Ok(TypedAst::stmt(TypedNode::ForArray {
                    target,
                    counter: counter.map(str::to_string),
                    iterable: Box::new(typed_iterable),
                    body: Box::new(body),
                }))
            }
            _ => Err(self.err(
                &iterable.span,
                format!(
                    "(for) requires an array, slice or range but was given ({}).",
                    typed_iterable.ty
                ),
            )),
        }
    }

    fn check_print(&mut self, newline: bool, arg: &Expr) -> Result<TypedAst, CompileError> {
        let typed = self.check_expr(arg)?;

        let (builtin, type_uuid) = match &typed.ty.kind {
            TypeKind::Bool => (if newline { Builtin::PrintBool } else { Builtin::PutsBool }, None),
            TypeKind::Char => (if newline { Builtin::PrintChar } else { Builtin::PutsChar }, None),
            TypeKind::Int => (if newline { Builtin::PrintInt } else { Builtin::PutsInt }, None),
            TypeKind::Float => (
                if newline { Builtin::PrintFloat } else { Builtin::PutsFloat },
                None,
            ),
            TypeKind::Str => (if newline { Builtin::PrintStr } else { Builtin::PutsStr }, None),
            TypeKind::Struct(handle) => (
                if newline { Builtin::PrintStruct } else { Builtin::PutsStruct },
                Some(handle.uuid),
            ),
            TypeKind::Enum(handle) => (
                if newline { Builtin::PrintEnum } else { Builtin::PutsEnum },
                Some(handle.uuid),
            ),
            _ => {
                return Err(self.err(
                    &arg.span,
                    format!("Cannot print a value of type ({}).", typed.ty),
                ));
            }
        };

        Ok(TypedAst::stmt(TypedNode::Print {
            builtin,
            type_uuid,
            arg: Box::new(typed),
        }))
    }

    pub(crate) fn check_block(&mut self, block: &Block) -> Result<TypedAst, CompileError> {
        self.begin_scope();
        let nodes = block
            .stmts
            .iter()
            .map(|s| self.check_stmt(s))
            .collect::<Result<Vec<_>, _>>();
        self.end_scope();
        Ok(TypedAst::stmt(TypedNode::Block(nodes?)))
    }

    // ==================== Expressions ====================

    pub(crate) fn check_expr(&mut self, expr: &Expr) -> Result<TypedAst, CompileError> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Ok(TypedAst::new(ValueType::INT, TypedNode::IntLit(*v))),
            ExprKind::FloatLiteral(v) => {
                Ok(TypedAst::new(ValueType::FLOAT, TypedNode::FloatLit(*v)))
            }
            ExprKind::BoolLiteral(v) => Ok(TypedAst::new(ValueType::BOOL, TypedNode::BoolLit(*v))),
            ExprKind::CharLiteral(v) => Ok(TypedAst::new(ValueType::CHAR, TypedNode::CharLit(*v))),
            ExprKind::StrLiteral(v) => Ok(TypedAst::new(
                ValueType::STR,
                TypedNode::StrLit(v.clone()),
            )),
            ExprKind::Noinit => Err(self.err(
                &expr.span,
                "'noinit' is only allowed as a let initializer.",
            )),
            ExprKind::Ident(name) => self.check_ident(name, &expr.span),
            ExprKind::Path(segments) => self.check_path(segments, &expr.span),
            ExprKind::Unary { op, expr: sub } => self.check_unary(*op, sub, &expr.span),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, &expr.span),
            ExprKind::Range {
                inclusive,
                start,
                end,
            } => self.check_range(*inclusive, start, end),
            ExprKind::Subscript { object, index } => self.check_subscript(object, index, &expr.span),
            ExprKind::FieldAccess { object, field } => {
                self.check_field_access(object, field, &expr.span)
            }
            ExprKind::TupleField { object, index } => {
                self.check_tuple_field(object, *index, &expr.span)
            }
            ExprKind::Call { callee, args } => self.check_call(callee, args, &expr.span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(receiver, method, args, &expr.span),
            ExprKind::ArrayLit {
                count,
                elem,
                is_slice,
                elems,
            } => self.check_array_lit(*count, elem.as_ref(), *is_slice, elems, &expr.span),
            ExprKind::TupleLit(elems) => {
                let typed = elems
                    .iter()
                    .map(|e| self.check_expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = ValueType::tuple_of(typed.iter().map(|t| t.ty.clone()).collect());
                Ok(TypedAst::new(ty, TypedNode::TupleLit(typed)))
            }
            ExprKind::StructLit { name, fields } => {
                self.check_struct_lit(name, fields, &expr.span)
            }
            ExprKind::If { cond, then, else_ } => self.check_if(cond, then, else_.as_deref()),
            ExprKind::Match { cond, arms } => self.check_match(cond, arms, &expr.span),
            ExprKind::Cast { expr: sub, target } => self.check_cast(sub, target, &expr.span),
            ExprKind::Block(block) => self.check_block(block),
        }
    }

    fn check_ident(&mut self, name: &str, span: &SourceRange) -> Result<TypedAst, CompileError> {
        match self.lookup(name) {
            Some(ScopeEntry::Var { ty }) => Ok(TypedAst::new(
                ty.clone(),
                TypedNode::Ident(name.to_string()),
            )),
            Some(ScopeEntry::Func { uuid, ty }) => {
                Ok(TypedAst::new(ty.clone(), TypedNode::FnRef(*uuid)))
            }
            Some(ScopeEntry::StructType(_)) | Some(ScopeEntry::EnumType(_)) => Err(self.err(
                span,
                format!("Expected a value but '{}' is a type.", name),
            )),
            None => {
                if Builtin::by_source_name(name).is_some() || name == "free" {
                    return Err(self.err(
                        span,
                        format!("Builtin '{}' must be called directly.", name),
                    ));
                }
                Err(self.unresolved(span, name))
            }
        }
    }

    /// Resolve `A::B::…` left to right: the head must name an enum or a
    /// struct; the tail picks a variant or a static method.
    fn check_path(
        &mut self,
        segments: &[String],
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Err(CompileError::Internal("Empty path.".to_string())),
        };
        let [member] = rest else {
            return Err(self.err(
                span,
                "Nested module paths are not yet supported.",
            ));
        };

        match self.lookup(head) {
            Some(ScopeEntry::EnumType(uuid)) => {
                let uuid = *uuid;
                let enum_ty = self.enum_value_type(uuid)?;
                let defn = self
                    .interp
                    .types
                    .get_enum_by_uuid(uuid)
                    .ok_or_else(|| CompileError::Internal(format!("Missing enum #{}", uuid)))?;
                if let Some(variant) = defn.find_variant(member) {
                    if !variant.payload.is_empty() {
                        return Err(self.err(
                            span,
                            format!(
                                "Variant '{}::{}' carries a payload and must be called.",
                                head, member
                            ),
                        ));
                    }
                    let (tag, size) = (variant.tag, defn.size);
                    return Ok(TypedAst::new(
                        enum_ty,
                        TypedNode::EnumLit {
                            size,
                            tag,
                            payload: Vec::new(),
                        },
                    ));
                }
                match defn.find_method(member) {
                    Some(method) if method.is_static => self.fn_ref(method.uuid),
                    Some(_) => Err(self.err(
                        span,
                        format!("Method '{}::{}' is not static.", head, member),
                    )),
                    None => Err(self.err(
                        span,
                        format!("'{}' is not a variant or method of '{}'.", member, head),
                    )),
                }
            }
            Some(ScopeEntry::StructType(uuid)) => {
                let uuid = *uuid;
                let defn = self
                    .interp
                    .types
                    .get_struct_by_uuid(uuid)
                    .ok_or_else(|| CompileError::Internal(format!("Missing struct #{}", uuid)))?;
                match defn.find_method(member) {
                    Some(method) if method.is_static => self.fn_ref(method.uuid),
                    Some(_) => Err(self.err(
                        span,
                        format!("Method '{}::{}' is not static.", head, member),
                    )),
                    None => Err(self.err(
                        span,
                        format!("'{}' is not a method of '{}'.", member, head),
                    )),
                }
            }
            Some(_) => Err(self.err(
                span,
                format!("'{}' is not a module, struct or enum.", head),
            )),
            None => Err(self.unresolved(span, head)),
        }
    }

    pub(crate) fn fn_ref(&self, uuid: Uuid) -> Result<TypedAst, CompileError> {
        let defn = self
            .interp
            .functions
            .get_func_by_uuid(uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing function #{}", uuid)))?;
        Ok(TypedAst::new(defn.ty.clone(), TypedNode::FnRef(uuid)))
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        sub: &Expr,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let typed = self.check_expr(sub)?;
        match op {
            UnaryOp::Neg => {
                match (&typed.ty.kind, &typed.node) {
                    // Fold literal negation so constant analysis sees plain
                    // literals (negative subscripts, match values).
                    (TypeKind::Int, TypedNode::IntLit(v)) => {
                        Ok(TypedAst::new(ValueType::INT, TypedNode::IntLit(-v)))
                    }
                    (TypeKind::Float, TypedNode::FloatLit(v)) => {
                        Ok(TypedAst::new(ValueType::FLOAT, TypedNode::FloatLit(-v)))
                    }
                    (TypeKind::Int, _) | (TypeKind::Float, _) => {
                        let ty = typed.ty.clone().with_mut(false);
                        Ok(TypedAst::new(ty, TypedNode::Negation(Box::new(typed))))
                    }
                    _ => Err(self.err(
                        span,
                        format!(
                            "(-) requires operand to be an (int) or a (float) but was given ({}).",
                            typed.ty
                        ),
                    )),
                }
            }
            UnaryOp::Not => {
                if typed.ty.kind != TypeKind::Bool {
                    return Err(self.err(
                        span,
                        format!("(!) requires operand to be a (bool) but got a ({}).", typed.ty),
                    ));
                }
                Ok(TypedAst::new(
                    ValueType::BOOL,
                    TypedNode::Not(Box::new(typed)),
                ))
            }
            UnaryOp::AddrOf => {
                if typed.ty.size() == 0 {
                    return Err(self.err(
                        span,
                        "Cannot take a pointer to something that doesn't return a value.",
                    ));
                }
                let child = typed.ty.clone().with_mut(false);
                Ok(TypedAst::new(
                    ValueType::ptr_to(child),
                    TypedNode::AddressOf(Box::new(typed)),
                ))
            }
            UnaryOp::AddrOfMut => {
                if typed.ty.size() == 0 {
                    return Err(self.err(
                        span,
                        "Cannot take a pointer to something that doesn't return a value.",
                    ));
                }
                if !typed.ty.is_mut {
                    return Err(self.err(
                        span,
                        "Cannot take a mutable pointer to something that isn't itself mutable.",
                    ));
                }
                let child = typed.ty.clone();
                Ok(TypedAst::new(
                    ValueType::ptr_to(child),
                    TypedNode::AddressOfMut(Box::new(typed)),
                ))
            }
            UnaryOp::Deref => {
                let TypeKind::Ptr(child) = &typed.ty.kind else {
                    return Err(self.err(
                        span,
                        format!(
                            "Cannot dereference something of type ({}) because it is not a pointer type.",
                            typed.ty
                        ),
                    ));
                };
                if child.kind == TypeKind::Void {
                    return Err(self.err(span, "Cannot dereference a (*void) pointer."));
                }
                let result = (**child).clone();
                Ok(TypedAst::new(result, TypedNode::Deref(Box::new(typed))))
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let lhs = self.check_expr(lhs)?;
        let rhs = self.check_expr(rhs)?;

        let op_str = match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };

        // Validation first; the node is constructed once below.
        match op {
            BinaryOp::Add if lhs.ty.kind == TypeKind::Str && rhs.ty.kind == TypeKind::Str => {}
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                if !lhs.ty.eq_ignoring_mutability(&rhs.ty) {
                    return Err(self.err(
                        span,
                        format!("({}) requires both operands to be the same type.", op_str),
                    ));
                }
                if !matches!(lhs.ty.kind, TypeKind::Int | TypeKind::Float) {
                    return Err(self.err(
                        span,
                        format!(
                            "({}) requires operands to be either (int) or (float) but was given ({}).",
                            op_str, lhs.ty
                        ),
                    ));
                }
            }
            BinaryOp::Mod => {
                if lhs.ty.kind != TypeKind::Int || rhs.ty.kind != TypeKind::Int {
                    return Err(self.err(
                        span,
                        format!("(%) requires operands to be (int) but was given ({}).", lhs.ty),
                    ));
                }
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                if !lhs.ty.eq_ignoring_mutability(&rhs.ty) {
                    return Err(self.err(
                        span,
                        format!("({}) requires both operands to be the same type.", op_str),
                    ));
                }
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                if !lhs.ty.eq_ignoring_mutability(&rhs.ty) {
                    return Err(self.err(
                        span,
                        format!("({}) requires both operands to be the same type.", op_str),
                    ));
                }
                if !matches!(lhs.ty.kind, TypeKind::Int | TypeKind::Float) {
                    return Err(self.err(
                        span,
                        format!(
                            "({}) requires operands to be (int) or (float) but was given ({}).",
                            op_str, lhs.ty
                        ),
                    ));
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                for (side, operand) in [("first", &lhs), ("second", &rhs)] {
                    if operand.ty.kind != TypeKind::Bool {
                        return Err(self.err(
                            span,
                            format!(
                                "({}) requires {} operand to be (bool) but was given ({}).",
                                op_str, side, operand.ty
                            ),
                        ));
                    }
                }
            }
        }

        let ty = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                lhs.ty.clone().with_mut(false)
            }
            BinaryOp::Mod => ValueType::INT,
            _ => ValueType::BOOL,
        };

        let lhs = Box::new(lhs);
        let rhs = Box::new(rhs);
        let node = match op {
            BinaryOp::And => TypedNode::And { lhs, rhs },
            BinaryOp::Or => TypedNode::Or { lhs, rhs },
            _ => {
                let typed_op = match op {
                    BinaryOp::Add => TypedBinaryOp::Add,
                    BinaryOp::Sub => TypedBinaryOp::Sub,
                    BinaryOp::Mul => TypedBinaryOp::Mul,
                    BinaryOp::Div => TypedBinaryOp::Div,
                    BinaryOp::Mod => TypedBinaryOp::Mod,
                    BinaryOp::Eq => TypedBinaryOp::Equal,
                    BinaryOp::NotEq => TypedBinaryOp::NotEqual,
                    BinaryOp::Lt => TypedBinaryOp::Less,
                    BinaryOp::LtEq => TypedBinaryOp::LessEq,
                    BinaryOp::Gt => TypedBinaryOp::Greater,
                    BinaryOp::GtEq => TypedBinaryOp::GreaterEq,
                    BinaryOp::And | BinaryOp::Or => unreachable!(),
                };
                TypedNode::Binary {
                    op: typed_op,
                    lhs,
                    rhs,
                }
            }
        };

        Ok(TypedAst::new(ty, node))
    }

    fn check_range(
        &mut self,
        inclusive: bool,
        start: &Expr,
        end: &Expr,
    ) -> Result<TypedAst, CompileError> {
        let lhs = self.check_expr(start)?;
        let rhs = self.check_expr(end)?;
        for (typed, expr) in [(&lhs, start), (&rhs, end)] {
            if typed.ty.kind != TypeKind::Int {
                return Err(self.err(
                    &expr.span,
                    format!("Range bounds must be (int) but was given ({}).", typed.ty),
                ));
            }
        }
        Ok(TypedAst::new(
            ValueType::range_of(inclusive, ValueType::INT),
            TypedNode::Range {
                inclusive,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }

    fn check_subscript(
        &mut self,
        object: &Expr,
        index: &Expr,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let lhs = self.check_expr(object)?;
        let rhs = self.check_expr(index)?;

        let (elem, is_slice) = match &lhs.ty.kind {
            TypeKind::Array { elem, .. } => ((**elem).clone(), false),
            TypeKind::Slice(elem) => ((**elem).clone(), true),
            _ => {
                return Err(self.err(
                    span,
                    format!(
                        "([]) requires first operand to be an array or slice but was given ({}).",
                        lhs.ty
                    ),
                ));
            }
        };

        if matches!(rhs.ty.kind, TypeKind::Range { .. }) {
            return Err(self.err(
                span,
                "Range-indexed subscripts are not yet supported.",
            ));
        }
        if rhs.ty.kind != TypeKind::Int {
            return Err(self.err(
                span,
                format!(
                    "([]) requires second operand to be (int) but was given ({}).",
                    rhs.ty
                ),
            ));
        }

        let result_mut = lhs.ty.is_mut || elem.is_mut;
        let result_ty = elem.with_mut(result_mut);

        if let TypedNode::IntLit(v) = rhs.node {
            if v < 0 {
                if !is_slice {
                    return Err(self.err(
                        span,
                        format!("Array index {} is out of bounds.", v),
                    ));
                }
                return Ok(TypedAst::new(
                    result_ty,
                    TypedNode::NegativeSubscript {
                        lhs: Box::new(lhs),
                        index: -v,
                    },
                ));
            }
        }

        Ok(TypedAst::new(
            result_ty,
            TypedNode::Subscript {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }

    fn check_field_access(
        &mut self,
        object: &Expr,
        field: &str,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let instance = self.check_expr(object)?;

        let (target_ty, deref) = match &instance.ty.kind {
            TypeKind::Ptr(child) => ((**child).clone(), true),
            _ => (instance.ty.clone(), false),
        };

        let TypeKind::Struct(handle) = &target_ty.kind else {
            return Err(self.err(
                span,
                format!(
                    "(.) requires first operand to be a struct but was given ({}).",
                    instance.ty
                ),
            ));
        };

        let defn = self
            .interp
            .types
            .get_struct_by_uuid(handle.uuid)
            .ok_or_else(|| CompileError::Internal(format!("Missing struct #{}", handle.uuid)))?;
        let Some(field_defn) = defn.find_field(field) else {
            return Err(self.err(
                span,
                format!("'{}' is not a field of '{}'.", field, defn.name),
            ));
        };

        let result_mut = field_defn.ty.is_mut || target_ty.is_mut;
        let result_ty = field_defn.ty.clone().with_mut(result_mut);
        let offset = field_defn.offset;

        Ok(TypedAst::new(
            result_ty,
            TypedNode::FieldAccess {
                deref,
                instance: Box::new(instance),
                offset,
            },
        ))
    }

    fn check_tuple_field(
        &mut self,
        object: &Expr,
        index: i64,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let instance = self.check_expr(object)?;

        let (target_ty, deref) = match &instance.ty.kind {
            TypeKind::Ptr(child) => ((**child).clone(), true),
            _ => (instance.ty.clone(), false),
        };

        let TypeKind::Tuple(tup) = &target_ty.kind else {
            return Err(self.err(
                span,
                format!(
                    "(.) requires first operand to be a tuple but was given ({}).",
                    instance.ty
                ),
            ));
        };

        if index < 0 || index as usize >= tup.len() {
            return Err(self.err(
                span,
                format!("Cannot access element {} of a ({}).", index, instance.ty),
            ));
        }
        let index = index as usize;
        let elem = tup.elems()[index].clone();
        let offset = tup
            .offset_of_type(index)
            .ok_or_else(|| CompileError::Internal("Tuple offset out of range.".to_string()))?;

        let result_mut = elem.is_mut || target_ty.is_mut;
        Ok(TypedAst::new(
            elem.with_mut(result_mut),
            TypedNode::TupleAccess {
                deref,
                instance: Box::new(instance),
                index,
                offset,
            },
        ))
    }

    fn check_if(
        &mut self,
        cond: &Expr,
        then: &Block,
        else_: Option<&Expr>,
    ) -> Result<TypedAst, CompileError> {
        let typed_cond = self.check_expr(cond)?;
        if typed_cond.ty.kind != TypeKind::Bool {
            return Err(self.err(
                &cond.span,
                format!(
                    "(if) requires condition to be (bool) but was given ({}).",
                    typed_cond.ty
                ),
            ));
        }

        let typed_then = self.check_block(then)?;
        let typed_else = else_.map(|e| self.check_expr(e)).transpose()?;

        if let Some(e) = &typed_else {
            if !typed_then.ty.eq_ignoring_mutability(&e.ty) {
                return Err(self.err(
                    &cond.span,
                    format!(
                        "Both branches of (if) must be the same. ({}) vs ({}).",
                        typed_then.ty, e.ty
                    ),
                ));
            }
        }

        let ty = if typed_else.is_some() {
            typed_then.ty.clone()
        } else {
            ValueType::NONE
        };
        Ok(TypedAst::new(
            ty,
            TypedNode::If {
                cond: Box::new(typed_cond),
                then: Box::new(typed_then),
                else_: typed_else.map(Box::new),
            },
        ))
    }

    fn check_cast(
        &mut self,
        sub: &Expr,
        target: &TypeSig,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let typed = self.check_expr(sub)?;
        let target_ty = self.resolve_type_sig(target, span)?;

        let kind = match (&typed.ty.kind, &target_ty.kind) {
            (TypeKind::Bool, TypeKind::Int) => CastKind::BoolToInt,
            (TypeKind::Char, TypeKind::Int) => CastKind::CharToInt,
            (TypeKind::Int, TypeKind::Float) => CastKind::IntToFloat,
            (TypeKind::Float, TypeKind::Int) => CastKind::FloatToInt,
            _ => {
                return Err(self.err(
                    span,
                    format!("Cannot cast ({}) to ({}).", typed.ty, target_ty),
                ));
            }
        };

        Ok(TypedAst::new(
            target_ty,
            TypedNode::Cast {
                kind,
                sub: Box::new(typed),
            },
        ))
    }
}

/// Place expressions: the only legal assignment targets and borrow
/// sources.
pub(crate) fn is_place(node: &TypedNode) -> bool {
    matches!(
        node,
        TypedNode::Ident(_)
            | TypedNode::Subscript { .. }
            | TypedNode::NegativeSubscript { .. }
            | TypedNode::FieldAccess { .. }
            | TypedNode::TupleAccess { .. }
            | TypedNode::Deref(_)
    )
}
