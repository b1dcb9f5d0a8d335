//! Declaration type checking: functions, structs, enums and inherent impl
//! blocks. Definitions are registered before bodies are checked so
//! recursive and mutually recursive methods resolve.

use std::collections::HashMap;

use fox_ast::{FnDecl, ImplBlock, StructDecl};

use super::{Scope, ScopeEntry, TypedAst, Typer};
use crate::definitions::{
    EnumDefinition, EnumPayloadField, EnumVariant, FunctionDefinition, Method, StructDefinition,
    StructField,
};
use crate::error::{CompileError, SourceRange};
use crate::typer::typed_ast::TypedNode;
use crate::value::{self, TypeKind, Uuid, ValueType, WORD_SIZE};

/// Per-function header data shared between the registration pass and the
/// body pass.
struct FnHeader {
    uuid: Uuid,
    params: Vec<(String, ValueType)>,
    ret: ValueType,
    varargs: bool,
}

impl<'a> Typer<'a> {
    pub(crate) fn check_fn_decl(
        &mut self,
        decl: &FnDecl,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let header = self.register_fn_header(decl, span)?;
        self.bind(
            &decl.name,
            ScopeEntry::Func {
                uuid: header.uuid,
                ty: self.fn_ref(header.uuid)?.ty,
            },
        );
        self.check_fn_body(decl, span, header)
    }

    fn register_fn_header(
        &mut self,
        decl: &FnDecl,
        span: &SourceRange,
    ) -> Result<FnHeader, CompileError> {
        if !decl.type_params.is_empty() {
            return Err(self.err(
                span,
                format!(
                    "Generic function '{}' cannot be declared: generics are not yet supported.",
                    decl.name
                ),
            ));
        }

        let mut params = Vec::new();
        for param in &decl.params {
            let ty = self.resolve_type_sig(&param.ty, span)?;
            params.push((param.name.clone(), ty));
        }
        let ret = decl
            .ret
            .as_ref()
            .map(|sig| self.resolve_type_sig(sig, span))
            .transpose()?
            .unwrap_or(ValueType::VOID);

        let fn_ty = ValueType::func(
            params.iter().map(|(_, t)| t.clone()).collect(),
            ret.clone(),
            decl.varargs,
        );

        let uuid = self.interp.next_uuid();
        self.interp.functions.add_func(FunctionDefinition {
            varargs: decl.varargs,
            uuid,
            module: self.module,
            name: decl.name.clone(),
            ty: fn_ty,
            param_names: params.iter().map(|(n, _)| n.clone()).collect(),
            code: Vec::new(),
        })?;
        if let Some(module) = self.interp.modules.get_module_mut(self.module) {
            module.funcs.insert(uuid);
        }

        Ok(FnHeader {
            uuid,
            params,
            ret,
            varargs: decl.varargs,
        })
    }

    fn check_fn_body(
        &mut self,
        decl: &FnDecl,
        span: &SourceRange,
        header: FnHeader,
    ) -> Result<TypedAst, CompileError> {
        // Function bodies see the global scope and their own locals only;
        // there is no closure capture of enclosing locals.
        let global = self.scopes.first().cloned().unwrap_or_default();
        let saved_scopes = std::mem::replace(&mut self.scopes, vec![global, Scope::new()]);
        self.fn_rets.push(header.ret.clone());

        let result = self.check_fn_body_inner(decl, span, &header);

        self.fn_rets.pop();
        self.scopes = saved_scopes;

        result.map(|body| {
            TypedAst::stmt(TypedNode::FnDecl {
                uuid: header.uuid,
                body,
            })
        })
    }

    fn check_fn_body_inner(
        &mut self,
        decl: &FnDecl,
        span: &SourceRange,
        header: &FnHeader,
    ) -> Result<Vec<TypedAst>, CompileError> {
        for (name, ty) in &header.params {
            self.bind(name, ScopeEntry::Var { ty: ty.clone() });
        }
        if header.varargs {
            // The synthetic trailing int: total bytes of extra argument
            // data, stored just below the frame base by the caller.
            self.bind(
                "vararg_size",
                ScopeEntry::Var {
                    ty: ValueType::INT,
                },
            );
        }

        let body = decl
            .body
            .stmts
            .iter()
            .map(|s| self.check_stmt(s))
            .collect::<Result<Vec<_>, _>>()?;

        if header.ret.kind != TypeKind::Void && !block_always_returns(&body) {
            return Err(self.err(
                span,
                format!(
                    "Function '{}' must return a ({}) on every path.",
                    decl.name, header.ret
                ),
            ));
        }

        Ok(body)
    }

    pub(crate) fn check_struct_decl(
        &mut self,
        decl: &StructDecl,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        if !decl.type_params.is_empty() {
            return Err(self.err(
                span,
                format!(
                    "Generic struct '{}' cannot be declared: generics are not yet supported.",
                    decl.name
                ),
            ));
        }

        let mut field_tys = Vec::new();
        for (_, sig) in &decl.fields {
            field_tys.push(self.resolve_type_sig(sig, span)?);
        }
        let (offsets, size) = value::layout_fields(field_tys.iter());

        let fields = decl
            .fields
            .iter()
            .zip(field_tys)
            .zip(offsets)
            .map(|(((name, _), ty), offset)| StructField {
                offset,
                name: name.clone(),
                ty,
            })
            .collect();

        let uuid = self.interp.next_uuid();
        self.interp.types.add_struct(StructDefinition {
            size,
            uuid,
            module: self.module,
            name: decl.name.clone(),
            fields,
            methods: HashMap::new(),
        })?;
        if let Some(module) = self.interp.modules.get_module_mut(self.module) {
            module.structs.insert(uuid);
        }
        self.bind(&decl.name, ScopeEntry::StructType(uuid));

        Ok(TypedAst::stmt(TypedNode::NoOp))
    }

    pub(crate) fn check_enum_decl(
        &mut self,
        decl: &fox_ast::EnumDecl,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        let mut variants = Vec::new();
        let mut max_extent: u32 = WORD_SIZE;
        let mut is_sumtype = false;

        for (tag, variant) in decl.variants.iter().enumerate() {
            let payload_tys = variant
                .payload
                .iter()
                .map(|sig| self.resolve_type_sig(sig, span))
                .collect::<Result<Vec<_>, _>>()?;
            let (rel_offsets, payload_size) = value::layout_fields(payload_tys.iter());

            if !payload_tys.is_empty() {
                is_sumtype = true;
            }
            // The tag occupies the first word; payload fields follow it.
            let payload = payload_tys
                .into_iter()
                .zip(rel_offsets)
                .map(|(ty, off)| EnumPayloadField {
                    offset: WORD_SIZE + off,
                    ty,
                })
                .collect();
            max_extent = max_extent.max(WORD_SIZE + payload_size);

            variants.push(EnumVariant {
                tag: tag as i64,
                name: variant.name.clone(),
                payload,
            });
        }

        let size = value::align_up(max_extent, WORD_SIZE);
        let uuid = self.interp.next_uuid();
        self.interp.types.add_enum(EnumDefinition {
            is_sumtype,
            size,
            uuid,
            module: self.module,
            name: decl.name.clone(),
            variants,
            methods: HashMap::new(),
        })?;
        if let Some(module) = self.interp.modules.get_module_mut(self.module) {
            module.enums.insert(uuid);
        }
        self.bind(&decl.name, ScopeEntry::EnumType(uuid));

        Ok(TypedAst::stmt(TypedNode::NoOp))
    }

    pub(crate) fn check_impl(
        &mut self,
        block: &ImplBlock,
        span: &SourceRange,
    ) -> Result<TypedAst, CompileError> {
        if let Some(trait_name) = &block.trait_name {
            return Err(self.err(
                span,
                format!(
                    "Cannot implement trait '{}': traits are not yet supported.",
                    trait_name
                ),
            ));
        }

        enum Target {
            Struct(Uuid),
            Enum(Uuid),
        }
        let target = match self.lookup(&block.target) {
            Some(ScopeEntry::StructType(uuid)) => Target::Struct(*uuid),
            Some(ScopeEntry::EnumType(uuid)) => Target::Enum(*uuid),
            Some(_) => {
                return Err(self.err(
                    span,
                    format!("'{}' is not a struct or enum.", block.target),
                ));
            }
            None => return Err(self.unresolved(span, &block.target)),
        };
        let self_ty = match &target {
            Target::Struct(uuid) => self.struct_value_type(*uuid)?,
            Target::Enum(uuid) => self.enum_value_type(*uuid)?,
        };

        let saved_self = self.self_type.replace(self_ty);

        // First pass: register every header and method entry so methods can
        // call each other regardless of order.
        let result = (|| {
            let mut headers = Vec::new();
            for decl in &block.fns {
                let header = self.register_fn_header(decl, span)?;
                let is_static = decl
                    .params
                    .first()
                    .map_or(true, |p| p.name != "self");
                if !is_static {
                    let Some((_, first_ty)) = header.params.first() else {
                        return Err(CompileError::Internal(
                            "Missing self parameter.".to_string(),
                        ));
                    };
                    if !matches!(first_ty.kind, TypeKind::Ptr(_)) {
                        return Err(self.err(
                            span,
                            format!(
                                "Method '{}' must take 'self' by pointer (*Self or *mut Self).",
                                decl.name
                            ),
                        ));
                    }
                }

                let method = Method {
                    is_static,
                    uuid: header.uuid,
                };
                let replaced = match &target {
                    Target::Struct(uuid) => self
                        .interp
                        .types
                        .get_struct_mut(*uuid)
                        .and_then(|d| d.methods.insert(decl.name.clone(), method)),
                    Target::Enum(uuid) => self
                        .interp
                        .types
                        .get_enum_mut(*uuid)
                        .and_then(|d| d.methods.insert(decl.name.clone(), method)),
                };
                if replaced.is_some() {
                    return Err(self.err(
                        span,
                        format!(
                            "Method '{}' is defined more than once on '{}'.",
                            decl.name, block.target
                        ),
                    ));
                }
                headers.push(header);
            }

            // Second pass: bodies.
            let mut decls = Vec::new();
            for (decl, header) in block.fns.iter().zip(headers) {
                decls.push(self.check_fn_body(decl, span, header)?);
            }
            Ok(TypedAst::stmt(TypedNode::Decls(decls)))
        })();

        self.self_type = saved_self;
        result
    }
}

/// True when every control path through the body ends in a return.
fn block_always_returns(nodes: &[TypedAst]) -> bool {
    nodes.last().map_or(false, always_returns)
}

fn always_returns(node: &TypedAst) -> bool {
    match &node.node {
        TypedNode::Return(_) => true,
        TypedNode::Block(nodes) => block_always_returns(nodes),
        TypedNode::If { then, else_, .. } => match else_ {
            Some(else_) => always_returns(then) && always_returns(else_),
            None => false,
        },
        TypedNode::Match { arms, default, .. } => {
            default.as_deref().map_or(false, always_returns)
                && arms.iter().all(|arm| always_returns(&arm.body))
        }
        _ => false,
    }
}
