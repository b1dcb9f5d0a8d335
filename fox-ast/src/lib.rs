use serde::{Deserialize, Serialize};

/// Byte range into the original source text.
pub type SourceRange = std::ops::Range<usize>;

/// Root of the Abstract Syntax Tree: a Fox source file is a flat
/// sequence of statements and declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// Block of statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// Surface type signatures, resolved to value types during type checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSig {
    /// Named type: int, bool, a struct name, Self inside impl blocks
    Named(String),
    /// Path type: A::B
    Path(Vec<String>),
    /// Pointer: *T or *mut T
    Ptr { is_mut: bool, inner: Box<TypeSig> },
    /// Fixed-size array: [3]int
    Array { count: u64, elem: Box<TypeSig> },
    /// Slice: [..]int
    Slice { elem: Box<TypeSig> },
    /// Tuple: (int, bool)
    Tuple(Vec<TypeSig>),
    /// Function: (int, bool) -> void
    Fn {
        params: Vec<TypeSig>,
        ret: Box<TypeSig>,
    },
}

/// Destructuring pattern used by `let`, `for` and `match`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    #[serde(skip)]
    pub span: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternKind {
    /// _
    Underscore,
    /// x or mut x
    Ident { is_mut: bool, name: String },
    /// (a, b, _)
    Tuple(Vec<Pattern>),
    /// P { x, y: b, .. }
    Struct {
        name: Vec<String>,
        fields: Vec<(String, Pattern)>,
        has_rest: bool,
    },
    /// E::A or E::B(n)
    Enum { path: Vec<String>, args: Vec<Pattern> },
    /// A constant expression, only legal in match arms
    Value(Expr),
}

impl Pattern {
    /// True when every binding introduced by the pattern is `mut`.
    pub fn all_bindings_mut(&self) -> bool {
        match &self.kind {
            PatternKind::Underscore | PatternKind::Value(_) => true,
            PatternKind::Ident { is_mut, .. } => *is_mut,
            PatternKind::Tuple(subs) | PatternKind::Enum { args: subs, .. } => {
                subs.iter().all(Pattern::all_bindings_mut)
            }
            PatternKind::Struct { fields, .. } => {
                fields.iter().all(|(_, p)| p.all_bindings_mut())
            }
        }
    }

    /// True when no binding introduced by the pattern is `mut`.
    pub fn no_bindings_mut(&self) -> bool {
        match &self.kind {
            PatternKind::Underscore | PatternKind::Value(_) => true,
            PatternKind::Ident { is_mut, .. } => !*is_mut,
            PatternKind::Tuple(subs) | PatternKind::Enum { args: subs, .. } => {
                subs.iter().all(Pattern::no_bindings_mut)
            }
            PatternKind::Struct { fields, .. } => {
                fields.iter().all(|(_, p)| p.no_bindings_mut())
            }
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(skip)]
    pub span: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    CharLiteral(char),
    StrLiteral(String),
    /// Placeholder initializer for uninitialized `let`
    Noinit,

    Ident(String),
    /// A::B::C
    Path(Vec<String>),

    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// a..b (exclusive) or a...b (inclusive)
    Range {
        inclusive: bool,
        start: Box<Expr>,
        end: Box<Expr>,
    },
    /// a[i]
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// x.field
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    /// t.0
    TupleField {
        object: Box<Expr>,
        index: i64,
    },
    /// f(a, b)
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// recv.method(a, b)
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// [3]int { 10, 20, 30 } / []int { .. } / [..]int { .. }
    ArrayLit {
        count: Option<u64>,
        elem: Option<TypeSig>,
        is_slice: bool,
        elems: Vec<Expr>,
    },
    /// (1, true)
    TupleLit(Vec<Expr>),
    /// P { x: 3, y: 4 }
    StructLit {
        name: Vec<String>,
        fields: Vec<(String, Expr)>,
    },
    If {
        cond: Box<Expr>,
        then: Block,
        else_: Option<Box<Expr>>,
    },
    Match {
        cond: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    /// expr as Type
    Cast {
        expr: Box<Expr>,
        target: TypeSig,
    },
    Block(Block),
}

/// Match arm: pattern => body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
}

/// Statements and declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(skip)]
    pub span: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    /// let / let mut / const declaration
    Let {
        is_const: bool,
        pattern: Pattern,
        ty: Option<TypeSig>,
        init: Option<Expr>,
    },
    /// target = value (compound assignments are desugared to this)
    Assign {
        target: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
    While {
        cond: Expr,
        body: Block,
    },
    /// for target in iterable / for target, counter in iterable
    For {
        pattern: Pattern,
        counter: Option<String>,
        iterable: Expr,
        body: Block,
    },
    /// print expr; / puts expr;
    Print {
        newline: bool,
        arg: Expr,
    },
    Defer(Box<Stmt>),
    Fn(FnDecl),
    StructDecl(StructDecl),
    EnumDecl(EnumDecl),
    Impl(ImplBlock),
    TraitDecl(TraitDecl),
    Import {
        path: Vec<String>,
        alias: Option<String>,
    },
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: String,
    /// Generic type parameters (parsed; instantiation is not implemented)
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    /// Trailing `...` marker
    pub varargs: bool,
    pub ret: Option<TypeSig>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeSig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<(String, TypeSig)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub payload: Vec<TypeSig>,
}

/// impl Type { fns } or impl Trait for Type { fns }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplBlock {
    pub target: String,
    pub trait_name: Option<String>,
    pub fns: Vec<FnDecl>,
}

/// Trait declaration: parsed but rejected during type checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDecl {
    pub name: String,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,        // -
    Not,        // !
    AddrOf,     // &
    AddrOfMut,  // &mut
    Deref,      // *
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(kind: ExprKind) -> Expr {
        Expr { kind, span: 0..0 }
    }

    #[test]
    fn test_pattern_mutability() {
        let all_mut = Pattern {
            kind: PatternKind::Tuple(vec![
                Pattern {
                    kind: PatternKind::Ident {
                        is_mut: true,
                        name: "a".to_string(),
                    },
                    span: 0..0,
                },
                Pattern {
                    kind: PatternKind::Underscore,
                    span: 0..0,
                },
            ]),
            span: 0..0,
        };
        assert!(all_mut.all_bindings_mut());
        assert!(!all_mut.no_bindings_mut());
    }

    #[test]
    fn test_serialization() {
        let program = Program {
            stmts: vec![Stmt {
                kind: StmtKind::Print {
                    newline: true,
                    arg: expr(ExprKind::IntLiteral(3)),
                },
                span: 0..0,
            }],
        };

        let json = serde_json::to_string(&program).unwrap();
        let deserialized: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, deserialized);
    }
}
