use fox_ast::*;
use fox_parser::Parser;

fn parse(source: &str) -> Program {
    let mut parser = Parser::new(source).expect("lexing failed");
    parser.parse_program().expect("parsing failed")
}

#[test]
fn test_let_and_print() {
    let program = parse("let x = 1 + 2; print x;");
    assert_eq!(program.stmts.len(), 2);
    assert!(matches!(program.stmts[0].kind, StmtKind::Let { .. }));
    assert!(matches!(
        program.stmts[1].kind,
        StmtKind::Print { newline: true, .. }
    ));
}

#[test]
fn test_function_declaration() {
    let program = parse("fn add(a: int, b: int) -> int { return a + b; }");
    match &program.stmts[0].kind {
        StmtKind::Fn(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params.len(), 2);
            assert!(!decl.varargs);
            assert_eq!(decl.ret, Some(TypeSig::Named("int".to_string())));
        }
        other => panic!("expected fn declaration, got {:?}", other),
    }
}

#[test]
fn test_varargs_marker() {
    let program = parse("fn log(level: int, ...) { }");
    match &program.stmts[0].kind {
        StmtKind::Fn(decl) => {
            assert!(decl.varargs);
            assert_eq!(decl.params.len(), 1);
        }
        other => panic!("expected fn declaration, got {:?}", other),
    }
}

#[test]
fn test_struct_decl_and_literal() {
    let program = parse("struct P { x: int, y: int } let p = P { x: 3, y: 4 }; print p.y;");
    assert!(matches!(program.stmts[0].kind, StmtKind::StructDecl(_)));
    match &program.stmts[1].kind {
        StmtKind::Let {
            init: Some(init), ..
        } => {
            assert!(matches!(init.kind, ExprKind::StructLit { .. }));
        }
        other => panic!("expected let with struct literal, got {:?}", other),
    }
}

#[test]
fn test_if_condition_is_not_struct_literal() {
    let program = parse("if x { print 1; } else { print 2; }");
    match &program.stmts[0].kind {
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::If { cond, else_, .. } => {
                assert!(matches!(cond.kind, ExprKind::Ident(_)));
                assert!(else_.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_enum_and_match() {
    let program = parse(
        "enum E { A, B(int) } \
         let e = E::B(7); \
         match e { E::A => print 0, E::B(n) => print n }",
    );
    assert!(matches!(program.stmts[0].kind, StmtKind::EnumDecl(_)));
    match &program.stmts[2].kind {
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::Match { arms, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(matches!(
                    arms[1].pattern.kind,
                    PatternKind::Enum { .. }
                ));
            }
            other => panic!("expected match, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_for_range_and_array() {
    let program = parse(
        "for i in 0..3 { print i; } \
         let xs = [3]int { 10, 20, 30 }; \
         for x, i in xs { print x; }",
    );
    assert!(matches!(program.stmts[0].kind, StmtKind::For { .. }));
    match &program.stmts[2].kind {
        StmtKind::For { counter, .. } => assert_eq!(counter.as_deref(), Some("i")),
        other => panic!("expected for loop, got {:?}", other),
    }
}

#[test]
fn test_compound_assignment_desugars() {
    let program = parse("x += 1;");
    match &program.stmts[0].kind {
        StmtKind::Assign { value, .. } => {
            assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            ));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_pointer_types_and_deref() {
    let program = parse("let p: *mut int = &mut x; *p = 5;");
    match &program.stmts[0].kind {
        StmtKind::Let { ty: Some(ty), .. } => {
            assert_eq!(
                *ty,
                TypeSig::Ptr {
                    is_mut: true,
                    inner: Box::new(TypeSig::Named("int".to_string())),
                }
            );
        }
        other => panic!("expected let with pointer type, got {:?}", other),
    }
    assert!(matches!(program.stmts[1].kind, StmtKind::Assign { .. }));
}

#[test]
fn test_impl_block() {
    let program = parse(
        "impl P { fn magnitude(self: *P) -> int { return 0; } fn origin() -> int { return 0; } }",
    );
    match &program.stmts[0].kind {
        StmtKind::Impl(block) => {
            assert_eq!(block.target, "P");
            assert!(block.trait_name.is_none());
            assert_eq!(block.fns.len(), 2);
        }
        other => panic!("expected impl block, got {:?}", other),
    }
}

#[test]
fn test_tuple_pattern_let() {
    let program = parse("let (a, _, mut c) = t;");
    match &program.stmts[0].kind {
        StmtKind::Let { pattern, .. } => match &pattern.kind {
            PatternKind::Tuple(subs) => {
                assert_eq!(subs.len(), 3);
                assert!(matches!(subs[1].kind, PatternKind::Underscore));
                assert!(matches!(
                    subs[2].kind,
                    PatternKind::Ident { is_mut: true, .. }
                ));
            }
            other => panic!("expected tuple pattern, got {:?}", other),
        },
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn test_slice_literal_and_negative_subscript() {
    let program = parse("let s = [..]int { 1, 2 }; print s[-1];");
    match &program.stmts[0].kind {
        StmtKind::Let {
            init: Some(init), ..
        } => {
            assert!(matches!(
                init.kind,
                ExprKind::ArrayLit { is_slice: true, .. }
            ));
        }
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn test_uninitialized_let_noinit() {
    let program = parse("let mut x: int = noinit;");
    match &program.stmts[0].kind {
        StmtKind::Let { init, ty, .. } => {
            assert!(init.is_none());
            assert!(ty.is_some());
        }
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn test_trait_body_is_skipped() {
    let program = parse("trait Shape { fn area(self: *Self) -> float; } let x = 1;");
    assert!(matches!(program.stmts[0].kind, StmtKind::TraitDecl(_)));
    assert!(matches!(program.stmts[1].kind, StmtKind::Let { .. }));
}

#[test]
fn test_missing_semicolon_is_an_error() {
    let mut parser = Parser::new("let x = 1").expect("lexing failed");
    assert!(parser.parse_program().is_err());
}
