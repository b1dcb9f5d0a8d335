use fox_compiler::bytecode::{self, Opcode};
use fox_compiler::{CompileError, FunctionDefinition, Interpreter};

fn compile(source: &str) -> (Interpreter, FunctionDefinition) {
    let mut interp = Interpreter::new();
    let root = interp
        .compile_source("test.fox", source)
        .expect("compilation failed");
    (interp, root)
}

fn compile_err(source: &str) -> CompileError {
    let mut interp = Interpreter::new();
    match interp.compile_source("test.fox", source) {
        Ok(_) => panic!("expected compilation to fail"),
        Err(e) => e,
    }
}

/// Every jump offset, applied to its site, must land on the first byte of
/// a valid instruction.
fn assert_jumps_land_on_instructions(code: &[u8]) {
    let starts = bytecode::instruction_starts(code).expect("undecodable bytecode");
    let mut i = 0usize;
    while i < code.len() {
        let op = Opcode::from_u8(code[i]).expect("bad opcode");
        let operand_at = i + 1;
        match op {
            Opcode::Jump
            | Opcode::JumpTrue
            | Opcode::JumpFalse
            | Opcode::JumpTrueNoPop
            | Opcode::JumpFalseNoPop => {
                let off = u64::from_le_bytes(code[operand_at..operand_at + 8].try_into().unwrap())
                    as usize;
                let target = operand_at + 8 + off;
                assert!(
                    target == code.len() || starts.contains(&target),
                    "jump at {:#x} lands inside an instruction ({:#x})",
                    i,
                    target
                );
            }
            Opcode::Loop => {
                let off = u64::from_le_bytes(code[operand_at..operand_at + 8].try_into().unwrap())
                    as usize;
                let target = operand_at + 8 - off;
                assert!(
                    starts.contains(&target),
                    "loop at {:#x} lands inside an instruction ({:#x})",
                    i,
                    target
                );
            }
            _ => {}
        }
        i = operand_at + op.operand_width();
    }
}

fn assert_all_functions_decodable(interp: &Interpreter, root: &FunctionDefinition) {
    assert_jumps_land_on_instructions(&root.code);
    for func in interp.functions.iter() {
        assert_jumps_land_on_instructions(&func.code);
    }
}

#[test]
fn test_arithmetic_program_compiles() {
    let (interp, root) = compile("let x = 1 + 2; print x;");
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_control_flow_jumps_land() {
    let (interp, root) = compile(
        "let mut i = 0; \
         while i < 10 { \
             if i % 2 == 0 and i != 4 { print i; } else { puts i; } \
             i += 1; \
         } \
         for j in 0...3 { print j; } \
         let xs = [3]int { 10, 20, 30 }; \
         for x, k in xs { print x; }",
    );
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_functions_and_calls() {
    let (interp, root) = compile(
        "fn add(a: int, b: int) -> int { return a + b; } \
         fn shout() { print 1; } \
         print add(2, 40); \
         shout();",
    );
    assert_all_functions_decodable(&interp, &root);
    // add and shout both got bytecode
    let with_code = interp.functions.iter().filter(|f| !f.code.is_empty()).count();
    assert_eq!(with_code, 2);
}

#[test]
fn test_struct_enum_match_compiles() {
    let (interp, root) = compile(
        "struct P { x: int, y: int } \
         enum E { A, B(int) } \
         let p = P { x: 3, y: 4 }; \
         print p.y; \
         let e = E::B(7); \
         match e { E::A => print 0, E::B(n) => print n }",
    );
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_methods_compile() {
    let (interp, root) = compile(
        "struct P { x: int, y: int } \
         impl P { \
             fn sum(self: *P) -> int { return self.x + self.y; } \
             fn origin() -> int { return 0; } \
         } \
         let p = P { x: 1, y: 2 }; \
         print p.sum(); \
         print P::origin();",
    );
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_constant_pool_dedup_across_consts() {
    let (interp, _) = compile("const A = 42; const B = 42; print A; print B;");
    // one aligned 8-byte entry for both constants
    assert_eq!(interp.constants.len(), 8);
}

#[test]
fn test_string_constants_are_length_prefixed() {
    let (interp, _) = compile("let s = \"hello\"; print s;");
    assert_eq!(
        u64::from_le_bytes(interp.str_constants[0..8].try_into().unwrap()),
        5
    );
    assert_eq!(&interp.str_constants[8..13], b"hello");
}

#[test]
fn test_repeated_string_literal_shares_offset() {
    let (interp, _) = compile("let a = \"hi\"; let b = \"hi\"; print a; print b;");
    // "hi" appears once: 8-byte length + 2 bytes
    assert_eq!(interp.str_constants.len(), 10);
}

#[test]
fn test_unresolved_identifier_fails() {
    let err = compile_err("print y;");
    assert!(err.to_string().contains("Unresolved identifier"));
}

#[test]
fn test_assignment_to_immutable_fails() {
    let err = compile_err("let x = 1; x = 2;");
    assert!(err.to_string().contains("immutable"));
}

#[test]
fn test_uninitialized_let_requires_mut() {
    let err = compile_err("let x: int;");
    assert!(err.to_string().contains("mut"));
    let (interp, root) = compile("let mut x: int; x = 3; print x;");
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_empty_array_literal_needs_type() {
    let err = compile_err("let xs = []{};");
    assert!(err.to_string().contains("infer"));
    let (interp, root) = compile("let xs = []int {}; let n = 0; print n;");
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_tuple_index_out_of_range_fails() {
    let err = compile_err("let t = (1, 2); print t.5;");
    assert!(err.to_string().contains("element 5"));
}

#[test]
fn test_missing_struct_field_fails() {
    let err = compile_err("struct P { x: int, y: int } let p = P { x: 1 };");
    assert!(err.to_string().contains("Missing fields"));
}

#[test]
fn test_type_mismatch_in_binary_op() {
    let err = compile_err("let x = 1 + 2.0;");
    assert!(err.to_string().contains("same type"));
}

#[test]
fn test_mutable_borrow_of_immutable_fails() {
    let err = compile_err("let x = 1; let p = &mut x;");
    assert!(err.to_string().contains("mutable pointer"));
}

#[test]
fn test_deferred_features_are_rejected() {
    assert!(compile_err("trait Shape { fn area(self: *Self) -> float; }")
        .to_string()
        .contains("not yet supported"));
    assert!(compile_err("import std::io;")
        .to_string()
        .contains("not yet supported"));
    assert!(compile_err("fn id<T>(x: int) -> int { return x; }")
        .to_string()
        .contains("not yet supported"));
    assert!(compile_err("let xs = [3]int { 1, 2, 3 }; let s = xs[0..2];")
        .to_string()
        .contains("not yet supported"));
}

#[test]
fn test_non_void_function_must_return() {
    let err = compile_err("fn f() -> int { let x = 1; }");
    assert!(err.to_string().contains("must return"));
}

#[test]
fn test_match_arm_type_mismatch() {
    let err = compile_err("let x = 1; let y = match x { 1 => 2, _ => 3.0 };");
    assert!(err.to_string().contains("disagree"));
}

#[test]
fn test_pointer_compiles() {
    let (interp, root) = compile(
        "let mut x = 1; \
         let p = &mut x; \
         *p = 5; \
         print x;",
    );
    assert_all_functions_decodable(&interp, &root);
}

#[test]
fn test_division_by_zero_constant_rejected() {
    let err = compile_err("const X = 1 / 0;");
    assert!(err.to_string().contains("Division by zero"));
}
