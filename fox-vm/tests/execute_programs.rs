//! End-to-end tests: full pipeline from source text through the VM, with
//! program output captured through the injected writer.

use fox_compiler::Interpreter;
use fox_vm::{RuntimeError, Vm};

fn run(source: &str) -> String {
    let mut interp = Interpreter::new();
    let root = interp
        .compile_source("test.fox", source)
        .expect("compilation failed");
    let mut out = Vec::new();
    {
        let mut vm = Vm::with_output(&interp, Box::new(&mut out));
        vm.call(&root, 0).expect("call failed");
        vm.run().expect("execution failed");
    }
    String::from_utf8(out).expect("program output was not UTF-8")
}

fn run_err(source: &str) -> RuntimeError {
    let mut interp = Interpreter::new();
    let root = interp
        .compile_source("test.fox", source)
        .expect("compilation failed");
    let mut out = Vec::new();
    let mut vm = Vm::with_output(&interp, Box::new(&mut out));
    match vm.call(&root, 0).and_then(|_| vm.run()) {
        Ok(()) => panic!("expected a runtime error"),
        Err(e) => e,
    }
}

#[test]
fn test_arithmetic_and_print() {
    assert_eq!(run("let x = 1 + 2; print x;"), "3\n");
}

#[test]
fn test_array_subscript() {
    assert_eq!(run("let xs = [3]int { 10, 20, 30 }; print xs[1];"), "20\n");
}

#[test]
fn test_function_call() {
    assert_eq!(
        run("fn add(a: int, b: int) -> int { return a + b; } print add(2, 40);"),
        "42\n"
    );
}

#[test]
fn test_struct_field_access() {
    assert_eq!(
        run("struct P { x: int, y: int } let p = P { x: 3, y: 4 }; print p.y;"),
        "4\n"
    );
}

#[test]
fn test_enum_match_with_payload() {
    assert_eq!(
        run("enum E { A, B(int) } \
             let e = E::B(7); \
             match e { E::A => print 0, E::B(n) => print n }"),
        "7\n"
    );
}

#[test]
fn test_for_range() {
    assert_eq!(run("for i in 0..3 { print i; }"), "0\n1\n2\n");
}

#[test]
fn test_division_by_zero_is_fatal() {
    let err = run_err("let x = 0; print 1 / x;");
    assert!(err.to_string().contains("/"));
    let err = run_err("let x = 0; print 1 % x;");
    assert!(err.to_string().contains("%"));
}

#[test]
fn test_inclusive_range() {
    assert_eq!(run("for i in 0...3 { print i; }"), "0\n1\n2\n3\n");
}

#[test]
fn test_while_loop_with_counter() {
    assert_eq!(
        run("let mut i = 0; let mut sum = 0; \
             while i < 5 { sum += i; i += 1; } \
             print sum;"),
        "10\n"
    );
}

#[test]
fn test_if_else_chains() {
    assert_eq!(
        run("let x = 7; \
             if x < 5 { print 1; } else if x < 10 { print 2; } else { print 3; }"),
        "2\n"
    );
}

#[test]
fn test_logical_short_circuit() {
    // `or` with a divide-by-zero on the right: short-circuit must skip it
    assert_eq!(
        run("let x = 0; \
             if x == 0 or 1 / x == 1 { print 1; } else { print 2; }"),
        "1\n"
    );
    assert_eq!(run("print true and false; print true or false;"), "false\ntrue\n");
}

#[test]
fn test_pointers_and_deref_assignment() {
    assert_eq!(
        run("let mut x = 1; let p = &mut x; *p = 5; print x; print *p;"),
        "5\n5\n"
    );
}

#[test]
fn test_field_assignment_through_mut_chain() {
    assert_eq!(
        run("struct P { x: int, y: int } \
             let mut p = P { x: 1, y: 2 }; \
             p.x = 10; \
             print p.x + p.y;"),
        "12\n"
    );
}

#[test]
fn test_methods_and_static_calls() {
    assert_eq!(
        run("struct P { x: int, y: int } \
             impl P { \
                 fn sum(self: *P) -> int { return self.x + self.y; } \
                 fn scale(self: *mut P, by: int) { self.x = self.x * by; } \
                 fn unit() -> int { return 1; } \
             } \
             let mut p = P { x: 3, y: 4 }; \
             print p.sum(); \
             p.scale(10); \
             print p.x; \
             print P::unit();"),
        "7\n30\n1\n"
    );
}

#[test]
fn test_tuples_and_destructuring() {
    assert_eq!(
        run("let t = (1, true, 30); print t.2; \
             let (a, _, c) = t; print a; print c;"),
        "30\n1\n30\n"
    );
}

#[test]
fn test_struct_print_is_recursive() {
    assert_eq!(
        run("struct Inner { v: int } \
             struct Outer { name: str, inner: Inner } \
             let o = Outer { name: \"box\", inner: Inner { v: 9 } }; \
             print o;"),
        "Outer{ name: box, inner: Inner{ v: 9 } }\n"
    );
}

#[test]
fn test_enum_print_shows_variant_and_payload() {
    assert_eq!(
        run("enum E { A, B(int, int) } \
             let a = E::A; let b = E::B(1, 2); \
             print a; print b;"),
        "A\nB(1, 2)\n"
    );
}

#[test]
fn test_match_value_arms_and_default() {
    assert_eq!(
        run("let x = 2; \
             match x { 1 => print 10, 2 => print 20, _ => print 0 }"),
        "20\n"
    );
    assert_eq!(
        run("let x = 9; \
             match x { 1 => print 10, 2 => print 20, _ => print 0 }"),
        "0\n"
    );
}

#[test]
fn test_match_as_expression() {
    assert_eq!(
        run("let x = 1; let y = match x { 1 => 2, _ => 3 }; print y;"),
        "2\n"
    );
}

#[test]
fn test_match_on_strings() {
    assert_eq!(
        run("let s = \"two\"; \
             match s { \"one\" => print 1, \"two\" => print 2, _ => print 0 }"),
        "2\n"
    );
}

#[test]
fn test_string_concat_and_equality() {
    assert_eq!(
        run("let a = \"foo\" + \"bar\"; print a; print a == \"foobar\"; \
             puts \"no\"; puts \"newline\"; print \"\";"),
        "foobar\ntrue\nnonewline\n"
    );
}

#[test]
fn test_for_over_array_with_counter() {
    assert_eq!(
        run("let xs = [3]int { 5, 6, 7 }; \
             for x, i in xs { print x + i; }"),
        "5\n7\n9\n"
    );
}

#[test]
fn test_for_over_slice() {
    assert_eq!(
        run("let s = [..]int { 40, 50 }; for v in s { print v; }"),
        "40\n50\n"
    );
}

#[test]
fn test_negative_slice_subscript() {
    assert_eq!(
        run("let s = [..]int { 1, 2, 3 }; print s[-1]; print s[-3];"),
        "3\n1\n"
    );
}

#[test]
fn test_slice_dynamic_subscript() {
    assert_eq!(
        run("let s = [..]int { 9, 8, 7 }; let i = 1; print s[i];"),
        "8\n"
    );
}

#[test]
fn test_casts() {
    assert_eq!(
        run("print 3.9 as int; print 65 as float; print true as int; print 'A' as int;"),
        "3\n65.000000\n1\n65\n"
    );
}

#[test]
fn test_float_formatting() {
    assert_eq!(run("print 3.5;"), "3.500000\n");
}

#[test]
fn test_char_print() {
    assert_eq!(run("print 'q'; print '\\n' == '\\n';"), "q\ntrue\n");
}

#[test]
fn test_const_bindings() {
    assert_eq!(
        run("const N = 6; const M = N * 7; print M;"),
        "42\n"
    );
}

#[test]
fn test_recursion() {
    assert_eq!(
        run("fn fib(n: int) -> int { \
                 if n < 2 { return n; } \
                 return fib(n - 1) + fib(n - 2); \
             } \
             print fib(10);"),
        "55\n"
    );
}

#[test]
fn test_function_values_are_first_class() {
    assert_eq!(
        run("fn double(x: int) -> int { return x * 2; } \
             let f = double; \
             print f(21);"),
        "42\n"
    );
}

#[test]
fn test_uninitialized_let_is_zeroed() {
    assert_eq!(run("let mut x: int; print x; x = 2; print x;"), "0\n2\n");
}

#[test]
fn test_underscore_binding_still_evaluates() {
    assert_eq!(
        run("fn loud() -> int { print 1; return 2; } let _ = loud(); print 3;"),
        "1\n3\n"
    );
}

#[test]
fn test_varargs_call_rewinds_the_stack() {
    assert_eq!(
        run("fn count(tag: int, ...) -> int { return vararg_size; } \
             print count(0, 10, 20); \
             print count(0); \
             print 99;"),
        "16\n0\n99\n"
    );
}

#[test]
fn test_panic_intrinsic() {
    let err = run_err("panic(\"boom\");");
    assert!(err.to_string().contains("boom"));
}

#[test]
fn test_alloc_and_free_round_trip() {
    assert_eq!(
        run("let p = alloc(64); free(p); print 1;"),
        "1\n"
    );
}

#[test]
fn test_call_stack_overflow_is_fatal() {
    let err = run_err("fn forever() { forever(); } forever();");
    assert!(err.to_string().contains("exhausted"));
}

#[test]
fn test_scopes_flush_block_values() {
    // the block's expression value is discarded at scope exit
    assert_eq!(run("{ let x = 5; print x; } let y = 6; print y;"), "5\n6\n");
}

#[test]
fn test_globals_visible_inside_functions() {
    assert_eq!(
        run("let base = 40; \
             fn plus(x: int) -> int { return base + x; } \
             print plus(2);"),
        "42\n"
    );
}

#[test]
fn test_enum_equality() {
    assert_eq!(
        run("enum E { A, B(int) } \
             print E::B(7) == E::B(7); \
             print E::B(7) == E::B(8); \
             print E::A == E::A;"),
        "true\nfalse\ntrue\n"
    );
}

#[test]
fn test_struct_pattern_in_let() {
    assert_eq!(
        run("struct P { x: int, y: int } \
             let P { x, .. } = P { x: 8, y: 9 }; \
             print x;"),
        "8\n"
    );
}
