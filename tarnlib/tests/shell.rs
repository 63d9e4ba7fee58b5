mod common;

use common::assert_has_diag;
use tarnlib::bytecode::{Compiler, Opcode, Value};
use tarnlib::vm::{TestHost, Vm};

struct Shell {
    compiler: Compiler,
    vm: Vm,
    host: TestHost,
}

impl Shell {
    fn new() -> Self {
        Self {
            compiler: Compiler::new(),
            vm: Vm::new(),
            host: TestHost::default(),
        }
    }

    fn feed(&mut self, src: &str) -> Value {
        let fragment = self
            .compiler
            .feed_fragment(src)
            .unwrap_or_else(|d| panic!("compile `{src}`: {:?}", d.as_slice()));
        self.vm
            .execute_incremental(&fragment, &mut self.host)
            .unwrap_or_else(|e| panic!("run `{src}`: {e}"))
    }
}

#[test]
fn locals_carry_across_fragments() {
    let mut shell = Shell::new();
    shell.feed("let x = 2;");
    shell.feed("x = x + 40;");
    shell.feed("print(x);");
    assert_eq!(shell.host.output, "42\n");
}

#[test]
fn functions_defined_earlier_stay_callable() {
    let mut shell = Shell::new();
    shell.feed("fn double(n) { return n * 2; }");
    shell.feed("print(double(21));");
    assert_eq!(shell.host.output, "42\n");
}

#[test]
fn fragment_has_no_return_footer() {
    let mut compiler = Compiler::new();
    let fragment = compiler.feed_fragment("let x = 2;").expect("compile");
    assert!(
        !fragment
            .code
            .iter()
            .any(|i| i.op() == Some(Opcode::Return)),
        "shell fragments must not end in the implicit return"
    );
}

#[test]
fn one_shot_compile_keeps_the_footer() {
    let mut compiler = Compiler::new();
    let (program, diags) = tarnlib::parser::Parser::parse_source("let x = 2;");
    assert!(diags.is_empty());
    let program = compiler.compile(&program).expect("compile");
    let ops: Vec<Opcode> = program.code.iter().filter_map(|i| i.op()).collect();
    assert_eq!(ops.last(), Some(&Opcode::Return));
}

#[test]
fn statement_fragment_evaluates_to_void() {
    let mut shell = Shell::new();
    assert_eq!(shell.feed("let x = 1;"), Value::Void);
    assert_eq!(shell.feed("x + 1;"), Value::Void);
}

#[test]
fn top_level_return_yields_a_result_value() {
    let mut shell = Shell::new();
    shell.feed("let x = 20;");
    assert_eq!(shell.feed("return x * 2 + 2;"), Value::Int(42));
}

#[test]
fn main_entry_points_at_the_new_fragment() {
    let mut compiler = Compiler::new();
    let first = compiler.feed_fragment("print(1);").expect("compile");
    let second = compiler.feed_fragment("print(2);").expect("compile");
    assert!(second.main_entry as usize >= first.code.len());

    // Replaying the second fragment must not re-print the first.
    let mut vm = Vm::new();
    let mut host = TestHost::default();
    vm.execute_incremental(&second, &mut host).expect("run");
    assert_eq!(host.output, "2\n");
}

#[test]
fn constant_pool_carries_forward_and_stays_deduplicated() {
    let mut compiler = Compiler::new();
    compiler.feed_fragment("let a = 7;").expect("compile");
    let second = compiler.feed_fragment("let b = 7;").expect("compile");
    let sevens = second
        .constants
        .iter()
        .filter(|c| **c == Value::Int(7))
        .count();
    assert_eq!(sevens, 1);
}

#[test]
fn arrays_survive_between_fragments() {
    let mut shell = Shell::new();
    shell.feed("let a = [1, 2, 3];");
    shell.feed("a[1] = 99;");
    shell.feed("print(a);");
    assert_eq!(shell.host.output, "[1, 99, 3]\n");
}

#[test]
fn loops_and_functions_work_inside_one_fragment() {
    let mut shell = Shell::new();
    shell.feed("fn sq(n) { return n * n; } let acc = 0; for (let i = 1; i < 4; i = i + 1) { acc = acc + sq(i); } print(acc);");
    assert_eq!(shell.host.output, "14\n");
}

#[test]
fn compile_error_leaves_earlier_state_usable() {
    let mut shell = Shell::new();
    shell.feed("let x = 5;");
    let err = shell
        .compiler
        .feed_fragment("print(missing);")
        .expect_err("undefined variable");
    assert_has_diag(&err, "Undefined variable `missing`");
    shell.feed("print(x);");
    assert_eq!(shell.host.output, "5\n");
}

#[test]
fn failed_fragment_does_not_leak_function_definitions() {
    let mut shell = Shell::new();
    let err = shell
        .compiler
        .feed_fragment("fn bad() { return z; }")
        .expect_err("body references undefined variable");
    assert_has_diag(&err, "Undefined variable `z`");

    // The rejected function must not be callable from a later fragment.
    let err = shell
        .compiler
        .feed_fragment("print(bad());")
        .expect_err("function from failed fragment must not exist");
    assert_has_diag(&err, "Undefined function `bad`");

    // And the name is still free for a correct definition.
    shell.feed("fn bad() { return 1; }");
    shell.feed("print(bad());");
    assert_eq!(shell.host.output, "1\n");
}

#[test]
fn failed_fragment_does_not_leak_variables() {
    let mut shell = Shell::new();
    let err = shell
        .compiler
        .feed_fragment("let y = z;")
        .expect_err("initializer references undefined variable");
    assert_has_diag(&err, "Undefined variable `z`");

    let err = shell
        .compiler
        .feed_fragment("print(y);")
        .expect_err("variable from failed fragment must not exist");
    assert_has_diag(&err, "Undefined variable `y`");
}

#[test]
fn failed_fragment_does_not_grow_the_program() {
    let mut compiler = Compiler::new();
    let first = compiler.feed_fragment("let a = 1;").expect("compile");
    let _ = compiler
        .feed_fragment("print(missing);")
        .expect_err("undefined variable");
    let second = compiler.feed_fragment("print(a);").expect("compile");
    // The failed fragment's partial code was rolled back, so the next
    // fragment starts right after the last successful one.
    assert_eq!(second.main_entry as usize, first.code.len());
}

#[test]
fn redefining_a_function_is_an_error() {
    let mut shell = Shell::new();
    shell.feed("fn f() { return 1; }");
    let err = shell
        .compiler
        .feed_fragment("fn f() { return 2; }")
        .expect_err("duplicate function");
    assert_has_diag(&err, "already defined");
}

#[test]
fn reset_drops_all_accumulated_state() {
    let mut shell = Shell::new();
    shell.feed("let x = 1;");
    shell.compiler.reset();
    let err = shell
        .compiler
        .feed_fragment("print(x);")
        .expect_err("x should be gone after reset");
    assert_has_diag(&err, "Undefined variable `x`");
}
