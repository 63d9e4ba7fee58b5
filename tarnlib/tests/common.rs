#![allow(dead_code)]

use tarnlib::ast::Program;
use tarnlib::bytecode::{compile_source, BytecodeProgram, Value};
use tarnlib::diagnostic::DiagnosticBag;
use tarnlib::parser::Parser;
use tarnlib::vm::{TestHost, Vm, VmError};

pub fn parse_ok(src: &str) -> Program {
    let (program, diags) = Parser::parse_source(src);
    assert!(diags.is_empty(), "diagnostics: {:?}", diags.as_slice());
    program
}

pub fn parse_err(src: &str) -> DiagnosticBag {
    let (_program, diags) = Parser::parse_source(src);
    assert!(
        !diags.is_empty(),
        "expected parser diagnostics but got none for:\n{src}"
    );
    diags
}

pub fn compile_ok(src: &str) -> BytecodeProgram {
    compile_source(src).expect("compile should succeed")
}

pub fn compile_err(src: &str) -> DiagnosticBag {
    compile_source(src).expect_err("compile should fail")
}

/// Compile, run, and return the final value plus everything printed.
pub fn run_capture(src: &str) -> (Value, String) {
    let program = compile_ok(src);
    let mut vm = Vm::new();
    let mut host = TestHost::default();
    let value = vm.execute(&program, &mut host).expect("vm run");
    (value, host.output)
}

pub fn run_ok(src: &str) -> Value {
    run_capture(src).0
}

/// Printed output as lines.
pub fn run_lines(src: &str) -> Vec<String> {
    run_capture(src)
        .1
        .lines()
        .map(|l| l.to_string())
        .collect()
}

pub fn run_err(src: &str) -> VmError {
    let program = compile_ok(src);
    let mut vm = Vm::new();
    let mut host = TestHost::default();
    vm.execute(&program, &mut host)
        .expect_err("vm run should fail")
}

pub fn assert_has_diag(diags: &DiagnosticBag, needle: &str) {
    assert!(
        diags.as_slice().iter().any(|d| d.message.contains(needle)),
        "missing diagnostic containing `{needle}` in {:?}",
        diags.as_slice()
    );
}
